#![allow(missing_docs)]

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderValue, USER_AGENT};
use rstest::rstest;
use serde_json::{Value, json};

mod common;
pub use self::common::*;

#[rstest]
#[tokio::test]
async fn test_health(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app.get("/api/health").send().await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    assert_eq!(body["status"], "OK");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_item_context(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app
        .get("/api/items/7?page=2&tag=a&tag=b")
        .header(COOKIE, "session=abc; theme=dark")
        .header(USER_AGENT, "ravenwire-test")
        .header("x-country", "FR")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    let context = &body["context"];
    insta::assert_json_snapshot!(context["attributes"], @r#"
    {
      "geoip": {
        "country_code": "FR"
      },
      "matchdict": {
        "item_id": "7"
      },
      "matched_route": "/api/items/{item_id}",
      "user_agent": "ravenwire-test"
    }
    "#);
    assert_eq!(context["cookies"], json!({"session": "abc", "theme": "dark"}));
    assert_eq!(context["query (GET)"], json!({"page": ["2"], "tag": ["a", "b"]}));
    assert_eq!(context["params (POST)"], json!({}));
    assert!(context["headers"].get("cookie").is_none());
    assert_eq!(context["headers"]["user-agent"], "ravenwire-test");

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_feedback_form(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app
        .post("/api/feedback")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("message=hello&message=it%27s+me&rating=5")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    insta::assert_json_snapshot!(body, {".context.headers" => "[headers]"}, @r#"
    {
      "context": {
        "attributes": {
          "geoip": null,
          "matchdict": {},
          "matched_route": "/api/feedback"
        },
        "cookies": {},
        "headers": "[headers]",
        "params (POST)": {
          "message": [
            "\"hello\"",
            "\"it's me\""
          ],
          "rating": [
            "\"5\""
          ]
        },
        "query (GET)": {}
      },
      "processors": [
        "raven.processors.SanitizePasswordsProcessor",
        "raven.processors.RemovePostDataProcessor"
      ],
      "timeout": {
        "nanos": 0,
        "secs": 10
      }
    }
    "#);

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_failing_attribute_is_swallowed(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app
        .get("/api/items/1")
        .header("x-country", HeaderValue::from_bytes(b"caf\xe9")?)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    assert_eq!(
        body["context"],
        json!({"err": "Failed to get context data from request"})
    );

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_panel(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app
        .get("/_debug/panels/raven-js")
        .header("x-forwarded-host", "proxy.example.com, edge.example.com")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.json::<Value>().await?;
    let port = app.addr().port();
    assert_eq!(
        body,
        json!({
            "dsn": "https://public@errors.example.com/1",
            "hosts": [
                format!(r"127\.0\.0\.1\:{port}"),
                r"cdn\.example\.com",
                r"proxy\.example\.com",
                r"edge\.example\.com",
            ],
            "src": "//d3nslu0hdya83q.cloudfront.net/dist/1.0/raven.min.js",
        })
    );

    Ok(())
}

#[rstest]
#[tokio::test]
async fn test_unknown_route(#[future] app: TestApp) -> anyhow::Result<()> {
    let app = app.await;

    let response = app.get("/api/unknown").send().await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
