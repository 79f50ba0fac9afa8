use axum::body::{Body, to_bytes};
use axum::extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;
use ravenwire_core::HttpRequestSource;
use serde_json::{Map, Value};
use tracing::warn;

use crate::extract::RequestRaven;
use crate::state::RavenState;

const MATCHED_ROUTE: &str = "matched_route";
const MATCHDICT: &str = "matchdict";

/// Captures the request for the [`Raven`](crate::Raven) extractor and the panel route.
///
/// Buffers the body up to [`RavenState::body_limit`], rejecting larger ones
/// with `413 Payload Too Large` and unreadable ones with `400 Bad Request`,
/// then restores it for the inner handlers. Multipart forms are decoded here.
/// The matched route and the path parameters are exposed as the
/// `matched_route` and `matchdict` attributes.
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware::from_fn_with_state;
/// use axum::routing::get;
/// use ravenwire_axum::{RavenState, capture_request};
/// use ravenwire_core::RavenConfig;
///
/// let state = RavenState::new(RavenConfig::default());
/// let app: Router = Router::new()
///     .route("/", get(|| async { "hello" }))
///     .layer(from_fn_with_state(state, capture_request));
/// ```
pub async fn capture_request(
    State(state): State<RavenState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let body = match to_bytes(body, state.body_limit()).await {
        Ok(body) => body,
        Err(error) => {
            let error = error.into_inner();
            let status = if error.is::<LengthLimitError>() {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            warn!(%error, %status, limit = state.body_limit(), "request body rejected");
            return status.into_response();
        }
    };

    let matched_route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned());
    let matchdict = RawPathParams::from_request_parts(&mut parts, &state)
        .await
        .ok()
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
                .collect::<Map<_, _>>()
        });

    let mut source =
        HttpRequestSource::new(parts.clone(), body.clone()).with_resolvers(state.resolvers());
    if let Some(route) = matched_route {
        source = source.with_value(MATCHED_ROUTE, route);
    }
    if let Some(matchdict) = matchdict {
        source = source.with_value(MATCHDICT, matchdict);
    }

    let source = source.read_multipart().await;

    parts.extensions.insert(RequestRaven::new(state, source));
    next.run(Request::from_parts(parts, Body::from(body))).await
}
