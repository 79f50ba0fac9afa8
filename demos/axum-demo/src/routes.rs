use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ravenwire_axum::Raven;
use serde_json::json;

use crate::AppState;

/// The application router
pub fn app_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/items/{item_id}", get(show_item))
        .route("/api/feedback", post(send_feedback))
        .route("/", get(|| async move { "ravenwire demo" }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.uptime();

    Json(json!({
        "status": "OK",
        "uptime": uptime,
    }))
}

async fn show_item(Path(item_id): Path<u32>, Raven(client): Raven) -> impl IntoResponse {
    Json(json!({
        "item_id": item_id,
        "context": client.context(),
    }))
}

async fn send_feedback(Raven(client): Raven) -> impl IntoResponse {
    Json(json!({
        "timeout": client.options().timeout(),
        "processors": client.options().processors(),
        "context": client.context(),
    }))
}
