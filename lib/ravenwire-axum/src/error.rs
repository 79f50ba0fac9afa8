use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ravenwire_core::{ContextError, PanelError};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Failure of the [`Raven`](crate::Raven) and [`RequestRaven`](crate::RequestRaven) extractors and of the panel route.
#[derive(Debug, derive_more::Error, derive_more::From, derive_more::Display)]
pub enum RavenRejection {
    /// The request did not go through [`capture_request`](crate::capture_request).
    #[display("Raven request capture middleware is not installed")]
    MissingMiddleware,

    /// The request context could not be assembled.
    Context(ContextError),

    /// The panel data could not be built.
    Panel(PanelError),
}

/// Body of the error responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub message: String,
}

impl IntoResponse for RavenRejection {
    fn into_response(self) -> Response {
        error!(error = %self, "raven unavailable");
        let message = self.to_string();

        (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { message })).into_response()
    }
}
