use std::sync::{Arc, OnceLock};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ravenwire_core::{HttpRequestSource, PanelData, PanelError, RavenClient};
use tracing::debug;

use crate::error::RavenRejection;
use crate::state::RavenState;

/// The raven data of the current request.
///
/// Inserted in the request extensions by [`capture_request`](crate::capture_request).
/// The client is built on first access, then cached for the rest of the request.
#[derive(Debug, Clone)]
pub struct RequestRaven {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: RavenState,
    source: HttpRequestSource,
    client: OnceLock<Arc<RavenClient>>,
}

impl RequestRaven {
    pub(crate) fn new(state: RavenState, source: HttpRequestSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                state,
                source,
                client: OnceLock::new(),
            }),
        }
    }

    /// The captured request.
    pub fn source(&self) -> &HttpRequestSource {
        &self.inner.source
    }

    /// The client of this request.
    ///
    /// # Errors
    ///
    /// Fails if the request context cannot be assembled and
    /// `pyramid_raven.swallow_parse_errors` is disabled. Failures are not cached.
    pub fn client(&self) -> Result<Arc<RavenClient>, RavenRejection> {
        if let Some(client) = self.inner.client.get() {
            return Ok(Arc::clone(client));
        }

        let client = self.inner.state.clients().build_client(&self.inner.source)?;
        debug!("raven client built for request");
        let client = self.inner.client.get_or_init(|| Arc::new(client));
        Ok(Arc::clone(client))
    }

    /// The `raven-js` panel data of this request.
    ///
    /// # Errors
    ///
    /// Fails if no DSN is configured.
    pub fn panel_data(&self) -> Result<PanelData, PanelError> {
        self.inner.state.panel().panel_data(&self.inner.source)
    }
}

impl<S> FromRequestParts<S> for RequestRaven
where
    S: Send + Sync,
{
    type Rejection = RavenRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(RavenRejection::MissingMiddleware)
    }
}

/// Extracts the error-reporting client of the current request.
///
/// ```rust,no_run
/// use axum::Json;
/// use ravenwire_axum::Raven;
///
/// async fn handler(Raven(client): Raven) -> Json<serde_json::Value> {
///     Json(serde_json::json!({ "has_context": client.context().is_some() }))
/// }
/// ```
#[derive(Debug, Clone, derive_more::Deref)]
pub struct Raven(pub Arc<RavenClient>);

impl<S> FromRequestParts<S> for Raven
where
    S: Send + Sync,
{
    type Rejection = RavenRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raven = RequestRaven::from_request_parts(parts, state).await?;
        raven.client().map(Self)
    }
}
