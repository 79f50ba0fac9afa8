use axum::Json;
use ravenwire_core::PanelData;

use crate::error::RavenRejection;
use crate::extract::RequestRaven;

/// `GET` handler of the `raven-js` panel.
///
/// Responds with the panel data as JSON, or a `500` when no DSN is configured.
///
/// # Errors
///
/// Fails if the request did not go through the middleware or the DSN is missing.
pub async fn raven_panel(raven: RequestRaven) -> Result<Json<PanelData>, RavenRejection> {
    let data = raven.panel_data()?;
    Ok(Json(data))
}
