#![allow(missing_docs)]
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use ravenwire_core::Settings;
use tower_http::trace::TraceLayer;
use tracing::info;

mod raven;
mod routes;
mod state;

pub use self::raven::FORWARDED_HOSTS_FACTORY;
use self::routes::app_router;
use self::state::AppState;

/// Load the settings from a YAML file
///
/// # Errors
///
/// fail if the file cannot be read or is not a valid settings document
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings {}", path.display()))?;
    let settings = Settings::from_yaml(&contents)
        .with_context(|| format!("parsing settings {}", path.display()))?;
    info!(path = %path.display(), count = settings.len(), "settings loaded");

    Ok(settings)
}

/// Launch the server
///
/// # Errors
///
/// fail if the socket cannot be created (e.g. port already used)
/// fail if the server cannot be launch
pub async fn run(addr: SocketAddr, settings: Settings) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("opening {addr}"))?;
    info!("Using address {addr}");

    launch(listener, settings).await
}

/// Launch the server
///
/// # Errors
///
/// fail if raven cannot be registered
/// fail if the server cannot be launch
pub async fn launch(listener: tokio::net::TcpListener, settings: Settings) -> anyhow::Result<()> {
    let state = AppState::new();
    let raven = raven::raven_state(&settings);
    let app = ravenwire_axum::install(app_router(), raven)
        .context("registering raven")?
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    axum::serve(listener, app.into_make_service())
        .await
        .context("starting server")?;

    Ok(())
}
