use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use ravenwire_core::{PanelRegistration, REQUEST_METHOD_NAME, Registrar, RequestMethod, register};
use tracing::info;

use crate::middleware::capture_request;
use crate::panel::raven_panel;
use crate::state::RavenState;

/// Path prefix of the panel routes.
pub const DEFAULT_PANEL_PREFIX: &str = "/_debug/panels";

/// Errors raised while registering into an axum [`Router`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum RegistrarError {
    /// Only the `raven` accessor, computed once per request, can be provided.
    #[display("Unsupported request method '{name}' (reify: {reify})")]
    UnsupportedRequestMethod {
        /// The accessor name.
        name: String,
        /// Whether it was requested as cached.
        reify: bool,
    },

    /// The name is already registered.
    #[display("Duplicate registration of '{name}'")]
    Duplicate {
        /// The registered name.
        name: String,
    },
}

/// [`Registrar`] for axum applications.
///
/// Records the registrations, then [`AxumRegistrar::wire`] installs them on a
/// router: one `GET` route per panel and the [`capture_request`] middleware
/// backing the `raven` accessor.
#[derive(Debug, Clone)]
pub struct AxumRegistrar {
    panel_prefix: String,
    request_methods: Vec<RequestMethod>,
    panels: Vec<PanelRegistration>,
}

impl Default for AxumRegistrar {
    fn default() -> Self {
        Self::new(DEFAULT_PANEL_PREFIX)
    }
}

impl AxumRegistrar {
    /// Creates a registrar serving the panels under `panel_prefix`.
    pub fn new(panel_prefix: impl Into<String>) -> Self {
        let panel_prefix = panel_prefix.into().trim_end_matches('/').to_owned();
        Self {
            panel_prefix,
            request_methods: Vec::new(),
            panels: Vec::new(),
        }
    }

    /// The registered accessors.
    pub fn request_methods(&self) -> &[RequestMethod] {
        &self.request_methods
    }

    /// The registered panels.
    pub fn panels(&self) -> &[PanelRegistration] {
        &self.panels
    }

    /// The route path of a panel.
    pub fn panel_path(&self, name: &str) -> String {
        format!("{}/{name}", self.panel_prefix)
    }

    /// Installs the registrations on `router`.
    ///
    /// Routes added to `router` afterwards do not go through the middleware.
    pub fn wire<S>(&self, mut router: Router<S>, state: RavenState) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        for panel in &self.panels {
            let path = self.panel_path(&panel.name);
            info!(%path, renderer = %panel.renderer, "panel route");
            router = router.route(&path, get(raven_panel));
        }

        if self.request_methods.is_empty() {
            router
        } else {
            router.layer(from_fn_with_state(state, capture_request))
        }
    }
}

impl Registrar for AxumRegistrar {
    type Error = RegistrarError;

    fn add_request_method(&mut self, method: RequestMethod) -> Result<(), Self::Error> {
        if method.name != REQUEST_METHOD_NAME || !method.reify {
            return Err(RegistrarError::UnsupportedRequestMethod {
                name: method.name,
                reify: method.reify,
            });
        }
        if self.request_methods.iter().any(|it| it.name == method.name) {
            return Err(RegistrarError::Duplicate { name: method.name });
        }
        self.request_methods.push(method);
        Ok(())
    }

    fn add_panel(&mut self, panel: PanelRegistration) -> Result<(), Self::Error> {
        if self.panels.iter().any(|it| it.name == panel.name) {
            return Err(RegistrarError::Duplicate { name: panel.name });
        }
        self.panels.push(panel);
        Ok(())
    }
}

/// Registers raven on `router` with the default panel prefix.
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::routing::get;
/// use ravenwire_axum::{RavenState, install};
/// use ravenwire_core::RavenConfig;
///
/// let state = RavenState::new(RavenConfig::default());
/// let router: Router = Router::new().route("/", get(|| async { "hello" }));
/// let _app = install(router, state)?;
/// # Ok::<(), ravenwire_axum::RegistrarError>(())
/// ```
///
/// # Errors
///
/// Fails if the registration is rejected.
pub fn install<S>(router: Router<S>, state: RavenState) -> Result<Router<S>, RegistrarError>
where
    S: Clone + Send + Sync + 'static,
{
    let mut registrar = AxumRegistrar::default();
    register(&mut registrar, state.config())?;
    Ok(registrar.wire(router, state))
}
