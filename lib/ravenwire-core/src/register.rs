use std::convert::Infallible;

use serde::Serialize;
use tracing::info;

use crate::config::RavenConfig;

/// Name of the per-request client accessor.
pub const REQUEST_METHOD_NAME: &str = "raven";

/// Name of the debug panel.
pub const PANEL_NAME: &str = "raven-js";

/// A per-request accessor to install on the host framework's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestMethod {
    /// Accessor name.
    pub name: String,
    /// Computed on first access then cached for the rest of the request.
    pub reify: bool,
}

/// A debug panel to install in the host framework's toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelRegistration {
    /// Panel name.
    pub name: String,
    /// Template or renderer identifier.
    pub renderer: String,
}

/// Extension points of the host framework.
pub trait Registrar {
    /// Error raised by the framework while registering.
    type Error;

    /// Installs a per-request accessor.
    ///
    /// # Errors
    ///
    /// Fails if the framework rejects the accessor.
    fn add_request_method(&mut self, method: RequestMethod) -> Result<(), Self::Error>;

    /// Installs a debug panel.
    ///
    /// # Errors
    ///
    /// Fails if the framework rejects the panel.
    fn add_panel(&mut self, panel: PanelRegistration) -> Result<(), Self::Error>;
}

/// Registers the `raven` accessor and the `raven-js` panel.
///
/// ```rust
/// use ravenwire_core::{RavenConfig, Registrations, register};
///
/// let mut registrations = Registrations::default();
/// register(&mut registrations, &RavenConfig::default())?;
///
/// assert_eq!(registrations.request_methods[0].name, "raven");
/// assert!(registrations.request_methods[0].reify);
/// assert_eq!(registrations.panels[0].name, "raven-js");
/// # Ok::<(), std::convert::Infallible>(())
/// ```
///
/// # Errors
///
/// Propagates the registrar's errors.
pub fn register<R>(registrar: &mut R, config: &RavenConfig) -> Result<(), R::Error>
where
    R: Registrar + ?Sized,
{
    registrar.add_request_method(RequestMethod {
        name: REQUEST_METHOD_NAME.to_owned(),
        reify: true,
    })?;
    registrar.add_panel(PanelRegistration {
        name: PANEL_NAME.to_owned(),
        renderer: config.panel_template.clone(),
    })?;
    info!(
        method = REQUEST_METHOD_NAME,
        panel = PANEL_NAME,
        renderer = %config.panel_template,
        "raven registered"
    );
    Ok(())
}

/// A [`Registrar`] that only records what is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Registrations {
    /// Recorded accessors.
    pub request_methods: Vec<RequestMethod>,
    /// Recorded panels.
    pub panels: Vec<PanelRegistration>,
}

impl Registrar for Registrations {
    type Error = Infallible;

    fn add_request_method(&mut self, method: RequestMethod) -> Result<(), Self::Error> {
        self.request_methods.push(method);
        Ok(())
    }

    fn add_panel(&mut self, panel: PanelRegistration) -> Result<(), Self::Error> {
        self.panels.push(panel);
        Ok(())
    }
}
