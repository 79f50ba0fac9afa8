use std::sync::Arc;

use ravenwire_core::{
    AttributeResolvers, ClientFactory, ClientOptions, EnvSource, HostsFactories, PanelProvider,
    ProcessEnv, RavenConfig,
};

/// Default limit of the buffered request body, 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Environment shared by every request.
pub type SharedEnv = Arc<dyn EnvSource + Send + Sync>;

/// State shared by the middleware, the extractors and the panel route.
///
/// Built once at startup, cheap to clone.
#[derive(Debug, Clone)]
pub struct RavenState {
    inner: Arc<Inner>,
}

#[derive(derive_more::Debug)]
struct Inner {
    config: RavenConfig,
    clients: ClientFactory,
    #[debug(skip)]
    panel: PanelProvider<SharedEnv>,
    resolvers: Arc<AttributeResolvers>,
    body_limit: usize,
}

impl RavenState {
    /// Creates a state with the default options.
    pub fn new(config: RavenConfig) -> Self {
        Self::builder(config).build()
    }

    /// Creates a builder.
    pub fn builder(config: RavenConfig) -> RavenStateBuilder {
        RavenStateBuilder {
            config,
            hosts_factories: HostsFactories::new(),
            env: Arc::new(ProcessEnv),
            resolvers: AttributeResolvers::new(),
            client_defaults: ClientOptions::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &RavenConfig {
        &self.inner.config
    }

    /// The per-request client factory.
    pub fn clients(&self) -> &ClientFactory {
        &self.inner.clients
    }

    /// The panel data provider.
    pub fn panel(&self) -> &PanelProvider<SharedEnv> {
        &self.inner.panel
    }

    /// The attribute resolvers applied to every request.
    pub fn resolvers(&self) -> Arc<AttributeResolvers> {
        Arc::clone(&self.inner.resolvers)
    }

    /// Limit of the buffered request body, in bytes.
    pub fn body_limit(&self) -> usize {
        self.inner.body_limit
    }
}

/// Builder of [`RavenState`].
#[derive(derive_more::Debug)]
pub struct RavenStateBuilder {
    config: RavenConfig,
    hosts_factories: HostsFactories,
    #[debug(skip)]
    env: SharedEnv,
    resolvers: AttributeResolvers,
    client_defaults: ClientOptions,
    body_limit: usize,
}

impl RavenStateBuilder {
    /// Registers the hosts factories, selected by `pyramid_raven.include_hosts_factory`.
    #[must_use]
    pub fn with_hosts_factories(mut self, factories: HostsFactories) -> Self {
        self.hosts_factories = factories;
        self
    }

    /// Replaces the environment the DSN is read from.
    #[must_use]
    pub fn with_env(mut self, env: impl EnvSource + Send + Sync + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Sets the attribute resolvers.
    #[must_use]
    pub fn with_resolvers(mut self, resolvers: AttributeResolvers) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Replaces the client default options.
    #[must_use]
    pub fn with_client_defaults(mut self, defaults: ClientOptions) -> Self {
        self.client_defaults = defaults;
        self
    }

    /// Sets the limit of the buffered request body, in bytes.
    #[must_use]
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// Builds the state.
    pub fn build(self) -> RavenState {
        let clients = ClientFactory::from_config(&self.config).with_defaults(self.client_defaults);
        let panel =
            PanelProvider::from_config(&self.config, &self.hosts_factories).with_env(self.env);

        RavenState {
            inner: Arc::new(Inner {
                config: self.config,
                clients,
                panel,
                resolvers: Arc::new(self.resolvers),
                body_limit: self.body_limit,
            }),
        }
    }
}
