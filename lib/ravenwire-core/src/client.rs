//! Per-request error-reporting client construction.

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::RavenConfig;
use crate::context::{ContextAssembler, ContextError, ContextSource, RequestSnapshot};
use crate::dsn::to_public_dsn;
use crate::request::RequestSource;

/// Message stored as context when the request snapshot fails.
pub const CONTEXT_FAILURE_MESSAGE: &str = "Failed to get context data from request";

/// Processors enabled by default on every client.
pub const DEFAULT_PROCESSORS: [&str; 2] = [
    "raven.processors.SanitizePasswordsProcessor",
    "raven.processors.RemovePostDataProcessor",
];

/// Default network timeout of the client, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 4;

/// Context attached to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextData {
    /// The request snapshot.
    Request(RequestSnapshot),
    /// The snapshot failed and the failure was swallowed.
    Failed {
        /// Always [`CONTEXT_FAILURE_MESSAGE`].
        err: String,
    },
}

impl ContextData {
    /// The placeholder used when the snapshot fails.
    pub fn failed() -> Self {
        Self::Failed {
            err: CONTEXT_FAILURE_MESSAGE.to_owned(),
        }
    }

    /// Returns the snapshot, if any.
    pub fn as_snapshot(&self) -> Option<&RequestSnapshot> {
        match self {
            Self::Request(snapshot) => Some(snapshot),
            Self::Failed { .. } => None,
        }
    }
}

/// Options handed to the error-reporting client.
///
/// Defaults to the password and POST data sanitizing processors and a
/// four seconds timeout; `raven.*` settings are merged on top as strings.
#[derive(Clone, PartialEq, Serialize, derive_more::Debug)]
#[serde(transparent)]
#[debug("ClientOptions({:?})", redacted(values))]
pub struct ClientOptions {
    values: IndexMap<String, Value>,
}

fn redacted(values: &IndexMap<String, Value>) -> IndexMap<&str, Value> {
    values
        .iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("dsn", Value::String(dsn)) => Value::String(to_public_dsn(dsn)),
                _ => value.clone(),
            };
            (key.as_str(), value)
        })
        .collect()
}

impl Default for ClientOptions {
    fn default() -> Self {
        let mut values = IndexMap::new();
        values.insert("processors".to_owned(), json!(DEFAULT_PROCESSORS));
        values.insert("timeout".to_owned(), json!(DEFAULT_TIMEOUT_SECS));
        Self { values }
    }
}

impl ClientOptions {
    /// Creates options without any value.
    pub fn empty() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// Sets an option, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets an option, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Merges string overrides on top of the current values.
    pub fn merge_overrides<'a>(
        &mut self,
        overrides: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) {
        for (key, value) in overrides {
            self.set(key.clone(), value.clone());
        }
    }

    /// Returns the raw value of an option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// The DSN, if configured.
    pub fn dsn(&self) -> Option<&str> {
        self.get("dsn").and_then(Value::as_str)
    }

    /// The network timeout, accepting numbers and numeric strings.
    pub fn timeout(&self) -> Option<Duration> {
        let secs: Option<f64> = match self.get("timeout")? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        secs.filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// The processor names, accepting a sequence or a whitespace-separated string.
    pub fn processors(&self) -> Vec<&str> {
        match self.get("processors") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(text)) => text.split_whitespace().collect(),
            _ => Vec::new(),
        }
    }

    /// Iterates over the options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// Handle on a configured error-reporting client.
///
/// Transmission is the business of the error-reporting library; this handle
/// carries everything it needs: the merged options and the request context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RavenClient {
    options: ClientOptions,
    context: Option<ContextData>,
}

impl RavenClient {
    /// Creates a client handle.
    pub fn new(options: ClientOptions, context: Option<ContextData>) -> Self {
        Self { options, context }
    }

    /// The client options.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The request context, `None` when request data is not included.
    pub fn context(&self) -> Option<&ContextData> {
        self.context.as_ref()
    }
}

/// Builds the client from its options and context.
///
/// The seam through which the host plugs its error-reporting library.
pub trait ClientConstructor {
    /// The built client.
    type Client;

    /// Builds the client.
    fn construct(&self, options: ClientOptions, context: Option<ContextData>) -> Self::Client;
}

/// Builds [`RavenClient`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConstructor;

impl ClientConstructor for DefaultConstructor {
    type Client = RavenClient;

    fn construct(&self, options: ClientOptions, context: Option<ContextData>) -> Self::Client {
        RavenClient::new(options, context)
    }
}

/// Builds the per-request error-reporting client.
///
/// # Example
///
/// ```rust
/// use ravenwire_core::{ClientFactory, MemoryRequest, RavenConfig, Settings};
///
/// let settings = Settings::new().with("raven.foo", "bar");
/// let factory = ClientFactory::from_config(&RavenConfig::from_settings(&settings));
///
/// let client = factory.build_client(&MemoryRequest::new("http://localhost"))?;
///
/// assert_eq!(client.options().get("foo"), Some(&serde_json::json!("bar")));
/// assert!(client.context().is_some());
/// # Ok::<(), ravenwire_core::ContextError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClientFactory<A = ContextAssembler, K = DefaultConstructor> {
    assembler: A,
    constructor: K,
    defaults: ClientOptions,
    overrides: IndexMap<String, String>,
    include_request_data: bool,
    swallow_parse_errors: bool,
}

impl ClientFactory {
    /// Creates a factory with the default assembler and constructor.
    pub fn from_config(config: &RavenConfig) -> Self {
        Self {
            assembler: ContextAssembler::from_config(config),
            constructor: DefaultConstructor,
            defaults: ClientOptions::default(),
            overrides: config.client_overrides.clone(),
            include_request_data: config.include_request_data,
            swallow_parse_errors: config.swallow_parse_errors,
        }
    }
}

impl<A, K> ClientFactory<A, K>
where
    A: ContextSource,
    K: ClientConstructor,
{
    /// Replaces the snapshot source.
    #[must_use]
    pub fn with_assembler<A2: ContextSource>(self, assembler: A2) -> ClientFactory<A2, K> {
        ClientFactory {
            assembler,
            constructor: self.constructor,
            defaults: self.defaults,
            overrides: self.overrides,
            include_request_data: self.include_request_data,
            swallow_parse_errors: self.swallow_parse_errors,
        }
    }

    /// Replaces the client constructor.
    #[must_use]
    pub fn with_constructor<K2: ClientConstructor>(self, constructor: K2) -> ClientFactory<A, K2> {
        ClientFactory {
            assembler: self.assembler,
            constructor,
            defaults: self.defaults,
            overrides: self.overrides,
            include_request_data: self.include_request_data,
            swallow_parse_errors: self.swallow_parse_errors,
        }
    }

    /// Replaces the default options, before the `raven.*` overrides.
    #[must_use]
    pub fn with_defaults(mut self, defaults: ClientOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// The snapshot source.
    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    /// Builds the client for `request`.
    ///
    /// # Errors
    ///
    /// Returns the snapshot failure only when `swallow_parse_errors` is disabled.
    pub fn build_client(&self, request: &dyn RequestSource) -> Result<K::Client, ContextError> {
        let context = if self.include_request_data {
            Some(self.context_data(request)?)
        } else {
            None
        };

        let mut options = self.defaults.clone();
        options.merge_overrides(&self.overrides);
        debug!(?options, has_context = context.is_some(), "building client");

        Ok(self.constructor.construct(options, context))
    }

    fn context_data(&self, request: &dyn RequestSource) -> Result<ContextData, ContextError> {
        match self.assembler.context(request) {
            Ok(snapshot) => Ok(ContextData::Request(snapshot)),
            Err(error) if self.swallow_parse_errors => {
                warn!(%error, "fail to get context data from request");
                Ok(ContextData::failed())
            }
            Err(error) => Err(error),
        }
    }
}
