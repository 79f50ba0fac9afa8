//! Request snapshot attached as context to error reports.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::attributes::{AttributeKind, AttributeTable};
use crate::config::RavenConfig;
use crate::request::{Attribute, AttributeError, ParamValue, ParamsError, RequestSource};

/// Placeholder produced by [`safe_repr`] when a value cannot be formatted.
pub const UNREPRESENTABLE: &str = "<unrepresentable value>";

const COOKIE_HEADER: &str = "cookie";

/// Renders a body parameter value as a string.
pub type Stringify = fn(&ParamValue) -> String;

/// Errors raised while assembling a [`RequestSnapshot`].
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ContextError {
    /// A request attribute failed.
    Attribute(AttributeError),
    /// The request parameters cannot be decoded.
    Params(ParamsError),
    /// Any other failure reported by a custom [`ContextSource`].
    #[display("Context unavailable: {message}")]
    #[from(skip)]
    Other {
        /// Description of the failure.
        message: String,
    },
}

/// Serializable snapshot of an in-flight request.
///
/// Always serializes with the five sections `attributes`, `cookies`,
/// `headers`, `params (POST)` and `query (GET)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestSnapshot {
    /// Selected request attributes, sorted by name.
    pub attributes: IndexMap<String, Value>,
    /// Cookies, in cookie jar order.
    pub cookies: IndexMap<String, String>,
    /// Headers sorted by name, without `Cookie`.
    pub headers: BTreeMap<String, String>,
    /// Body parameters, every value rendered as a string.
    #[serde(rename = "params (POST)")]
    pub params: IndexMap<String, Vec<String>>,
    /// Query parameters.
    #[serde(rename = "query (GET)")]
    pub query: IndexMap<String, Vec<String>>,
}

/// Something able to produce the snapshot of a request.
///
/// Implemented by [`ContextAssembler`]; the client factory accepts any
/// implementation.
pub trait ContextSource {
    /// Builds the snapshot of `request`.
    ///
    /// # Errors
    ///
    /// Fails when an attribute or the request parameters cannot be read.
    fn context(&self, request: &dyn RequestSource) -> Result<RequestSnapshot, ContextError>;
}

/// Builds [`RequestSnapshot`]s.
///
/// # Example
///
/// ```rust
/// use ravenwire_core::{ContextAssembler, MemoryRequest, RavenConfig};
///
/// let assembler = ContextAssembler::from_config(&RavenConfig::default());
/// let request = MemoryRequest::new("http://localhost")
///     .with_header("Host", "localhost:80")
///     .with_header("Cookie", "a=b")
///     .with_cookie("a", "b")
///     .with_property("matched_route", "home");
///
/// let snapshot = assembler.assemble(&request)?;
///
/// assert_eq!(snapshot.attributes["matched_route"], "home");
/// assert_eq!(snapshot.cookies["a"], "b");
/// assert!(!snapshot.headers.contains_key("Cookie"));
/// # Ok::<(), ravenwire_core::ContextError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    table: AttributeTable,
    stringify: Stringify,
}

impl ContextAssembler {
    /// Creates an assembler capturing the attributes of `table`.
    pub fn new(table: AttributeTable) -> Self {
        Self {
            table,
            stringify: safe_repr,
        }
    }

    /// Creates an assembler with the built-in and configured attribute names.
    pub fn from_config(config: &RavenConfig) -> Self {
        Self::new(AttributeTable::from_config(config))
    }

    /// Replaces the attribute names, ignoring the built-in ones.
    #[must_use]
    pub fn with_names<M, P>(mut self, methods: M, properties: P) -> Self
    where
        M: IntoIterator,
        M::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.table = AttributeTable::new(methods, properties);
        self
    }

    /// Replaces the function rendering body parameters, [`safe_repr`] by default.
    #[must_use]
    pub fn with_stringify(mut self, stringify: Stringify) -> Self {
        self.stringify = stringify;
        self
    }

    /// The captured attributes.
    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Assembles the snapshot of `request`.
    ///
    /// Attributes the request does not expose are skipped.
    ///
    /// # Errors
    ///
    /// Fails if a callable attribute fails or is not callable, or if the
    /// query or body parameters cannot be decoded.
    pub fn assemble(&self, request: &dyn RequestSource) -> Result<RequestSnapshot, ContextError> {
        let attributes = self.attributes(request)?;

        let cookies = request.cookies().into_iter().collect::<IndexMap<_, _>>();

        let mut headers = BTreeMap::<String, String>::new();
        for (name, value) in request.headers() {
            if name.eq_ignore_ascii_case(COOKIE_HEADER) {
                continue;
            }
            headers
                .entry(name)
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let query = group(request.query_params()?);

        let params = group(
            request
                .form_params()?
                .into_iter()
                .map(|(key, value)| (key, (self.stringify)(&value))),
        );

        debug!(
            attributes = attributes.len(),
            cookies = cookies.len(),
            headers = headers.len(),
            params = params.len(),
            query = query.len(),
            "request snapshot assembled"
        );

        Ok(RequestSnapshot {
            attributes,
            cookies,
            headers,
            params,
            query,
        })
    }

    fn attributes(
        &self,
        request: &dyn RequestSource,
    ) -> Result<IndexMap<String, Value>, AttributeError> {
        let mut result = IndexMap::new();
        for (name, kind) in self.table.iter() {
            let Some(attribute) = request.attribute(name) else {
                continue;
            };
            let value = match (kind, attribute) {
                (AttributeKind::Property, Attribute::Value(value)) => value,
                (AttributeKind::Property, Attribute::Method(_)) => {
                    Value::String(format!("<callable {name}>"))
                }
                (AttributeKind::Method, Attribute::Method(method)) => method()?,
                (AttributeKind::Method, Attribute::Value(_)) => {
                    return Err(AttributeError::NotCallable {
                        name: name.to_owned(),
                    });
                }
            };
            result.insert(name.to_owned(), value);
        }
        Ok(result)
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_config(&RavenConfig::default())
    }
}

impl ContextSource for ContextAssembler {
    fn context(&self, request: &dyn RequestSource) -> Result<RequestSnapshot, ContextError> {
        self.assemble(request)
    }
}

fn group<V>(pairs: impl IntoIterator<Item = (String, V)>) -> IndexMap<String, Vec<V>> {
    let mut result = IndexMap::<String, Vec<V>>::new();
    for (key, value) in pairs {
        result.entry(key).or_default().push(value);
    }
    result
}

/// Renders a body parameter without ever failing.
///
/// Text is debug-quoted, binary content is rendered as a byte string literal,
/// structured values as compact JSON. If formatting fails the
/// [`UNREPRESENTABLE`] placeholder is returned.
///
/// ```rust
/// use ravenwire_core::{ParamValue, safe_repr};
///
/// assert_eq!(safe_repr(&ParamValue::from("it's")), r#""it's""#);
/// assert_eq!(safe_repr(&ParamValue::Binary(vec![0x47, 0x49, 0x46, 0x00])), r#"b"GIF\x00""#);
/// ```
pub fn safe_repr(value: &ParamValue) -> String {
    let mut out = String::new();
    let written = match value {
        ParamValue::Text(text) => write!(out, "{text:?}"),
        ParamValue::Binary(bytes) => write_byte_string(&mut out, bytes),
        ParamValue::Json(json) => write!(out, "{json}"),
    };
    match written {
        Ok(()) => out,
        Err(_) => UNREPRESENTABLE.to_owned(),
    }
}

fn write_byte_string(out: &mut String, bytes: &[u8]) -> fmt::Result {
    out.push_str("b\"");
    for byte in bytes {
        write!(out, "{}", byte.escape_ascii())?;
    }
    out.push('"');
    Ok(())
}
