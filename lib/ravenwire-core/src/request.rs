//! The capability interface a host request exposes to this crate.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

/// A diagnostic attribute exposed by a request.
pub enum Attribute<'a> {
    /// A plain value, read directly.
    Value(Value),
    /// A zero-argument accessor, invoked to obtain the value.
    Method(Box<dyn FnOnce() -> Result<Value, AttributeError> + 'a>),
}

impl fmt::Debug for Attribute<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Method(_) => f.write_str("Method(..)"),
        }
    }
}

/// Errors raised by request attributes.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum AttributeError {
    /// A callable attribute was expected but the request exposes a plain value.
    #[display("Request attribute '{name}' is not callable")]
    NotCallable {
        /// The attribute name.
        name: String,
    },

    /// A callable attribute failed.
    #[display("Request attribute '{name}' failed: {message}")]
    Failed {
        /// The attribute name.
        name: String,
        /// Description of the failure.
        message: String,
    },
}

impl AttributeError {
    /// Creates a [`AttributeError::Failed`] error.
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while decoding request parameters.
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub enum ParamsError {
    /// The query string cannot be decoded.
    #[display("Invalid query string: {_0}")]
    Query(serde_urlencoded::de::Error),

    /// The form body cannot be decoded.
    #[display("Invalid form body: {_0}")]
    Form(serde_urlencoded::de::Error),

    /// The multipart body cannot be decoded.
    #[display("Invalid multipart body: {message}")]
    Multipart {
        /// Description of the failure.
        message: String,
    },

    /// The request could not provide its parameters.
    #[display("Unavailable request parameters: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// A value submitted in a request body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Text field.
    Text(String),
    /// Binary content, e.g. an uploaded file.
    Binary(Vec<u8>),
    /// Structured value.
    Json(Value),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Read-only view over an in-flight request.
///
/// Implemented by the host framework's request type. Every method reads data
/// already buffered by the framework; none of them performs I/O.
pub trait RequestSource {
    /// Looks up a diagnostic attribute by name, `None` if the request does not have it.
    fn attribute(&self, name: &str) -> Option<Attribute<'_>>;

    /// All cookies, in the order given by the cookie jar.
    fn cookies(&self) -> Vec<(String, String)>;

    /// All header name/value pairs, including repeated names.
    fn headers(&self) -> Vec<(String, String)>;

    /// All query (GET) parameters, including repeated keys.
    ///
    /// # Errors
    ///
    /// Fails if the query string cannot be decoded.
    fn query_params(&self) -> Result<Vec<(String, String)>, ParamsError>;

    /// All body (POST) parameters, including repeated keys.
    ///
    /// # Errors
    ///
    /// Fails if the body cannot be decoded.
    fn form_params(&self) -> Result<Vec<(String, ParamValue)>, ParamsError>;

    /// The base url of the application serving the request, e.g. `https://example.com`.
    fn application_url(&self) -> String;
}

type MethodFn = Arc<dyn Fn() -> Result<Value, AttributeError> + Send + Sync>;

#[derive(Clone)]
enum MemoryAttribute {
    Value(Value),
    Method(MethodFn),
}

/// A [`RequestSource`] holding its data in memory.
///
/// Handy for hosts that do not use the `http` crate, and for tests.
///
/// ```rust
/// use ravenwire_core::{MemoryRequest, RequestSource};
///
/// let request = MemoryRequest::new("https://example.com")
///     .with_cookie("a", "b")
///     .with_header("Host", "example.com")
///     .with_query("tag", "rust")
///     .with_property("matched_route", "home");
///
/// assert_eq!(request.application_url(), "https://example.com");
/// assert!(request.attribute("matched_route").is_some());
/// assert!(request.attribute("view_name").is_none());
/// ```
#[derive(Clone, derive_more::Debug)]
pub struct MemoryRequest {
    application_url: String,
    #[debug("{:?}", attributes.keys().collect::<Vec<_>>())]
    attributes: IndexMap<String, MemoryAttribute>,
    cookies: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    form: Vec<(String, ParamValue)>,
    params_error: Option<String>,
}

impl MemoryRequest {
    /// Creates an empty request served under `application_url`.
    pub fn new(application_url: impl Into<String>) -> Self {
        Self {
            application_url: application_url.into(),
            attributes: IndexMap::new(),
            cookies: Vec::new(),
            headers: Vec::new(),
            query: Vec::new(),
            form: Vec::new(),
            params_error: None,
        }
    }

    /// Adds a plain attribute.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes
            .insert(name.into(), MemoryAttribute::Value(value.into()));
        self
    }

    /// Adds a callable attribute.
    #[must_use]
    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn() -> Result<Value, AttributeError> + Send + Sync + 'static,
    {
        self.attributes
            .insert(name.into(), MemoryAttribute::Method(Arc::new(method)));
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Adds a body parameter.
    #[must_use]
    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Makes parameter decoding fail with `message`.
    #[must_use]
    pub fn with_params_error(mut self, message: impl Into<String>) -> Self {
        self.params_error = Some(message.into());
        self
    }

    fn check_params(&self) -> Result<(), ParamsError> {
        match &self.params_error {
            Some(message) => Err(ParamsError::Unavailable {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl RequestSource for MemoryRequest {
    fn attribute(&self, name: &str) -> Option<Attribute<'_>> {
        let attribute = match self.attributes.get(name)? {
            MemoryAttribute::Value(value) => Attribute::Value(value.clone()),
            MemoryAttribute::Method(method) => {
                let method = Arc::clone(method);
                Attribute::Method(Box::new(move || method()))
            }
        };
        Some(attribute)
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.cookies.clone()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn query_params(&self) -> Result<Vec<(String, String)>, ParamsError> {
        self.check_params()?;
        Ok(self.query.clone())
    }

    fn form_params(&self) -> Result<Vec<(String, ParamValue)>, ParamsError> {
        self.check_params()?;
        Ok(self.form.clone())
    }

    fn application_url(&self) -> String {
        self.application_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_request_attributes() {
        let request = MemoryRequest::new("http://localhost")
            .with_property("charset", "UTF-8")
            .with_method("geoip", || Ok(json!({"country": "FR"})));

        let Some(Attribute::Value(charset)) = request.attribute("charset") else {
            panic!("charset should be a value");
        };
        assert_eq!(charset, json!("UTF-8"));

        let Some(Attribute::Method(geoip)) = request.attribute("geoip") else {
            panic!("geoip should be a method");
        };
        assert_eq!(geoip().expect("geoip succeeds"), json!({"country": "FR"}));

        assert!(request.attribute("missing").is_none());
    }

    #[test]
    fn test_memory_request_params_error() {
        let request = MemoryRequest::new("http://localhost")
            .with_query("a", "1")
            .with_params_error("body too large");

        let error = request.query_params().expect_err("should fail");

        assert_eq!(
            error.to_string(),
            "Unavailable request parameters: body too large"
        );
    }

    #[test]
    fn test_attribute_debug() {
        let method = Attribute::Method(Box::new(|| Ok(Value::Null)));

        assert_eq!(format!("{method:?}"), "Method(..)");
        assert_eq!(
            format!("{:?}", Attribute::Value(json!(1))),
            "Value(Number(1))"
        );
    }
}
