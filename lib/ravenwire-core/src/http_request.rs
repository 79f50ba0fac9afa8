//! [`RequestSource`] over the `http` crate request types.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use headers::{ContentType, Cookie, HeaderMapExt, Host};
use http::request::Parts;
use http::{HeaderName, Method};
use indexmap::IndexMap;
use mime::Mime;
use serde_json::Value;
use tracing::debug;

use crate::request::{Attribute, AttributeError, ParamValue, ParamsError, RequestSource};

const DEFAULT_SCHEME: &str = "http";
const DEFAULT_HOST: &str = "localhost";

static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const MULTIPART_NOT_READ: &str = "multipart body was not read";

type PropertyResolver = Arc<dyn Fn(&Parts) -> Option<Value> + Send + Sync>;
type MethodResolver = Arc<dyn Fn(&Parts) -> Result<Value, AttributeError> + Send + Sync>;

/// Named attribute resolvers, built once at startup.
///
/// Property resolvers read a value out of the request head, method resolvers
/// are only invoked when the attribute is captured.
///
/// ```rust
/// use ravenwire_core::AttributeResolvers;
/// use serde_json::json;
///
/// let resolvers = AttributeResolvers::new()
///     .with_property("method", |parts| Some(json!(parts.method.as_str())))
///     .with_method("geoip", |_| Ok(json!({"country": "FR"})));
///
/// assert_eq!(resolvers.names().collect::<Vec<_>>(), vec!["method", "geoip"]);
/// ```
#[derive(Clone, Default, derive_more::Debug)]
pub struct AttributeResolvers {
    #[debug("{:?}", properties.keys().collect::<Vec<_>>())]
    properties: IndexMap<String, PropertyResolver>,
    #[debug("{:?}", methods.keys().collect::<Vec<_>>())]
    methods: IndexMap<String, MethodResolver>,
}

impl AttributeResolvers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property resolver; `None` means the request has no such attribute.
    #[must_use]
    pub fn with_property<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Parts) -> Option<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        self.methods.shift_remove(&name);
        self.properties.insert(name, Arc::new(resolver));
        self
    }

    /// Adds a method resolver.
    #[must_use]
    pub fn with_method<F>(mut self, name: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&Parts) -> Result<Value, AttributeError> + Send + Sync + 'static,
    {
        let name = name.into();
        self.properties.shift_remove(&name);
        self.methods.insert(name, Arc::new(resolver));
        self
    }

    /// Names of every resolver, properties first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .keys()
            .chain(self.methods.keys())
            .map(String::as_str)
    }
}

/// Decodable form body of a request.
enum FormBody {
    UrlEncoded,
    Multipart { boundary: String },
}

/// A [`RequestSource`] over a buffered `http` request.
///
/// URL-encoded forms are decoded on demand. A `multipart/form-data` body is
/// decoded by [`HttpRequestSource::read_multipart`], which must be awaited
/// before the request is captured.
///
/// ```rust
/// use bytes::Bytes;
/// use ravenwire_core::{HttpRequestSource, RequestSource};
///
/// let request = http::Request::builder()
///     .uri("/search?q=rust")
///     .header("host", "example.com")
///     .body(())
///     .expect("a valid request");
/// let (parts, ()) = request.into_parts();
///
/// let source = HttpRequestSource::new(parts, Bytes::new());
///
/// assert_eq!(source.application_url(), "http://example.com");
/// assert_eq!(
///     source.query_params().expect("a valid query"),
///     vec![("q".to_owned(), "rust".to_owned())]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequestSource {
    parts: Parts,
    body: Bytes,
    resolvers: Arc<AttributeResolvers>,
    values: IndexMap<String, Value>,
    multipart: Option<Result<Vec<(String, ParamValue)>, String>>,
}

impl HttpRequestSource {
    /// Wraps a request head and its buffered body.
    pub fn new(parts: Parts, body: Bytes) -> Self {
        Self {
            parts,
            body,
            resolvers: Arc::default(),
            values: IndexMap::new(),
            multipart: None,
        }
    }

    /// Uses the given attribute resolvers.
    #[must_use]
    pub fn with_resolvers(mut self, resolvers: Arc<AttributeResolvers>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Attaches a precomputed attribute, taking precedence over the resolvers.
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// The request head.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// The buffered body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes a `multipart/form-data` body.
    ///
    /// Text fields become [`ParamValue::Text`], file uploads become
    /// [`ParamValue::Binary`] with the raw content. Other bodies are left
    /// untouched.
    #[must_use]
    pub async fn read_multipart(mut self) -> Self {
        if let Some(FormBody::Multipart { boundary }) = self.form_body() {
            let params = parse_multipart(self.body.clone(), boundary).await;
            if let Err(error) = &params {
                debug!(%error, "invalid multipart body");
            }
            self.multipart = Some(params.map_err(|error| error.to_string()));
        }
        self
    }

    fn form_body(&self) -> Option<FormBody> {
        if ![Method::POST, Method::PUT, Method::PATCH].contains(&self.parts.method) {
            return None;
        }
        let mime = Mime::from(self.parts.headers.typed_get::<ContentType>()?);
        if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
            Some(FormBody::UrlEncoded)
        } else if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
            let boundary = mime.get_param(mime::BOUNDARY)?.as_str().to_owned();
            Some(FormBody::Multipart { boundary })
        } else {
            None
        }
    }
}

async fn parse_multipart(
    body: Bytes,
    boundary: String,
) -> Result<Vec<(String, ParamValue)>, multer::Error> {
    let stream = futures_util::stream::iter([Ok::<_, Infallible>(body)]);
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut params = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        let value = if field.file_name().is_some() {
            ParamValue::Binary(field.bytes().await?.to_vec())
        } else {
            ParamValue::Text(field.text().await?)
        };
        params.push((name, value));
    }
    Ok(params)
}

impl RequestSource for HttpRequestSource {
    fn attribute(&self, name: &str) -> Option<Attribute<'_>> {
        if let Some(value) = self.values.get(name) {
            return Some(Attribute::Value(value.clone()));
        }
        if let Some(resolver) = self.resolvers.properties.get(name) {
            return resolver(&self.parts).map(Attribute::Value);
        }
        let resolver = self.resolvers.methods.get(name)?;
        let parts = &self.parts;
        Some(Attribute::Method(Box::new(move || resolver(parts))))
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.parts
            .headers
            .typed_get::<Cookie>()
            .map(|cookie| {
                cookie
                    .iter()
                    .map(|(name, value)| (name.to_owned(), value.to_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.parts
            .headers
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_owned(), value)
            })
            .collect()
    }

    fn query_params(&self) -> Result<Vec<(String, String)>, ParamsError> {
        let Some(query) = self.parts.uri.query() else {
            return Ok(Vec::new());
        };
        serde_urlencoded::from_str(query).map_err(ParamsError::Query)
    }

    fn form_params(&self) -> Result<Vec<(String, ParamValue)>, ParamsError> {
        match self.form_body() {
            None => Ok(Vec::new()),
            Some(FormBody::UrlEncoded) => {
                let pairs: Vec<(String, String)> =
                    serde_urlencoded::from_bytes(&self.body).map_err(ParamsError::Form)?;
                let params = pairs
                    .into_iter()
                    .map(|(key, value)| (key, ParamValue::Text(value)))
                    .collect();
                Ok(params)
            }
            Some(FormBody::Multipart { .. }) => match &self.multipart {
                Some(Ok(params)) => Ok(params.clone()),
                Some(Err(message)) => Err(ParamsError::Multipart {
                    message: message.clone(),
                }),
                None => Err(ParamsError::Unavailable {
                    message: MULTIPART_NOT_READ.to_owned(),
                }),
            },
        }
    }

    fn application_url(&self) -> String {
        let headers = &self.parts.headers;
        let scheme = headers
            .get(&X_FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| self.parts.uri.scheme_str())
            .unwrap_or(DEFAULT_SCHEME);

        let host = match headers.typed_get::<Host>() {
            Some(host) => match host.port() {
                Some(port) => format!("{}:{port}", host.hostname()),
                None => host.hostname().to_owned(),
            },
            None => self
                .parts
                .uri
                .authority()
                .map_or_else(|| DEFAULT_HOST.to_owned(), ToString::to_string),
        };

        format!("{scheme}://{host}")
    }
}
