use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Uri, Version, header, request::Parts};
use bytes::Bytes;
use dashmap::DashMap;
use serde_json::Value;

use crate::exception::{Exception, HttpException};

/// An inbound HTTP request with its body buffered.
///
/// Shared by reference across middleware, guards, interceptors and the
/// handler. Middleware attaches request-scoped state with [`insert`](Self::insert).
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    state: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl HttpRequest {
    pub fn new(parts: Parts, body: Bytes) -> Self {
        let query = parts
            .uri
            .query()
            .and_then(|query| serde_urlencoded::from_str::<Vec<(String, String)>>(query).ok())
            .map(|pairs| pairs.into_iter().collect())
            .unwrap_or_default();

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            query,
            state: DashMap::new(),
        }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type()
            .is_some_and(|content_type| content_type.starts_with("multipart/form-data"))
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// The body as JSON.
    ///
    /// Only parsed for non-GET/HEAD requests with a JSON content type;
    /// anything else yields an empty object.
    pub fn json_body(&self) -> Result<Value, Exception> {
        let parses = !matches!(self.method, Method::GET | Method::HEAD)
            && self
                .content_type()
                .is_some_and(|content_type| content_type.contains("json"));
        if !parses {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_slice(&self.body).map_err(|_| HttpException::bad_request("Invalid body").into())
    }

    /// Attaches request-scoped state, replacing any value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) {
        self.state.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let value = Arc::clone(self.state.get(&TypeId::of::<T>())?.value());
        value.downcast::<T>().ok()
    }

    /// The file attached by an upload interceptor, if any.
    pub fn file(&self) -> Option<Arc<UploadedFile>> {
        self.get::<UploadedFile>()
    }

    /// Rebuilds an owned request, for extractors that consume one.
    pub fn to_request(&self) -> Request<Body> {
        let mut request = Request::new(Body::from(self.body.clone()));
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.version_mut() = self.version;
        *request.headers_mut() = self.headers.clone();
        request
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("params", &self.params)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// A file received as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> HttpRequest {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    HttpRequest::new(parts, Bytes::copy_from_slice(body.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_keeps_last_value() {
        let request = test_request(Method::GET, "/items?page=1&page=2&q=a%20b", None, "");
        assert_eq!(request.query("page"), Some("2"));
        assert_eq!(request.query("q"), Some("a b"));
    }

    #[test]
    fn json_body_requires_json_content_type() {
        let request = test_request(Method::POST, "/", Some("text/plain"), "{\"a\":1}");
        assert_eq!(request.json_body().unwrap(), json!({}));

        let request = test_request(Method::POST, "/", Some("application/json"), "{\"a\":1}");
        assert_eq!(request.json_body().unwrap(), json!({"a": 1}));

        let request = test_request(Method::GET, "/", Some("application/json"), "{\"a\":1}");
        assert_eq!(request.json_body().unwrap(), json!({}));
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let request = test_request(Method::POST, "/", Some("application/json"), "{not json");
        let err = request.json_body().unwrap_err();
        assert_eq!(err.status(), Some(axum::http::StatusCode::BAD_REQUEST));
    }

    #[test]
    fn state_is_typed() {
        #[derive(Debug, PartialEq)]
        struct User(&'static str);

        let request = test_request(Method::GET, "/", None, "");
        assert!(request.get::<User>().is_none());
        request.insert(User("admin"));
        assert_eq!(*request.get::<User>().unwrap(), User("admin"));
    }
}
