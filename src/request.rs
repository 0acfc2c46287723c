//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderName, HeaderValue};

use crate::method::Method;
use crate::shutdown::ShutdownWatch;

/// An incoming HTTP request with its body fully buffered.
///
/// Besides the wire data, a request carries a typed extension map. Upstream
/// middleware inserts request-scoped values (an authenticated user, a
/// request id) and downstream handlers read them back by type:
///
/// ```rust
/// use rest_easy::{Method, Request};
///
/// #[derive(Clone)]
/// struct AuthUser(String);
///
/// let mut req = Request::new(Method::Get, "/internal/metrics");
/// assert!(req.extensions().get::<AuthUser>().is_none());
///
/// req.extensions_mut().insert(AuthUser("alice".into()));
/// assert_eq!(req.extensions().get::<AuthUser>().map(|u| u.0.as_str()), Some("alice"));
/// ```
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) extensions: Extensions,
    pub(crate) shutdown: Option<ShutdownWatch>,
}

impl Request {
    /// Builds a request by hand, mostly useful for exercising handlers and
    /// middleware without a socket.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: HashMap::new(),
            remote_addr: None,
            extensions: Extensions::new(),
            shutdown: None,
        }
    }

    pub(crate) fn from_parts(
        parts: http::request::Parts,
        method: Method,
        body: Bytes,
        remote_addr: SocketAddr,
        shutdown: ShutdownWatch,
    ) -> Self {
        Self {
            method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr: Some(remote_addr),
            extensions: parts.extensions,
            shutdown: Some(shutdown),
        }
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the peer address.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `User-Agent` header, or `""` when the client sent none.
    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Request-scoped values attached by middleware.
    pub fn extensions(&self) -> &Extensions { &self.extensions }

    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    pub(crate) fn shutdown_watch(&self) -> Option<ShutdownWatch> {
        self.shutdown.clone()
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("remote_addr", &self.remote_addr)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}
