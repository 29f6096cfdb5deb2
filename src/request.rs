//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri, Version};

/// An incoming HTTP request with its body fully buffered.
///
/// Cloning is cheap: the head and path parameters are shared, the body is a
/// reference-counted [`Bytes`]. Only the [`Extensions`] are copied, which is
/// what lets middleware attach values for the handler without touching other
/// requests.
#[derive(Clone, Debug)]
pub struct Request {
    head: Arc<Head>,
    body: Bytes,
    params: Arc<HashMap<String, String>>,
    extensions: Extensions,
}

#[derive(Clone, Debug)]
struct Head {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    remote_addr: SocketAddr,
}

impl Request {
    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes, remote_addr: SocketAddr) -> Self {
        let head = Head {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            remote_addr,
        };
        Self {
            head: Arc::new(head),
            body,
            params: Arc::default(),
            extensions: Extensions::new(),
        }
    }

    /// Builds a request without a connection, for tests and embedding.
    /// An unparsable `uri` becomes `/`.
    ///
    /// ```rust
    /// use strata::{Method, Request};
    ///
    /// let req = Request::new(Method::GET, "/users/42", "10.0.0.1:5000".parse().unwrap());
    /// assert_eq!(req.path(), "/users/42");
    /// ```
    pub fn new(method: Method, uri: &str, remote_addr: SocketAddr) -> Self {
        let mut req = http::Request::new(());
        *req.method_mut() = method;
        *req.uri_mut() = uri.parse().unwrap_or_default();
        let (parts, ()) = req.into_parts();
        Self::from_parts(parts, Bytes::new(), remote_addr)
    }

    /// Replaces the body. Builder-style companion to [`Request::new`].
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds a header. Builder-style companion to [`Request::new`].
    pub fn with_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        Arc::make_mut(&mut self.head).headers.append(name, value);
        self
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = Arc::new(params);
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn version(&self) -> Version { self.head.version }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }
    pub fn remote_addr(&self) -> SocketAddr { self.head.remote_addr }

    /// Path and query as received, e.g. `/search?q=rust`.
    pub fn url(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Protocol string in the form used by access logs, e.g. `HTTP/1.1`.
    pub fn proto(&self) -> &'static str {
        match self.head.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2  => "HTTP/2.0",
            Version::HTTP_3  => "HTTP/3.0",
            _                => "HTTP/?",
        }
    }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request body length: the `content-length` header when present and
    /// well-formed, otherwise the buffered body size.
    pub fn content_length(&self) -> u64 {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(self.body.len() as u64)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The client address as seen through the reverse proxy.
    ///
    /// Takes the first hop of `X-Forwarded-For`, then `X-Real-IP`, and falls
    /// back to the peer address of the TCP connection.
    pub fn remote_ip(&self) -> IpAddr {
        let forwarded: Option<IpAddr> = self.header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        let real = || self.header("x-real-ip").and_then(|v| v.trim().parse().ok());
        forwarded.or_else(real).unwrap_or(self.head.remote_addr.ip())
    }
}
