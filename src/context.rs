//! Per-request state threaded through the middleware chain.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::route::Route;

/// Which middleware tier a request is currently walking.
///
/// The cursor lives on the [`Context`] rather than on any middleware: the
/// same linked nodes serve every concurrent request, each of which is at its
/// own position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Tier {
    /// No middleware has continued yet.
    #[default]
    Unset,
    Application,
    Group,
    Router,
    /// The route handler has been invoked; further continuations are no-ops.
    Handled,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset       => "unset",
            Self::Application => "app",
            Self::Group       => "group",
            Self::Router      => "router",
            Self::Handled     => "handled",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request's trip through the middleware tiers and its handler.
///
/// Owned by the task serving the request and handed to each middleware as
/// `&mut Context`, so no two middleware can touch it at once and nothing
/// leaks between requests.
pub struct Context {
    route: Arc<Route>,
    request: Request,
    response: Option<Response>,
    deferred: Option<Error>,
    started: Instant,
    pub(crate) tier: Tier,
}

impl Context {
    /// Starts a request against an already resolved route. The start time is
    /// taken now.
    pub fn new(route: Arc<Route>, request: Request) -> Self {
        Self {
            route,
            request,
            response: None,
            deferred: None,
            started: Instant::now(),
            tier: Tier::Unset,
        }
    }

    pub fn route(&self) -> &Arc<Route> { &self.route }
    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn tier(&self) -> Tier { self.tier }

    /// `true` once the route handler has been invoked for this request.
    pub fn is_handled(&self) -> bool {
        self.tier == Tier::Handled
    }

    /// Client address, honouring proxy headers. See [`Request::remote_ip`].
    pub fn remote_ip(&self) -> IpAddr {
        self.request.remote_ip()
    }

    pub fn started(&self) -> Instant { self.started }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The response written so far, by the handler or by a middleware.
    pub fn response(&self) -> Option<&Response> { self.response.as_ref() }
    pub fn response_mut(&mut self) -> Option<&mut Response> { self.response.as_mut() }

    /// Writes the response. A middleware that answers on its own calls this
    /// and returns without calling `next`.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Stores a request-scoped value, visible to later middleware and to the
    /// handler through [`Request::extensions`].
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.request.extensions_mut().insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.extensions().get::<T>()
    }

    /// Parks an error that a middleware observed but chose not to return.
    ///
    /// The service still answers with it once the chain has unwound, unless
    /// a response was written in the meantime. The first deferred error is
    /// kept; later ones are dropped.
    pub fn defer_error(&mut self, error: Error) {
        if self.deferred.is_some() {
            tracing::debug!(%error, "an error is already deferred, dropping this one");
            return;
        }
        self.deferred = Some(error);
    }

    pub fn deferred_error(&self) -> Option<&Error> { self.deferred.as_ref() }

    pub(crate) fn take_deferred_error(&mut self) -> Option<Error> {
        self.deferred.take()
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::middleware::Registry;

    async fn ok(_req: Request) -> Result<Response, Error> {
        Ok(Response::text("ok"))
    }

    fn context() -> Context {
        let route = Route::new("r", Arc::new(Registry::new()), Registry::new(), ok);
        Context::new(Arc::new(route), Request::new(Method::GET, "/", "127.0.0.1:9000".parse().unwrap()))
    }

    #[test]
    fn first_deferred_error_wins() {
        let mut ctx = context();
        ctx.defer_error(Error::http(StatusCode::CONFLICT, "inner"));
        ctx.defer_error(Error::http(StatusCode::BAD_GATEWAY, "outer"));

        assert_eq!(ctx.deferred_error().map(Error::status_code), Some(StatusCode::CONFLICT));
        assert_eq!(ctx.take_deferred_error().map(|e| e.status_code()), Some(StatusCode::CONFLICT));
        assert!(ctx.deferred_error().is_none());
    }
}
