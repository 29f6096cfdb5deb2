//! Registration: where middleware gets attached and routes get declared.
//!
//! ```rust,no_run
//! use strata::middleware::{Middleware, RequestLog, TracingSink};
//! use strata::{App, Endpoint, Error, Group, Request, Response};
//!
//! async fn list_users(_req: Request) -> Result<Response, Error> { Ok(Response::text("[]")) }
//! async fn get_user(_req: Request) -> Result<Response, Error> { Ok(Response::text("{}")) }
//! async fn healthz(_req: Request) -> Result<Response, Error> { Ok(Response::text("ok")) }
//!
//! let app = App::new()
//!     .use_middleware(RequestLog::new(TracingSink).exclude(["/healthz"]))   // application tier
//!     .get("/healthz", healthz)
//!     .group(
//!         Group::new("/api")
//!             // .use_middleware(Auth::new())                       // group tier
//!             .get("/users", list_users)
//!             .route(Endpoint::get("/users/{id}", get_user).name("get_user")),
//!     );
//! let service = app.build();
//! ```

use std::sync::Arc;

use http::{Method, StatusCode};
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{Middleware, Registry, dispatch};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::route::Route;
use crate::router::{Lookup, Router};

/// `get`, `post`, … shortcuts over a builder's `on`.
macro_rules! method_shortcuts {
    () => {
        pub fn get(self, path: &str, handler: impl Handler) -> Self {
            self.on(Method::GET, path, handler)
        }

        pub fn post(self, path: &str, handler: impl Handler) -> Self {
            self.on(Method::POST, path, handler)
        }

        pub fn put(self, path: &str, handler: impl Handler) -> Self {
            self.on(Method::PUT, path, handler)
        }

        pub fn patch(self, path: &str, handler: impl Handler) -> Self {
            self.on(Method::PATCH, path, handler)
        }

        pub fn delete(self, path: &str, handler: impl Handler) -> Self {
            self.on(Method::DELETE, path, handler)
        }
    };
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// One route and its router-tier middleware.
pub struct Endpoint {
    method: Method,
    path: String,
    name: Option<String>,
    middlewares: Registry,
    handler: BoxedHandler,
}

impl Endpoint {
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.to_owned(),
            name: None,
            middlewares: Registry::new(),
            handler: handler.into_boxed_handler(),
        }
    }

    pub fn get(path: &str, handler: impl Handler) -> Self { Self::new(Method::GET, path, handler) }
    pub fn post(path: &str, handler: impl Handler) -> Self { Self::new(Method::POST, path, handler) }
    pub fn put(path: &str, handler: impl Handler) -> Self { Self::new(Method::PUT, path, handler) }
    pub fn patch(path: &str, handler: impl Handler) -> Self { Self::new(Method::PATCH, path, handler) }
    pub fn delete(path: &str, handler: impl Handler) -> Self { Self::new(Method::DELETE, path, handler) }

    /// Attaches router-tier middleware, run after every application- and
    /// group-tier middleware.
    pub fn use_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Overrides the route name that middleware exclusions match against.
    /// Without it the name is the full path pattern.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn mount(self, router: &mut Router, prefix: &str, group: &Arc<Registry>) {
        let path = format!("{}{}", prefix.trim_end_matches('/'), self.path);
        let name = self.name.unwrap_or_else(|| path.clone());
        let route = Route::from_boxed(name, Arc::clone(group), self.middlewares, self.handler);
        router.insert(self.method, &path, route);
    }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// Routes under a common prefix sharing group-tier middleware.
pub struct Group {
    prefix: String,
    middlewares: Registry,
    endpoints: Vec<Endpoint>,
}

impl Group {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_owned(), middlewares: Registry::new(), endpoints: Vec::new() }
    }

    /// Attaches group-tier middleware, run after application-tier middleware
    /// and before any route's own.
    pub fn use_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Endpoint::new(method, path, handler))
    }

    pub fn route(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    method_shortcuts!();
}

// ── App ───────────────────────────────────────────────────────────────────────

/// The application: application-tier middleware plus every route.
///
/// Build it once at startup; [`App::build`] freezes it into a [`Service`],
/// after which no middleware can be added or removed.
#[derive(Default)]
pub struct App {
    middlewares: Registry,
    endpoints: Vec<Endpoint>,
    groups: Vec<Group>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches application-tier middleware, run first for every request.
    pub fn use_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Endpoint::new(method, path, handler))
    }

    pub fn route(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    method_shortcuts!();

    /// Freezes registration into a route table.
    ///
    /// # Panics
    ///
    /// Panics on an invalid or conflicting path, naming it.
    pub fn build(self) -> Service {
        let mut router = Router::default();

        let ungrouped = Arc::new(Registry::new());
        for endpoint in self.endpoints {
            endpoint.mount(&mut router, "", &ungrouped);
        }

        for Group { prefix, middlewares, endpoints } in self.groups {
            let shared = Arc::new(middlewares);
            for endpoint in endpoints {
                endpoint.mount(&mut router, &prefix, &shared);
            }
        }

        Service { middlewares: self.middlewares, router }
    }
}

// ── Service ───────────────────────────────────────────────────────────────────

/// A frozen [`App`]: turns one [`Request`] into one [`Response`].
pub struct Service {
    middlewares: Registry,
    router: Router,
}

impl Service {
    /// Routes `req`, runs it through every middleware tier and the handler,
    /// and converts a propagated error into its HTTP response.
    pub async fn call(&self, mut req: Request) -> Response {
        let route = match self.router.lookup(req.method(), req.path()) {
            Lookup::Found(route, params) => {
                req.set_params(params);
                route
            }
            Lookup::MethodNotAllowed => return Response::status(StatusCode::METHOD_NOT_ALLOWED),
            Lookup::NotFound => return Response::status(StatusCode::NOT_FOUND),
        };

        let mut ctx = Context::new(route, req);
        let result = dispatch(&self.middlewares, &mut ctx).await;
        finish(ctx, result)
    }
}

fn finish(mut ctx: Context, result: Result<(), Error>) -> Response {
    if let Err(err) = result {
        return error_response(&ctx, err);
    }
    if let Some(res) = ctx.take_response() {
        return res;
    }
    if let Some(err) = ctx.take_deferred_error() {
        return error_response(&ctx, err);
    }

    if !ctx.is_handled() {
        warn!(
            route = ctx.route().name(),
            tier = %ctx.tier(),
            "request finished without reaching its handler or writing a response",
        );
    }
    Response::status(StatusCode::OK)
}

fn error_response(ctx: &Context, err: Error) -> Response {
    if err.status_code().is_server_error() {
        error!(route = ctx.route().name(), "request failed: {err}");
    } else {
        debug!(route = ctx.route().name(), status = err.status_code().as_u16(), "request rejected: {err}");
    }
    err.into_response()
}
