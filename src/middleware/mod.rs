//! Middleware layer.
//!
//! Middleware is attached at three scopes and always runs in this order:
//!
//! 1. **application**: [`App::use_middleware`](crate::App::use_middleware), every request
//! 2. **group**: [`Group::use_middleware`](crate::Group::use_middleware), routes of one group
//! 3. **router**: [`Endpoint::use_middleware`](crate::Endpoint::use_middleware), one route
//!
//! Within a scope, registration order is execution order. After the last
//! router-scope middleware the route handler runs, then control unwinds back
//! through every middleware that called [`Middleware::next`].
//!
//! A middleware only ever sees one primitive, `next`. It does not know which
//! scope it sits in or which scope follows: the tier cursor on the
//! [`Context`] takes care of that.
//!
//! # Writing a middleware
//!
//! Embed a [`Link`] and implement [`Middleware::handle`]:
//!
//! ```rust
//! use strata::middleware::{Link, Middleware};
//! use strata::{BoxFuture, Context, Error};
//!
//! #[derive(Default)]
//! struct ServerHeader {
//!     link: Link,
//! }
//!
//! impl Middleware for ServerHeader {
//!     fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
//!         Box::pin(async move {
//!             self.next(ctx).await?;
//!             if let Some(res) = ctx.response_mut() {
//!                 res.headers_mut().insert("server", http::HeaderValue::from_static("strata"));
//!             }
//!             Ok(())
//!         })
//!     }
//!
//!     fn link(&self) -> &Link { &self.link }
//!     fn link_mut(&mut self) -> &mut Link { &mut self.link }
//! }
//! ```

mod chain;
mod registry;
mod request_log;

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};

use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;

pub use chain::dispatch;
pub use registry::Registry;
pub use request_log::{HTTP_REQUEST, LogSink, RequestLog, TracingSink};

/// A unit of cross-cutting request processing.
///
/// Implementors supply [`handle`](Middleware::handle) and access to their
/// embedded [`Link`]; continuation, linking, and exclusion come for free.
///
/// `handle` must do one of:
/// - call `next` and return its result,
/// - return early (an `Err`, or after [`Context::set_response`]) without
///   calling `next`, which stops everything downstream including the handler,
/// - do work before and after awaiting `next`.
///
/// One instance serves all concurrent requests; keep per-request state on
/// the [`Context`].
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>>;

    fn link(&self) -> &Link;
    fn link_mut(&mut self) -> &mut Link;

    /// Continues the chain: the next middleware of this tier, the first of
    /// the next non-empty tier, or the route handler.
    ///
    /// Calling it again after the handler has run does nothing.
    fn next<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        self.link().next(ctx)
    }

    fn set_next(&self, next: &Arc<dyn Middleware>) {
        self.link().set_next(next);
    }

    /// Skips this middleware for the named routes.
    fn exclude<I, S>(mut self, routes: I) -> Self
    where
        Self: Sized,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.link_mut().exclude(routes);
        self
    }

    fn is_excluded(&self, route: &str) -> bool {
        self.link().is_excluded(route)
    }

    /// Shown in trace logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// The part every middleware shares: where it sits in its tier and which
/// routes it stays out of.
///
/// The successor is a [`Weak`] reference. The [`Registry`] owns every node;
/// a node never keeps its successor alive.
#[derive(Default)]
pub struct Link {
    next: OnceLock<Weak<dyn Middleware>>,
    excluded: HashSet<String>,
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the chain from this node's position onward.
    pub fn next<'a>(&self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        chain::advance(self.successor(), ctx)
    }

    /// Links a successor. A node joins exactly one tier, so the first link
    /// wins.
    pub fn set_next(&self, next: &Arc<dyn Middleware>) {
        let linked = self.next.set(Arc::downgrade(next));
        debug_assert!(linked.is_ok(), "middleware linked twice");
    }

    pub fn successor(&self) -> Option<Arc<dyn Middleware>> {
        self.next.get().and_then(Weak::upgrade)
    }

    pub fn exclude<I, S>(&mut self, routes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(routes.into_iter().map(Into::into));
    }

    pub fn is_excluded(&self, route: &str) -> bool {
        self.excluded.contains(route)
    }
}
