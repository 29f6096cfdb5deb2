//! The resolved route a request is dispatched against.

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::Registry;

/// Everything the middleware chain needs to know about the matched route:
/// its name (used for exclusions), the group tier, the router tier, and the
/// handler at the end of both.
///
/// The group registry is shared by every route of the group; the router
/// registry belongs to this route alone. Neither can change once the route
/// exists.
pub struct Route {
    name: String,
    group: Arc<Registry>,
    middlewares: Registry,
    handler: BoxedHandler,
}

impl Route {
    pub fn new(
        name: impl Into<String>,
        group: Arc<Registry>,
        middlewares: Registry,
        handler: impl Handler,
    ) -> Self {
        Self::from_boxed(name.into(), group, middlewares, handler.into_boxed_handler())
    }

    pub(crate) fn from_boxed(
        name: String,
        group: Arc<Registry>,
        middlewares: Registry,
        handler: BoxedHandler,
    ) -> Self {
        Self { name, group, middlewares, handler }
    }

    /// Identifier matched against middleware exclusion sets. Defaults to the
    /// full path pattern, e.g. `/api/users/{id}`.
    pub fn name(&self) -> &str { &self.name }
    pub fn group_middlewares(&self) -> &Registry { &self.group }
    pub fn middlewares(&self) -> &Registry { &self.middlewares }

    pub(crate) fn handler(&self) -> &BoxedHandler { &self.handler }
}
