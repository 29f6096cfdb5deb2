use std::fmt;
use std::sync::Arc;

use super::Middleware;

/// The ordered middleware of one scope.
///
/// Pushing a node links the previous tail to it, so the registry is both the
/// owner of its nodes and the source of their order.
#[derive(Default)]
pub struct Registry {
    nodes: Vec<Arc<dyn Middleware>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` and links it after the current tail.
    pub fn push(&mut self, middleware: impl Middleware) {
        let node: Arc<dyn Middleware> = Arc::new(middleware);
        if let Some(tail) = self.nodes.last() {
            tail.set_next(&node);
        }
        self.nodes.push(node);
    }

    /// Builder-style [`push`](Registry::push).
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.push(middleware);
        self
    }

    pub fn first(&self) -> Option<Arc<dyn Middleware>> {
        self.nodes.first().cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Middleware>> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter().map(|m| m.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::Error;
    use crate::handler::BoxFuture;
    use crate::middleware::Link;

    #[derive(Default)]
    struct Pass {
        link: Link,
    }

    impl Middleware for Pass {
        fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
            self.next(ctx)
        }

        fn link(&self) -> &Link { &self.link }
        fn link_mut(&mut self) -> &mut Link { &mut self.link }
    }

    #[test]
    fn push_links_in_insertion_order() {
        let registry = Registry::new().with(Pass::default()).with(Pass::default()).with(Pass::default());
        assert_eq!(registry.len(), 3);

        let mut walked = Vec::new();
        let mut cursor = registry.first();
        while let Some(node) = cursor {
            cursor = node.link().successor();
            walked.push(node);
        }

        assert_eq!(walked.len(), 3);
        for (walked, registered) in walked.iter().zip(registry.iter()) {
            assert!(Arc::ptr_eq(walked, registered));
        }
    }

    #[test]
    fn empty_registry_has_no_first() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.first().is_none());
    }
}
