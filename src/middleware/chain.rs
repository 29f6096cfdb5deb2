//! The coordinator behind every `next` call.
//!
//! # Tier cursor
//!
//! ```text
//! Unset ─▶ Application ─▶ Group ─▶ Router ─▶ Handled
//!            app nodes     group     route     handler
//!                          nodes     nodes     ran once
//! ```
//!
//! A continuation with a successor in the same tier enters that successor.
//! A continuation from the end of a tier moves the cursor forward, entering
//! the first node of the next non-empty tier, or the handler after the
//! router tier. Once the cursor reads `Handled` there is nothing left to
//! continue to, so a repeated `next` does nothing.
//!
//! Each step is an ordinary awaited call. Errors travel back through every
//! frame untouched; the coordinator never catches or logs them.

use std::sync::Arc;

use tracing::trace;

use super::{Middleware, Registry};
use crate::context::{Context, Tier};
use crate::error::Error;
use crate::handler::BoxFuture;

/// What the cursor says to do once a tier has run out of nodes.
enum Action {
    Enter(Arc<dyn Middleware>),
    InvokeHandler,
    Idle,
}

/// Runs one request through `app`, the route's group and router tiers, and
/// the route handler.
///
/// With an empty application tier this acts as a node with no successor at
/// the end of that tier, so the request moves straight on to the group tier.
pub fn dispatch<'a>(app: &Registry, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
    advance(app.first(), ctx)
}

/// Continues from a node whose successor in its own tier is `successor`.
pub(crate) fn advance<'a>(
    successor: Option<Arc<dyn Middleware>>,
    ctx: &'a mut Context,
) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        match ctx.tier {
            Tier::Unset => ctx.tier = Tier::Application,
            Tier::Handled => {
                trace!(route = ctx.route().name(), "handler already ran, ignoring next");
                return Ok(());
            }
            _ => {}
        }

        if let Some(node) = successor {
            return enter(node, ctx).await;
        }

        match transition(ctx) {
            Action::Enter(node) => enter(node, ctx).await,
            Action::InvokeHandler => invoke_handler(ctx).await,
            Action::Idle => {
                trace!(route = ctx.route().name(), "chain exhausted, nothing to continue to");
                Ok(())
            }
        }
    })
}

/// Moves the cursor past the end of the current tier.
fn transition(ctx: &mut Context) -> Action {
    let route = Arc::clone(ctx.route());

    if ctx.tier == Tier::Application {
        ctx.tier = Tier::Group;
        if let Some(first) = route.group_middlewares().first() {
            return Action::Enter(first);
        }
    }

    if ctx.tier == Tier::Group {
        ctx.tier = Tier::Router;
        if let Some(first) = route.middlewares().first() {
            return Action::Enter(first);
        }
    }

    if ctx.tier == Tier::Router {
        ctx.tier = Tier::Handled;
        return Action::InvokeHandler;
    }

    Action::Idle
}

/// Runs `node`, or passes through it when the route is on its exclusion list.
fn enter<'a>(node: Arc<dyn Middleware>, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        if node.is_excluded(ctx.route().name()) {
            trace!(middleware = node.name(), route = ctx.route().name(), tier = %ctx.tier, "excluded, skipping");
            return node.link().next(ctx).await;
        }
        trace!(middleware = node.name(), tier = %ctx.tier, "entering");
        node.handle(ctx).await
    })
}

async fn invoke_handler(ctx: &mut Context) -> Result<(), Error> {
    trace!(route = ctx.route().name(), "invoking handler");
    let handler = Arc::clone(ctx.route().handler());
    let response = handler.call(ctx.request().clone()).await?;
    ctx.set_response(response);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::middleware::Link;
    use crate::request::Request;
    use crate::response::Response;
    use crate::route::Route;

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Records its label, then continues; or fails without continuing.
    struct Probe {
        link: Link,
        label: String,
        journal: Journal,
        fail: bool,
    }

    impl Probe {
        fn new(label: impl Into<String>, journal: &Journal) -> Self {
            Self { link: Link::new(), label: label.into(), journal: Arc::clone(journal), fail: false }
        }

        fn failing(label: impl Into<String>, journal: &Journal) -> Self {
            Self { fail: true, ..Self::new(label, journal) }
        }
    }

    impl Middleware for Probe {
        fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move {
                self.journal.lock().unwrap().push(self.label.clone());
                if self.fail {
                    return Err(Error::http(StatusCode::UNAUTHORIZED, self.label.clone()));
                }
                self.next(ctx).await?;
                self.journal.lock().unwrap().push(format!("/{}", self.label));
                Ok(())
            })
        }

        fn link(&self) -> &Link { &self.link }
        fn link_mut(&mut self) -> &mut Link { &mut self.link }
    }

    /// Calls `next` twice.
    struct Stutter {
        link: Link,
    }

    impl Middleware for Stutter {
        fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async move {
                self.next(ctx).await?;
                self.next(ctx).await
            })
        }

        fn link(&self) -> &Link { &self.link }
        fn link_mut(&mut self) -> &mut Link { &mut self.link }
    }

    fn route(name: &str, group: Registry, router: Registry, journal: &Journal) -> Arc<Route> {
        let journal = Arc::clone(journal);
        let handler = move |_req: Request| {
            let journal = Arc::clone(&journal);
            async move {
                journal.lock().unwrap().push("handler".to_owned());
                Ok::<_, Error>(Response::text("done"))
            }
        };
        Arc::new(Route::new(name, Arc::new(group), router, handler))
    }

    fn context(route: Arc<Route>) -> Context {
        Context::new(route, Request::new(Method::GET, "/", "127.0.0.1:9000".parse().unwrap()))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn empty_tiers_invoke_only_the_handler() {
        let journal = Journal::default();
        let mut ctx = context(route("r", Registry::new(), Registry::new(), &journal));

        dispatch(&Registry::new(), &mut ctx).await.unwrap();

        assert_eq!(entries(&journal), ["handler"]);
        assert!(ctx.is_handled());
        assert_eq!(ctx.response().unwrap().status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tiers_run_in_priority_then_insertion_order() {
        let journal = Journal::default();
        let app = Registry::new()
            .with(Probe::new("app1", &journal))
            .with(Probe::new("app2", &journal));
        let group = Registry::new()
            .with(Probe::new("group1", &journal))
            .with(Probe::new("group2", &journal));
        let router = Registry::new().with(Probe::new("router1", &journal));
        let mut ctx = context(route("r", group, router, &journal));

        dispatch(&app, &mut ctx).await.unwrap();

        assert_eq!(
            entries(&journal),
            [
                "app1", "app2", "group1", "group2", "router1", "handler",
                "/router1", "/group2", "/group1", "/app2", "/app1",
            ],
        );
    }

    #[tokio::test]
    async fn empty_tiers_in_between_are_skipped() {
        let cases: [(usize, usize, usize); 6] = [(1, 0, 0), (0, 1, 0), (0, 0, 1), (1, 0, 1), (0, 2, 0), (2, 0, 2)];

        for (apps, groups, routers) in cases {
            let journal = Journal::default();
            let mut expected = Vec::new();
            let mut fill = |registry: &mut Registry, tier: &str, count: usize| {
                for i in 0..count {
                    let label = format!("{tier}{i}");
                    expected.push(label.clone());
                    registry.push(Probe::new(label, &journal));
                }
            };

            let (mut app, mut group, mut router) = (Registry::new(), Registry::new(), Registry::new());
            fill(&mut app, "app", apps);
            fill(&mut group, "group", groups);
            fill(&mut router, "router", routers);
            expected.push("handler".to_owned());

            let mut ctx = context(route("r", group, router, &journal));
            dispatch(&app, &mut ctx).await.unwrap();

            let before_unwind: Vec<String> = entries(&journal)
                .into_iter()
                .filter(|e| !e.starts_with('/'))
                .collect();
            assert_eq!(before_unwind, expected, "case {apps}/{groups}/{routers}");
        }
    }

    #[tokio::test]
    async fn error_without_next_halts_everything_downstream() {
        let journal = Journal::default();
        let app = Registry::new()
            .with(Probe::failing("app1", &journal))
            .with(Probe::new("app2", &journal));
        let group = Registry::new().with(Probe::new("group1", &journal));
        let router = Registry::new().with(Probe::new("router1", &journal));
        let mut ctx = context(route("r", group, router, &journal));

        let err = dispatch(&app, &mut ctx).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "401: app1");
        assert_eq!(entries(&journal), ["app1"]);
        assert!(!ctx.is_handled());
        assert!(ctx.response().is_none());
    }

    #[tokio::test]
    async fn errors_unwind_through_every_caller() {
        let journal = Journal::default();
        let app = Registry::new().with(Probe::new("app1", &journal));
        let router = Registry::new().with(Probe::failing("router1", &journal));
        let mut ctx = context(route("r", Registry::new(), router, &journal));

        let err = dispatch(&app, &mut ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "401: router1");
        // app1 propagated with `?`, so its post-work never ran.
        assert_eq!(entries(&journal), ["app1", "router1"]);
    }

    #[tokio::test]
    async fn second_next_after_handler_is_a_no_op() {
        let journal = Journal::default();
        let app = Registry::new().with(Stutter { link: Link::new() });
        let router = Registry::new().with(Stutter { link: Link::new() });
        let mut ctx = context(route("r", Registry::new(), router, &journal));

        dispatch(&app, &mut ctx).await.unwrap();

        assert_eq!(entries(&journal), ["handler"]);
    }

    #[tokio::test]
    async fn second_next_does_not_reenter_the_rest_of_its_tier() {
        let journal = Journal::default();
        let app = Registry::new()
            .with(Stutter { link: Link::new() })
            .with(Probe::new("app2", &journal));
        let router = Registry::new().with(Probe::new("router1", &journal));
        let mut ctx = context(route("r", Registry::new(), router, &journal));

        dispatch(&app, &mut ctx).await.unwrap();

        assert_eq!(entries(&journal), ["app2", "router1", "handler", "/router1", "/app2"]);
        assert!(ctx.is_handled());
    }

    #[tokio::test]
    async fn excluded_node_is_skipped_only_for_its_route() {
        let journal = Journal::default();
        let build = |name: &str| {
            let app = Registry::new()
                .with(Probe::new("auth", &journal).exclude(["routeA"]))
                .with(Probe::new("log", &journal));
            (app, route(name, Registry::new(), Registry::new(), &journal))
        };

        let (app, route_a) = build("routeA");
        let mut ctx = context(route_a);
        dispatch(&app, &mut ctx).await.unwrap();
        assert_eq!(entries(&journal), ["log", "handler", "/log"]);

        journal.lock().unwrap().clear();
        let (app, route_b) = build("routeB");
        let mut ctx = context(route_b);
        dispatch(&app, &mut ctx).await.unwrap();
        assert_eq!(entries(&journal), ["auth", "log", "handler", "/log", "/auth"]);
    }

    #[tokio::test]
    async fn excluded_last_node_still_crosses_into_next_tier() {
        let journal = Journal::default();
        let group = Registry::new().with(Probe::new("group1", &journal).exclude(["r"]));
        let router = Registry::new().with(Probe::new("router1", &journal));
        let mut ctx = context(route("r", group, router, &journal));

        dispatch(&Registry::new(), &mut ctx).await.unwrap();

        assert_eq!(entries(&journal), ["router1", "handler", "/router1"]);
    }

    #[tokio::test]
    async fn handler_errors_propagate_and_leave_no_response() {
        let failing = |_req: Request| async { Err::<Response, _>(Error::http(StatusCode::CONFLICT, "taken")) };
        let route = Arc::new(Route::new("r", Arc::new(Registry::new()), Registry::new(), failing));
        let mut ctx = context(route);

        let err = dispatch(&Registry::new(), &mut ctx).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(ctx.is_handled());
        assert!(ctx.response().is_none());
    }
}
