//! Access logging, the reference wrapping middleware.

use tracing::Level;

use super::{Link, Middleware};
use crate::context::Context;
use crate::error::Error;
use crate::handler::BoxFuture;

/// Category attached to every access-log line.
pub const HTTP_REQUEST: &str = "HttpRequest";

/// Where log lines go.
///
/// Passed to the middleware that logs rather than looked up globally, so a
/// test can hand in a closure and read back exactly what was written.
pub trait LogSink: Send + Sync + 'static {
    fn write(&self, level: Level, category: &str, line: &str);
}

impl<F> LogSink for F
where
    F: Fn(Level, &str, &str) + Send + Sync + 'static,
{
    fn write(&self, level: Level, category: &str, line: &str) {
        self(level, category, line)
    }
}

/// Forwards log lines to `tracing`, with the category as a field.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, level: Level, category: &str, line: &str) {
        if level == Level::ERROR {
            tracing::error!(category, "{line}");
        } else if level == Level::WARN {
            tracing::warn!(category, "{line}");
        } else if level == Level::INFO {
            tracing::info!(category, "{line}");
        } else if level == Level::DEBUG {
            tracing::debug!(category, "{line}");
        } else {
            tracing::trace!(category, "{line}");
        }
    }
}

/// Logs one line per request after the rest of the chain has finished.
///
/// ```text
/// /users/42 GET 203.0.113.9 HTTP/1.1 200 0 27 3
/// url       method ip       proto    status request-bytes response-bytes ms
/// ```
///
/// Register it first at application scope so the elapsed time covers every
/// other middleware and the handler. It never fails a request: an error from
/// further down is parked on the context with [`Context::defer_error`] for
/// the service to answer with, and the middleware itself returns `Ok`.
pub struct RequestLog<S = TracingSink> {
    link: Link,
    sink: S,
}

impl<S: LogSink> RequestLog<S> {
    pub fn new(sink: S) -> Self {
        Self { link: Link::new(), sink }
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl<S: LogSink> Middleware for RequestLog<S> {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            if let Err(err) = self.next(ctx).await {
                ctx.defer_error(err);
            }
            let elapsed_ms = ctx.elapsed().as_millis();
            let line = format!("{} {}", ctx.request().url(), access_line(ctx, elapsed_ms));
            self.sink.write(Level::DEBUG, HTTP_REQUEST, &line);
            Ok(())
        })
    }

    fn link(&self) -> &Link { &self.link }
    fn link_mut(&mut self) -> &mut Link { &mut self.link }
}

/// `method ip proto status request-bytes response-bytes elapsed-ms`
///
/// Without a written response the status is the one the pending error will
/// answer with, or `0` when there is neither.
fn access_line(ctx: &Context, elapsed_ms: u128) -> String {
    let req = ctx.request();
    let (status, size) = match (ctx.response(), ctx.deferred_error()) {
        (Some(res), _)    => (res.status_code().as_u16(), res.size()),
        (None, Some(err)) => (err.status_code().as_u16(), 0),
        (None, None)      => (0, 0),
    };
    format!(
        "{} {} {} {} {} {} {}",
        req.method(),
        ctx.remote_ip(),
        req.proto(),
        status,
        req.content_length(),
        size,
        elapsed_ms,
    )
}
