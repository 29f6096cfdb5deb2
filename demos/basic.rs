//! Minimal strata example: three middleware tiers in front of JSON endpoints.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/users/42 -H 'authorization: alice'
//!   curl http://localhost:3000/api/users/42               # 401 from the group tier
//!   curl -X DELETE http://localhost:3000/api/users/42 -H 'authorization: alice'
//!   curl http://localhost:3000/healthz                    # not access-logged

use http::HeaderValue;
use strata::middleware::{Link, Middleware, RequestLog, TracingSink};
use strata::{App, BoxFuture, Context, Endpoint, Error, Group, Request, Response, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let app = App::new()
        .use_middleware(RequestLog::new(TracingSink).exclude(["/healthz"]))
        .get("/healthz", healthz)
        .group(
            Group::new("/api")
                .use_middleware(RequireUser::default())
                .get("/users/{id}", get_user)
                .route(Endpoint::delete("/users/{id}", delete_user).use_middleware(PoweredBy::default())),
        );

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

#[derive(Clone)]
struct User(String);

/// Group tier: rejects requests without an `authorization` header.
#[derive(Default)]
struct RequireUser {
    link: Link,
}

impl Middleware for RequireUser {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let user = ctx.request()
                .header("authorization")
                .map(|v| User(v.to_owned()))
                .ok_or_else(|| Error::http(StatusCode::UNAUTHORIZED, "missing authorization"))?;
            ctx.insert(user);
            self.next(ctx).await
        })
    }

    fn link(&self) -> &Link { &self.link }
    fn link_mut(&mut self) -> &mut Link { &mut self.link }
}

/// Router tier: wraps the handler and tags its response.
#[derive(Default)]
struct PoweredBy {
    link: Link,
}

impl Middleware for PoweredBy {
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            self.next(ctx).await?;
            if let Some(res) = ctx.response_mut() {
                res.headers_mut().insert("x-powered-by", HeaderValue::from_static("strata"));
            }
            Ok(())
        })
    }

    fn link(&self) -> &Link { &self.link }
    fn link_mut(&mut self) -> &mut Link { &mut self.link }
}

async fn healthz(_req: Request) -> Result<Response, Error> {
    Ok(Response::text("ok"))
}

// GET /api/users/{id}
async fn get_user(req: Request) -> Result<Response, Error> {
    let id = req.param("id").unwrap_or("unknown");
    let by = req.extensions().get::<User>().map_or("", |u| u.0.as_str());
    Ok(Response::json(format!(r#"{{"id":"{id}","requested_by":"{by}"}}"#)))
}

// DELETE /api/users/{id} → 204 No Content
async fn delete_user(_req: Request) -> Result<StatusCode, Error> {
    Ok(StatusCode::NO_CONTENT)
}
