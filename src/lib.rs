//! # strata
//!
//! A minimal HTTP framework for Rust services behind a reverse proxy, built
//! around one idea: middleware attached at three scopes, run in a fixed
//! order, each seeing a single `next`.
//!
//! ## Tiers
//!
//! ```text
//! request ─▶ application ─▶ group ─▶ router ─▶ handler
//!                                                  │
//! response ◀─ application ◀─ group ◀─ router ◀─────┘
//! ```
//!
//! - **application** middleware runs for every request ([`App::use_middleware`])
//! - **group** middleware runs for the routes of one [`Group`]
//! - **router** middleware runs for one [`Endpoint`]
//!
//! Empty tiers are skipped. Registration order is execution order inside a
//! tier. A middleware can stop the request (return an error or write a
//! response without calling `next`) or wrap it (work before and after
//! `next`). See [`middleware`] for writing your own.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strata::middleware::{RequestLog, TracingSink};
//! use strata::{App, Error, Request, Response, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .use_middleware(RequestLog::new(TracingSink))
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#)))
//! }
//! ```

mod app;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;

pub use app::{App, Endpoint, Group, Service};
pub use context::{Context, Tier};
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::Route;
pub use server::Server;
