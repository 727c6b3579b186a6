//! # waymark
//!
//! A minimal HTTP request router. Exact method + path lookup, an onion of
//! middleware, and two values handed to every handler: a correlation ID and
//! the parsed query string.
//!
//! ## The contract
//!
//! What waymark intentionally leaves out:
//!
//! - **Pattern routing** — no wildcards, no `{id}` segments, no tries
//! - **Path normalisation** — `/users` and `/users/` are different routes
//! - **Proxy concerns** — TLS and rate limiting belong to nginx / your
//!   ingress. The server only refuses bodies over its size limit.
//!
//! What's left:
//!
//! - `method → path → route` hash lookups, last registration wins
//! - Middleware composed per request: first registered runs outermost
//! - A [`RequestContext`] per request, reachable from any handler
//! - A hyper server with graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use waymark::{Request, ResponseWriter, Router, Server, StatusCode, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), waymark::Error> {
//!     let app = Router::new()
//!         .middleware(middleware::trace)
//!         .get("/hello", hello)
//!         .post("/login", login);
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn hello(w: ResponseWriter, req: Request) {
//!     let name = req.query_params().and_then(|q| q.get("name")).unwrap_or("world");
//!     w.text(StatusCode::OK, format!("hello, {name} ({})", req.correlation_id()));
//! }
//!
//! async fn login(w: ResponseWriter, req: Request) {
//!     match req.form_params() {
//!         Ok(form) if form.contains_key("username") => w.write_header(StatusCode::NO_CONTENT),
//!         Ok(_) => w.text(StatusCode::UNPROCESSABLE_ENTITY, "username required"),
//!         Err(e) => w.text(StatusCode::BAD_REQUEST, e.to_string()),
//!     }
//! }
//! ```

mod error;
mod id;
mod logger;
mod params;
mod request;
mod response;
mod router;
mod server;

pub mod handler;
pub mod middleware;

pub use error::{Error, FormError, ParamsError};
pub use handler::{BoxedHandler, ErasedHandler, Handler};
pub use http::{Method, StatusCode};
pub use id::{IdGenerator, UuidGenerator};
pub use logger::{Logger, TracingLogger};
pub use middleware::Middleware;
pub use params::Params;
pub use request::{MAX_FORM_BODY, Request, RequestContext};
pub use response::{ContentType, ResponseWriter};
pub use router::Router;
pub use server::Server;
