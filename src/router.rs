//! Exact-match request router.
//!
//! Two hash lookups per request: method, then path. No patterns, no
//! parameters, no normalisation. The request path is percent-decoded before
//! the lookup (`/caf%C3%A9` reaches a route registered as `/café`); after
//! that it either matches a registered path byte-for-byte or falls through
//! to the not-found handler.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::handler::{self, BoxedHandler, Handler};
use crate::id::{IdGenerator, UuidGenerator};
use crate::logger::{Logger, TracingLogger};
use crate::middleware::Middleware;
use crate::params::Params;
use crate::request::{Request, RequestContext};
use crate::response::ResponseWriter;

/// One registered (method, path) binding.
struct Route {
    handler: BoxedHandler,
    /// Runs after the middleware-wrapped `handler` returns.
    response: Option<BoxedHandler>,
}

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or drive [`Router::serve`] yourself. Every registration method takes and
/// returns `self`, so routes can't be added once serving has begun.
pub struct Router {
    routes: HashMap<Method, HashMap<String, Route>>,
    middleware: Vec<Arc<dyn Middleware>>,
    not_found: Option<BoxedHandler>,
    logger: Arc<dyn Logger>,
    ids: Arc<dyn IdGenerator>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            middleware: Vec::new(),
            not_found: None,
            logger: Arc::new(TracingLogger),
            ids: Arc::new(UuidGenerator),
        }
    }

    /// Register a handler for an exact method + path pair. Returns `self`
    /// for chaining.
    ///
    /// Registering the same pair again replaces the earlier route, including
    /// any response handler attached to it.
    ///
    /// ```rust
    /// # use waymark::{Method, Request, ResponseWriter, Router};
    /// # async fn list_users(_: ResponseWriter, _: Request) {}
    /// # async fn create_user(_: ResponseWriter, _: Request) {}
    /// Router::new()
    ///     .on(Method::GET,  "/users", list_users)
    ///     .on(Method::POST, "/users", create_user);
    /// ```
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let route = Route { handler: handler.into_boxed_handler(), response: None };
        self.routes.entry(method).or_default().insert(path.to_owned(), route);
        self
    }

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

    /// Attach a handler that runs after the route's main chain.
    ///
    /// It is not wrapped in middleware and it runs unconditionally, even if
    /// the main handler already wrote a full response. Does nothing if the
    /// route is not registered.
    pub fn set_response(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        if let Some(route) = self.routes.get_mut(&method).and_then(|paths| paths.get_mut(path)) {
            route.response = Some(handler.into_boxed_handler());
        }
        self
    }

    /// Replace the fallback used when no route matches.
    pub fn not_found(mut self, handler: impl Handler) -> Self {
        self.not_found = Some(handler.into_boxed_handler());
        self
    }

    /// Append one middleware to the chain.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append several middleware, in iteration order.
    pub fn middlewares<M: Middleware>(mut self, middleware: impl IntoIterator<Item = M>) -> Self {
        self.middleware
            .extend(middleware.into_iter().map(|m| Arc::new(m) as Arc<dyn Middleware>));
        self
    }

    /// Replace the logger that receives query-string parse errors.
    pub fn with_logger(mut self, logger: impl Logger) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    /// Replace the correlation-ID generator.
    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Dispatch one request.
    ///
    /// Resolves the route (or the not-found fallback), wraps it in the
    /// middleware chain, attaches a fresh [`RequestContext`], runs the chain
    /// and then the route's response handler, if any. Everything the
    /// handlers produce goes to `w`.
    pub async fn serve(&self, w: ResponseWriter, req: Request) {
        let path = percent_decode_str(req.path()).decode_utf8_lossy();
        let (handler, response) = self.resolve(req.method(), &path);

        let handler = self
            .middleware
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.wrap(next));

        let correlation_id = self.ids.generate();

        let (query, err) = Params::parse_lenient(req.query().unwrap_or_default());
        if let Some(err) = err {
            self.logger.error(format_args!("failed to parse query parameters: {err}"));
        }

        debug!(
            method = %req.method(),
            path = %path,
            correlation_id = %correlation_id,
            "dispatching request"
        );

        let req = req.with_context(RequestContext::new(correlation_id, query));

        handler.call(w.clone(), req.clone()).await;

        if let Some(response) = response {
            response.call(w, req).await;
        }
    }

    fn resolve(&self, method: &Method, path: &str) -> (BoxedHandler, Option<BoxedHandler>) {
        match self.routes.get(method).and_then(|paths| paths.get(path)) {
            Some(route) => (Arc::clone(&route.handler), route.response.clone()),
            None => {
                let fallback = match &self.not_found {
                    Some(handler) => Arc::clone(handler),
                    None => handler::from_fn(handler::not_found),
                };
                (fallback, None)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
