//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router needs to hold handlers of *different* types in a single
//! `HashMap<Method, HashMap<String, Route>>`, and middleware needs to wrap
//! any one of them in another. Both work through one trait object,
//! [`ErasedHandler`], shared behind an `Arc`.
//!
//! ```text
//! async fn hello(w: ResponseWriter, req: Request) { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_boxed_handler()                              ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                              ← stored as BoxedHandler
//!        ↓ middleware folds over it
//! trace(correlation_header(handler))                      ← still a BoxedHandler
//!        ↓
//! handler.call(w, req).await  at request time             ← one vtable call per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;

use crate::request::Request;
use crate::response::{ContentType, ResponseWriter};

/// A heap-allocated, type-erased handler future.
///
/// `Send + 'static` lets tokio move it across worker threads.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Object-safe dispatch interface behind every [`BoxedHandler`].
///
/// Middleware calls it to delegate to the next handler in the chain:
/// `next.call(w, req).await`.
pub trait ErasedHandler {
    fn call(&self, w: ResponseWriter, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure returning a
/// future) with the signature:
///
/// ```text
/// async fn name(w: ResponseWriter, req: Request)
/// ```
///
/// The handler writes its response through `w`; it returns nothing.
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Boxes a closure or `async fn` as a [`BoxedHandler`].
///
/// The usual way to build the handler a middleware returns:
///
/// ```rust
/// use std::sync::Arc;
/// use waymark::{BoxedHandler, Request, ResponseWriter, handler};
///
/// fn powered_by(next: BoxedHandler) -> BoxedHandler {
///     handler::from_fn(move |w: ResponseWriter, req: Request| {
///         let next = Arc::clone(&next);
///         async move {
///             w.set_header("x-powered-by", "waymark");
///             next.call(w, req).await;
///         }
///     })
/// }
/// ```
pub fn from_fn<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Newtype bridging a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, w: ResponseWriter, req: Request) -> BoxFuture {
        Box::pin((self.0)(w, req))
    }
}

// ── Default fallback ──────────────────────────────────────────────────────────

/// The fallback used when no route matches and no custom not-found handler
/// is configured.
///
/// `404`, `text/plain; charset=utf-8`, `x-content-type-options: nosniff`,
/// body `404 page not found\n`.
pub async fn not_found(w: ResponseWriter, _req: Request) {
    w.content_type(ContentType::Text);
    w.set_header("x-content-type-options", "nosniff");
    w.write_header(StatusCode::NOT_FOUND);
    w.write("404 page not found\n");
}
