//! Middleware layer.
//!
//! A middleware takes the next handler and returns a wrapped one. The
//! router composes them per request in reverse registration order, so for
//! `.middleware(a).middleware(b).middleware(c)` control flows:
//!
//! ```text
//! a ─▶ b ─▶ c ─▶ handler
//! a ◀─ b ◀─ c ◀──┘
//! ```
//!
//! `a` runs first and last; `c` sits immediately around the handler.
//!
//! Built-in middleware:
//! - [`trace`] — logs method, path, status, latency and correlation ID
//! - [`correlation_header`] — echoes the correlation ID as `x-correlation-id`

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::handler::{self, BoxedHandler};
use crate::request::Request;
use crate::response::ResponseWriter;

/// Response header set by [`correlation_header`].
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// A handler-wrapping transform.
///
/// Implemented for every `Fn(BoxedHandler) -> BoxedHandler`, which covers
/// plain functions like [`trace`] and capturing closures alike.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// Logs one `info` event per request once the inner chain returns.
pub fn trace(next: BoxedHandler) -> BoxedHandler {
    handler::from_fn(move |w: ResponseWriter, req: Request| {
        let next = Arc::clone(&next);
        async move {
            let start = Instant::now();
            let method = req.method().clone();
            let path = req.path().to_owned();
            let correlation_id = req.correlation_id().to_owned();

            next.call(w.clone(), req).await;

            info!(
                %method,
                path = %path,
                status = w.status().as_u16(),
                latency_us = saturating_micros(start.elapsed()),
                correlation_id = %correlation_id,
                "request completed"
            );
        }
    })
}

/// Sets `x-correlation-id` on the response before delegating.
pub fn correlation_header(next: BoxedHandler) -> BoxedHandler {
    handler::from_fn(move |w: ResponseWriter, req: Request| {
        let next = Arc::clone(&next);
        async move {
            w.set_header(CORRELATION_HEADER, req.correlation_id());
            next.call(w, req).await;
        }
    })
}

/// Whole microseconds, saturating at `u64::MAX`.
fn saturating_micros(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_saturates_instead_of_wrapping() {
        assert_eq!(saturating_micros(Duration::from_millis(3)), 3_000);
        assert_eq!(saturating_micros(Duration::MAX), u64::MAX);
    }
}
