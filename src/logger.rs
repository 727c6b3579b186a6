//! Logger capability consumed by the router.
//!
//! The router reports exactly one thing through it: a query string it could
//! not fully decode. Everything else in the crate logs through `tracing`
//! directly.

use std::fmt;
use std::sync::Arc;

/// Error-level sink for dispatch-time problems the router recovers from.
pub trait Logger: Send + Sync + 'static {
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Default [`Logger`]: forwards to `tracing::error!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!("{args}");
    }
}

/// Lets callers keep a handle to a logger they also gave to the router.
impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn error(&self, args: fmt::Arguments<'_>) {
        (**self).error(args);
    }
}
