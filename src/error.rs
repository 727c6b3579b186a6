//! Error types.
//!
//! Application-level outcomes (404, 422, etc.) are written to the
//! [`ResponseWriter`](crate::ResponseWriter), not returned as errors. The
//! types here cover infrastructure failures and the two decoding paths a
//! handler can observe.

use thiserror::Error;

/// The error type returned by waymark's fallible server operations.
///
/// Binding to a port or accepting a connection. Nothing else in the crate
/// is fatal.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{0}`")]
    InvalidAddr(String),
}

/// A failure while decoding a URL-encoded query string or form body.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ParamsError {
    /// A `%` not followed by two hex digits. Carries the offending escape,
    /// at most three bytes long.
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid semicolon separator in query")]
    InvalidSemicolon,
}

/// Returned by [`Request::form_params`](crate::Request::form_params).
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("invalid content type `{0}`")]
    InvalidContentType(String),

    #[error("request body too large (limit {limit} bytes)")]
    BodyTooLarge { limit: usize },
}
