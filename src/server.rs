//! HTTP server and graceful shutdown.
//!
//! On SIGTERM or Ctrl-C (or when the future given to
//! [`Server::serve_with_shutdown`] resolves) the server:
//! 1. Stops calling `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`].
//!
//! Request bodies are buffered before routing, up to a limit
//! ([`MAX_FORM_BODY`] by default). A larger body is answered with `413`
//! without reaching the router.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::Error;
use crate::request::{MAX_FORM_BODY, Request};
use crate::response::ResponseWriter;
use crate::router::Router;

/// The HTTP server.
///
/// Speaks HTTP/1.1 and HTTP/2 (whatever the client negotiates) and hands
/// every request to [`Router::serve`].
#[derive(Debug)]
pub struct Server {
    listener: std::net::TcpListener,
    body_limit: usize,
}

impl Server {
    /// Binds to `addr` (`host:port`).
    ///
    /// ```rust,no_run
    /// use waymark::Server;
    /// let server = Server::bind("0.0.0.0:3000")?;
    /// # Ok::<(), waymark::Error>(())
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr.parse().map_err(|_| Error::InvalidAddr(addr.to_owned()))?;
        Self::from_listener(std::net::TcpListener::bind(addr)?)
    }

    /// Serves on an already-bound listener.
    pub fn from_listener(listener: std::net::TcpListener) -> Result<Self, Error> {
        listener.set_nonblocking(true)?;
        Ok(Self { listener, body_limit: MAX_FORM_BODY })
    }

    /// Largest request body, in bytes, the server will buffer.
    pub fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    /// The address actually bound; useful after binding port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until SIGTERM or Ctrl-C, then drains in-flight connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains in-flight connections.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let body_limit = self.body_limit;
        let listener = TcpListener::from_std(self.listener)?;
        let addr = listener.local_addr()?;

        // Shared read-only by every connection task; registration is over.
        let router = Arc::new(router);

        info!(addr = %addr, "waymark listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even with connections still queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, body_limit).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("waymark stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, runs the router against a fresh writer, and converts
/// the recording into the hyper response.
///
/// Never fails from hyper's point of view: an oversized body becomes a 413,
/// an unreadable one a 400.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    body_limit: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match read_body(body, body_limit).await {
        Ok(body) => body,
        Err(rejection) => {
            let w = ResponseWriter::new();
            match rejection {
                BodyRejection::TooLarge => {
                    info!(method = %parts.method, path = parts.uri.path(), limit = body_limit, "request body too large");
                    w.text(StatusCode::PAYLOAD_TOO_LARGE, "413 request body too large\n");
                }
                BodyRejection::Unreadable(e) => {
                    error!(method = %parts.method, path = parts.uri.path(), "failed to read request body: {e}");
                    w.text(StatusCode::BAD_REQUEST, "400 bad request\n");
                }
            }
            return Ok(w.into_response());
        }
    };

    let w = ResponseWriter::new();
    router
        .serve(w.clone(), Request::from(http::Request::from_parts(parts, body)))
        .await;

    Ok(w.into_response())
}

enum BodyRejection {
    TooLarge,
    Unreadable(Box<dyn std::error::Error + Send + Sync>),
}

/// Collects at most `limit` bytes.
///
/// A declared `content-length` over the limit is rejected before any of the
/// body is read; a chunked body is cut off as soon as it crosses it.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, BodyRejection>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if body.size_hint().lower() > limit as u64 {
        return Err(BodyRejection::TooLarge);
    }

    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(BodyRejection::TooLarge),
        Err(e) => Err(BodyRejection::Unreadable(e)),
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A signal that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use hyper::body::Frame;

    use super::*;

    /// Yields its frames with no size hint, like a chunked upload.
    struct Chunked(Vec<Bytes>);

    impl Body for Chunked {
        type Data = Bytes;
        type Error = Infallible;

        fn poll_frame(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
            Poll::Ready(self.0.pop().map(|data| Ok(Frame::data(data))))
        }
    }

    #[tokio::test]
    async fn body_within_limit_is_collected() {
        let body = read_body(Full::new(Bytes::from_static(b"username=john_doe")), 64).await;
        assert!(matches!(body, Ok(b) if b == "username=john_doe"));
    }

    #[tokio::test]
    async fn declared_length_over_limit_is_rejected() {
        let body = read_body(Full::new(Bytes::from(vec![b'a'; 32])), 16).await;
        assert!(matches!(body, Err(BodyRejection::TooLarge)));
    }

    #[tokio::test]
    async fn streamed_body_over_limit_is_cut_off() {
        let chunks = Chunked(vec![Bytes::from(vec![b'a'; 16]), Bytes::from(vec![b'b'; 16])]);
        assert_eq!(chunks.size_hint().lower(), 0);
        let body = read_body(chunks, 16).await;
        assert!(matches!(body, Err(BodyRejection::TooLarge)));
    }

    #[tokio::test]
    async fn exact_limit_is_accepted() {
        let body = read_body(Full::new(Bytes::from(vec![b'a'; 16])), 16).await;
        assert!(matches!(body, Ok(b) if b.len() == 16));
    }
}
