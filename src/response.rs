//! The response-writer capability handed to every handler.
//!
//! A [`ResponseWriter`] records what handlers write: headers, one status
//! line, and body bytes. The server turns the recording into a hyper
//! response once [`Router::serve`](crate::Router::serve) returns.
//!
//! Writes follow the usual "commit on first write" rules:
//!
//! ```text
//! set_header(..)        mutates the pending header map
//! write_header(status)  commits status + a snapshot of the pending headers
//! write(bytes)          commits 200 if nothing is committed yet, then appends
//! set_header(..)        after commit: recorded, but no longer sent
//! write_header(..)      after commit: ignored, logs a warning
//! ```

use std::mem;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use parking_lot::Mutex;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseWriter::content_type`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
    headers: HeaderMap,
    committed: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

impl State {
    fn commit(&mut self, status: StatusCode) {
        self.committed = Some((status, self.headers.clone()));
    }
}

/// Shared handle to one in-flight response.
///
/// Cloning is cheap (one `Arc` increment) and every clone writes to the same
/// response, which is how the router hands the writer to both the
/// middleware chain and a route's post-response handler.
#[derive(Clone, Default)]
pub struct ResponseWriter {
    state: Arc<Mutex<State>>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing any existing values.
    pub fn set_header(&self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.state.lock().headers.insert(name, value);
        }
    }

    /// Adds a value for `name`, keeping existing ones.
    pub fn append_header(&self, name: &str, value: &str) {
        if let Some((name, value)) = header_pair(name, value) {
            self.state.lock().headers.append(name, value);
        }
    }

    pub fn content_type(&self, content_type: ContentType) {
        self.state
            .lock()
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Commits the status line. Only the first call has any effect.
    pub fn write_header(&self, status: StatusCode) {
        let mut state = self.state.lock();
        if let Some((current, _)) = &state.committed {
            warn!(current = %current, ignored = %status, "superfluous write_header call");
            return;
        }
        state.commit(status);
    }

    /// Appends body bytes, committing `200 OK` first if needed.
    pub fn write(&self, data: impl AsRef<[u8]>) {
        let mut state = self.state.lock();
        if state.committed.is_none() {
            state.commit(StatusCode::OK);
        }
        state.body.extend_from_slice(data.as_ref());
    }

    /// `text/plain; charset=utf-8` shortcut: content type, status, body.
    pub fn text(&self, status: StatusCode, body: impl AsRef<str>) {
        self.content_type(ContentType::Text);
        self.write_header(status);
        self.write(body.as_ref());
    }

    /// `application/json` shortcut. Pass bytes from your serialiser directly.
    pub fn json(&self, status: StatusCode, body: impl AsRef<[u8]>) {
        self.content_type(ContentType::Json);
        self.write_header(status);
        self.write(body);
    }

    /// The committed status, or `200 OK` if nothing has been committed.
    pub fn status(&self) -> StatusCode {
        self.state
            .lock()
            .committed
            .as_ref()
            .map_or(StatusCode::OK, |(status, _)| *status)
    }

    pub fn is_committed(&self) -> bool {
        self.state.lock().committed.is_some()
    }

    /// The headers that will be sent: the committed snapshot once the status
    /// is written, the pending map before that.
    pub fn headers(&self) -> HeaderMap {
        let state = self.state.lock();
        match &state.committed {
            Some((_, headers)) => headers.clone(),
            None => state.headers.clone(),
        }
    }

    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state.lock().body)
    }

    /// Drains the recording into an `http::Response`.
    ///
    /// Other clones of this writer are left empty.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let mut state = self.state.lock();
        let (status, headers) = match state.committed.take() {
            Some(committed) => committed,
            None => (StatusCode::OK, mem::take(&mut state.headers)),
        };
        let body = state.body.split().freeze();

        let mut res = http::Response::new(Full::new(body));
        *res.status_mut() = status;
        *res.headers_mut() = headers;
        res
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResponseWriter")
            .field("committed", &state.committed.as_ref().map(|(s, _)| *s))
            .field("body_len", &state.body.len())
            .finish()
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
        warn!(header = name, "invalid response header name, skipped");
        return None;
    };
    let Ok(value) = HeaderValue::from_str(value) else {
        warn!(header = %name, "invalid response header value, skipped");
        return None;
    };
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_commits_implicit_ok() {
        let w = ResponseWriter::new();
        assert!(!w.is_committed());
        w.write("hello");
        w.write(b", world");
        assert!(w.is_committed());
        assert_eq!(w.status(), StatusCode::OK);
        assert_eq!(w.body(), "hello, world");
    }

    #[test]
    fn second_write_header_is_ignored() {
        let w = ResponseWriter::new();
        w.write_header(StatusCode::CREATED);
        w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(w.status(), StatusCode::CREATED);
    }

    #[test]
    fn headers_after_commit_are_not_sent() {
        let w = ResponseWriter::new();
        w.set_header("x-before", "1");
        w.write_header(StatusCode::ACCEPTED);
        w.set_header("x-after", "1");

        let res = w.into_response();
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        assert_eq!(res.headers()["x-before"], "1");
        assert!(res.headers().get("x-after").is_none());
    }

    #[test]
    fn clones_share_one_response() {
        let w = ResponseWriter::new();
        let other = w.clone();
        w.write("a");
        other.write("b");
        assert_eq!(w.body(), "ab");
    }

    #[test]
    fn append_keeps_existing_values() {
        let w = ResponseWriter::new();
        w.append_header("vary", "accept");
        w.append_header("vary", "origin");
        let values: Vec<_> = w.headers().get_all("vary").iter().cloned().collect();
        assert_eq!(values, ["accept", "origin"]);
    }

    #[test]
    fn invalid_header_is_skipped() {
        let w = ResponseWriter::new();
        w.set_header("bad header", "x");
        w.set_header("x-ok", "bad\nvalue");
        assert!(w.headers().is_empty());
    }

    #[test]
    fn text_shortcut() {
        let w = ResponseWriter::new();
        w.text(StatusCode::IM_A_TEAPOT, "short and stout");
        let res = w.into_response();
        assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn untouched_writer_is_empty_ok() {
        let res = ResponseWriter::new().into_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
    }
}
