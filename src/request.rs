//! Incoming HTTP request type and its request-scoped context.

use std::sync::Arc;

use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri, Version};

use crate::error::FormError;
use crate::params::Params;

/// Largest `application/x-www-form-urlencoded` body [`Request::form_params`]
/// will decode. Also the default body limit of [`Server`](crate::Server),
/// which refuses larger bodies before they are buffered.
pub const MAX_FORM_BODY: usize = 10 << 20;

/// Values the router attaches to every request it dispatches.
///
/// Lives in its own typed slot on [`Request`] rather than in
/// [`Extensions`], so application extensions can never shadow it.
#[derive(Clone, Debug)]
pub struct RequestContext {
    correlation_id: String,
    query: Params,
}

impl RequestContext {
    pub(crate) fn new(correlation_id: String, query: Params) -> Self {
        Self { correlation_id, query }
    }

    pub fn correlation_id(&self) -> &str { &self.correlation_id }
    pub fn query(&self) -> &Params { &self.query }
}

/// An incoming HTTP request with its body fully buffered.
///
/// Cloning is cheap for the body (`Bytes`) and the context (`Arc`); headers
/// and extensions are copied.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    extensions: Extensions,
    context: Option<Arc<RequestContext>>,
}

impl Request {
    pub(crate) fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn version(&self) -> Version { self.version }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// Case-insensitive header lookup. Non-visible-ASCII values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The context attached by [`Router::serve`](crate::Router::serve).
    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_deref()
    }

    /// The correlation ID for this request, or `""` outside a dispatch.
    pub fn correlation_id(&self) -> &str {
        self.context().map_or("", RequestContext::correlation_id)
    }

    /// Query parameters parsed at dispatch time.
    ///
    /// `None` only for a request that never went through the router.
    pub fn query_params(&self) -> Option<&Params> {
        self.context().map(RequestContext::query)
    }

    /// Parses form data on demand.
    ///
    /// For `POST`, `PUT` and `PATCH` with an
    /// `application/x-www-form-urlencoded` body, body values come first and
    /// query values follow. Other methods and media types only see the query
    /// string. Unlike dispatch-time query parsing, every decoding failure is
    /// returned to the caller.
    pub fn form_params(&self) -> Result<Params, FormError> {
        let mut form = Params::new();

        if [Method::POST, Method::PUT, Method::PATCH].contains(&self.method)
            && media_type(self.header("content-type"))? == "application/x-www-form-urlencoded"
        {
            if self.body.len() > MAX_FORM_BODY {
                return Err(FormError::BodyTooLarge { limit: MAX_FORM_BODY });
            }
            form = Params::parse(&String::from_utf8_lossy(&self.body))?;
        }

        form.extend(Params::parse(self.query().unwrap_or(""))?);
        Ok(form)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            extensions: parts.extensions,
            context: None,
        }
    }
}

/// Lowercased `type/subtype` without parameters. A missing header means
/// `application/octet-stream`.
///
/// Parameters are checked but discarded: each must be `key=value` with a
/// token or quoted-string value. Only a trailing `;` may be empty.
fn media_type(content_type: Option<&str>) -> Result<String, FormError> {
    let Some(raw) = content_type else {
        return Ok("application/octet-stream".to_owned());
    };
    let (essence, params) = raw.split_once(';').unwrap_or((raw, ""));
    let essence = essence.trim();

    let valid_essence = essence
        .split_once('/')
        .is_some_and(|(ty, sub)| is_token(ty) && is_token(sub));
    if !valid_essence || !valid_params(params) {
        return Err(FormError::InvalidContentType(raw.to_owned()));
    }
    Ok(essence.to_ascii_lowercase())
}

fn valid_params(mut rest: &str) -> bool {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return true;
        }

        let Some((key, tail)) = rest.split_once('=') else {
            return false;
        };
        if !is_token(key.trim_end()) {
            return false;
        }

        let tail = tail.trim_start();
        let after_value = match tail.strip_prefix('"') {
            Some(quoted) => match skip_quoted(quoted) {
                Some(after) => after,
                None => return false,
            },
            None => {
                let end = tail.find(|c| !is_token_char(c)).unwrap_or(tail.len());
                if end == 0 {
                    return false;
                }
                &tail[end..]
            }
        };

        rest = after_value.trim_start();
        if rest.is_empty() {
            return true;
        }
        match rest.strip_prefix(';') {
            Some(next) => rest = next,
            None => return false,
        }
    }
}

/// Returns what follows the closing quote of a quoted-string whose opening
/// quote has already been consumed.
fn skip_quoted(s: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(&s[i + 1..]),
            _ => {}
        }
    }
    None
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        Request::from(builder.body(Bytes::from(body.to_owned())).unwrap())
    }

    #[test]
    fn form_body_values_come_before_query_values() {
        let req = form_request(
            Method::POST,
            "/login?username=from_query&next=%2Fhome",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "username=john_doe&remember=on",
        );
        let form = req.form_params().unwrap();
        assert_eq!(form.get("username"), Some("john_doe"));
        assert_eq!(form.get_all("username"), ["john_doe", "from_query"]);
        assert_eq!(form.get("next"), Some("/home"));
        assert_eq!(form.get("remember"), Some("on"));
    }

    #[test]
    fn get_ignores_body() {
        let req = form_request(
            Method::GET,
            "/search?q=rust",
            Some("application/x-www-form-urlencoded"),
            "q=ignored",
        );
        assert_eq!(req.form_params().unwrap().get_all("q"), ["rust"]);
    }

    #[test]
    fn missing_content_type_ignores_body() {
        let req = form_request(Method::POST, "/", None, "a=1");
        assert!(req.form_params().unwrap().is_empty());
    }

    #[test]
    fn other_media_types_ignore_body() {
        let req = form_request(Method::PUT, "/?a=2", Some("application/json"), r#"{"a":1}"#);
        assert_eq!(req.form_params().unwrap().get_all("a"), ["2"]);
    }

    #[test]
    fn content_type_without_slash_is_an_error() {
        let req = form_request(Method::POST, "/", Some("garbage"), "a=1");
        assert!(matches!(req.form_params(), Err(FormError::InvalidContentType(_))));
    }

    #[test]
    fn content_type_parameters_are_validated() {
        for bad in [
            "application/x-www-form-urlencoded; charset",
            "application/x-www-form-urlencoded; =utf-8",
            "application/x-www-form-urlencoded; charset=",
            "application/x-www-form-urlencoded; charset=\"utf-8",
            "application/x-www-form-urlencoded;; charset=utf-8",
            "application/x-www-form-urlencoded; charset=utf-8 x",
            "application /x-www-form-urlencoded",
        ] {
            let req = form_request(Method::POST, "/", Some(bad), "a=1");
            assert!(
                matches!(req.form_params(), Err(FormError::InvalidContentType(_))),
                "{bad}"
            );
        }

        for good in [
            "application/x-www-form-urlencoded;",
            "Application/X-WWW-Form-URLEncoded; charset=UTF-8;",
            "application/x-www-form-urlencoded ; charset = utf-8",
            "application/x-www-form-urlencoded; note=\"a; \\\"quoted\\\" value\"; charset=utf-8",
        ] {
            let req = form_request(Method::POST, "/", Some(good), "a=1");
            assert_eq!(req.form_params().unwrap().get("a"), Some("1"), "{good}");
        }
    }

    #[test]
    fn malformed_body_is_an_error() {
        let req = form_request(
            Method::PATCH,
            "/",
            Some("application/x-www-form-urlencoded"),
            "a=%zz",
        );
        assert!(matches!(req.form_params(), Err(FormError::Params(_))));
    }

    #[test]
    fn oversized_body_is_an_error() {
        let body = "a".repeat(MAX_FORM_BODY + 1);
        let req = form_request(
            Method::POST,
            "/",
            Some("application/x-www-form-urlencoded"),
            &body,
        );
        assert!(matches!(
            req.form_params(),
            Err(FormError::BodyTooLarge { limit: MAX_FORM_BODY })
        ));
    }

    #[test]
    fn accessors_without_context() {
        let req = form_request(Method::GET, "/?a=1", None, "");
        assert_eq!(req.correlation_id(), "");
        assert!(req.query_params().is_none());
        assert!(req.context().is_none());
    }

    #[test]
    fn accessors_with_context() {
        let req = form_request(Method::GET, "/", None, "")
            .with_context(RequestContext::new("abc".to_owned(), Params::parse("a=1").unwrap()));
        assert_eq!(req.correlation_id(), "abc");
        assert_eq!(req.query_params().and_then(|q| q.get("a")), Some("1"));
    }
}
