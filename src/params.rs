//! URL-encoded parameters.
//!
//! [`Params`] is the ordered multimap handed to handlers for both query
//! strings and `application/x-www-form-urlencoded` bodies. A key maps to
//! every value it was given, in the order the values appeared on the wire.
//!
//! Decoding rules:
//!
//! ```text
//! a=1&b=two+words&a=%33      → a: ["1", "3"], b: ["two words"]
//! flag                       → flag: [""]
//! &&x=1&                     → x: ["1"]            (empty segments skipped)
//! x=1;y=2                    → error, segment skipped
//! x=%zz&y=2                  → error, y: ["2"]     (only the bad pair is lost)
//! ```

use std::collections::HashMap;
use std::collections::hash_map;

use percent_encoding::percent_decode_str;

use crate::error::ParamsError;

/// Decoded URL parameters: name → values in appearance order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(HashMap<String, Vec<String>>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict parse. Fails on the first malformed pair.
    pub fn parse(raw: &str) -> Result<Self, ParamsError> {
        match Self::parse_lenient(raw) {
            (params, None) => Ok(params),
            (_, Some(err)) => Err(err),
        }
    }

    /// Best-effort parse.
    ///
    /// Every well-formed pair is kept. Malformed pairs are skipped and the
    /// first error encountered is returned alongside the partial result.
    pub fn parse_lenient(raw: &str) -> (Self, Option<ParamsError>) {
        let mut params = Self::new();
        let mut first_err = None;

        for pair in raw.split('&') {
            if pair.is_empty() {
                continue;
            }
            if pair.contains(';') {
                first_err.get_or_insert(ParamsError::InvalidSemicolon);
                continue;
            }

            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match (unescape(key), unescape(value)) {
                (Ok(key), Ok(value)) => params.append(key, value),
                (Err(e), _) | (_, Err(e)) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        (params, first_err)
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.first().map(String::as_str)
    }

    /// All values for `key`, or an empty slice.
    pub fn get_all(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Appends every value of `other` after the values already present.
impl Extend<(String, Vec<String>)> for Params {
    fn extend<I: IntoIterator<Item = (String, Vec<String>)>>(&mut self, iter: I) {
        for (key, values) in iter {
            self.0.entry(key).or_default().extend(values);
        }
    }
}

impl IntoIterator for Params {
    type Item = (String, Vec<String>);
    type IntoIter = hash_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Query-component unescape: `+` is a space, `%XX` is a byte.
///
/// `percent_decode_str` passes malformed escapes through untouched, so they
/// are rejected up front.
fn unescape(s: &str) -> Result<String, ParamsError> {
    let bytes = s.as_bytes();
    for (i, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'%') {
        let valid = i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if !valid {
            let end = bytes.len().min(i + 3);
            let escape = String::from_utf8_lossy(&bytes[i..end]).into_owned();
            return Err(ParamsError::InvalidEscape(escape));
        }
    }

    let spaced = s.replace('+', " ");
    Ok(percent_decode_str(&spaced).decode_utf8_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_keys_keep_appearance_order() {
        let params = Params::parse("a=1&b=2&a=3").unwrap();
        assert_eq!(params.get_all("a"), ["1", "3"]);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn plus_and_percent_decode() {
        let params = Params::parse("q=two+words&sym=%2B%26%3D&name=J%C3%BCrgen").unwrap();
        assert_eq!(params.get("q"), Some("two words"));
        assert_eq!(params.get("sym"), Some("+&="));
        assert_eq!(params.get("name"), Some("Jürgen"));
    }

    #[test]
    fn key_without_value_and_empty_segments() {
        let params = Params::parse("&&flag&x=&").unwrap();
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("x"), Some(""));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(Params::parse("").unwrap().is_empty());
    }

    #[test]
    fn value_keeps_everything_after_first_equals() {
        let params = Params::parse("expr=a=b").unwrap();
        assert_eq!(params.get("expr"), Some("a=b"));
    }

    #[test]
    fn bad_escape_is_reported_and_skipped() {
        let (params, err) = Params::parse_lenient("x=%zz&y=2");
        assert_eq!(err, Some(ParamsError::InvalidEscape("%zz".to_owned())));
        assert!(!params.contains_key("x"));
        assert_eq!(params.get("y"), Some("2"));
    }

    #[test]
    fn truncated_escape_at_end() {
        let err = Params::parse("x=%4").unwrap_err();
        assert_eq!(err, ParamsError::InvalidEscape("%4".to_owned()));
        assert_eq!(err.to_string(), r#"invalid URL escape "%4""#);
    }

    #[test]
    fn semicolon_is_rejected() {
        let (params, err) = Params::parse_lenient("a=1;b=2&c=3");
        assert_eq!(err, Some(ParamsError::InvalidSemicolon));
        assert_eq!(params.keys().collect::<Vec<_>>(), ["c"]);
    }

    #[test]
    fn first_error_wins() {
        let (_, err) = Params::parse_lenient("a;b&c=%g1");
        assert_eq!(err, Some(ParamsError::InvalidSemicolon));
    }

    #[test]
    fn extend_appends_after_existing_values() {
        let mut body = Params::parse("k=body").unwrap();
        body.extend(Params::parse("k=query&other=1").unwrap());
        assert_eq!(body.get_all("k"), ["body", "query"]);
        assert_eq!(body.get("other"), Some("1"));
    }
}
