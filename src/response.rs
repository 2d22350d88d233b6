//! The payload a check runs against.
//!
//! A [`Response`] is fetched upstream and handed to the checks as is. Each
//! derived view (decoded text, JSON tree, HTML tree, XML document) is
//! materialized the first time a check asks for it and shared by every
//! later check on the same response.

use encoding_rs::{Encoding, UTF_8};
use std::cell::OnceCell;
use std::fmt;
use std::time::Duration;

use sxd_document::Package;
use tracing::debug;

use crate::config::CoreConfig;
use crate::error::CheckError;

// ─── Charset ─────────────────────────────────────────────────────────────────

/// A body encoding, named by any WHATWG encoding label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Charset(&'static Encoding);

impl Charset {
    pub fn utf8() -> Charset {
        Charset(UTF_8)
    }

    /// Resolves a charset label, ignoring case and surrounding quotes.
    /// Unknown labels, and the ones that only map to the replacement
    /// encoding, yield `None`.
    pub fn from_label(label: &str) -> Option<Charset> {
        Encoding::for_label_no_replacement(label.trim().trim_matches('"').as_bytes()).map(Charset)
    }

    /// The canonical name, e.g. `windows-1252` for `latin1`.
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Malformed sequences become U+FFFD. A byte order mark takes precedence
    /// over `self` and is not part of the output.
    pub fn decode(self, bytes: &[u8]) -> String {
        let (text, _, _) = self.0.decode(bytes);
        text.into_owned()
    }
}

impl Default for Charset {
    fn default() -> Self {
        Charset::utf8()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Response ────────────────────────────────────────────────────────────────

pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    url: String,
    body: Vec<u8>,
    charset: Charset,
    elapsed: Duration,
    text: OnceCell<String>,
    json: OnceCell<Result<serde_json::Value, String>>,
    jsonp: OnceCell<Result<serde_json::Value, String>>,
    html: OnceCell<scraper::Html>,
    xml: OnceCell<Result<Package, String>>,
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new(Charset::utf8())
    }

    /// A builder whose fallback charset comes from `config`.
    pub fn builder_with(config: &CoreConfig) -> ResponseBuilder {
        ResponseBuilder::new(config.default_charset())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Every value of the header `name`, compared case-insensitively.
    pub fn header_values<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> + 'n
    where
        'a: 'n,
    {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The first value of the header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The body decoded with [`Response::charset`], or with the encoding its
    /// byte order mark names.
    pub fn text(&self) -> &str {
        self.text.get_or_init(|| self.charset.decode(&self.body))
    }

    pub fn json(&self) -> Result<&serde_json::Value, CheckError> {
        self.json
            .get_or_init(|| {
                serde_json::from_str(self.text()).map_err(|e| {
                    debug!(url = %self.url, error = %e, "body is not JSON");
                    e.to_string()
                })
            })
            .as_ref()
            .map_err(|e| CheckError::extraction(format!("Could not parse response into a JSON: {}", e)))
    }

    /// The JSON object wrapped in a `callback(...)` call.
    pub fn jsonp(&self) -> Result<&serde_json::Value, CheckError> {
        self.jsonp
            .get_or_init(|| {
                let parsed = strip_jsonp(self.text())
                    .ok_or_else(|| "body is not a JSONP call".to_string())
                    .and_then(|inner| serde_json::from_str(inner).map_err(|e| e.to_string()));
                if let Err(e) = &parsed {
                    debug!(url = %self.url, error = %e, "body is not JSONP");
                }
                parsed
            })
            .as_ref()
            .map_err(|e| {
                CheckError::extraction(format!("Could not parse response into a JSONP: {}", e))
            })
    }

    /// HTML parsing is lenient and never fails.
    pub fn html(&self) -> &scraper::Html {
        self.html
            .get_or_init(|| scraper::Html::parse_document(self.text()))
    }

    pub fn xml(&self) -> Result<&Package, CheckError> {
        self.xml
            .get_or_init(|| {
                sxd_document::parser::parse(self.text()).map_err(|e| {
                    debug!(url = %self.url, error = ?e, "body is not XML");
                    format!("{:?}", e)
                })
            })
            .as_ref()
            .map_err(|e| CheckError::extraction(format!("Could not parse response into a DOM: {}", e)))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("charset", &self.charset)
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// `callback( payload );` → `payload`. The callback may be a dotted path of
/// identifiers and the body must be that one call.
fn strip_jsonp(text: &str) -> Option<&str> {
    let text = text.trim();
    let open = text.find('(')?;
    let callback = text[..open].trim();
    if callback.is_empty()
        || !callback
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
    {
        return None;
    }
    let rest = text[open + 1..].trim_end();
    let rest = rest.strip_suffix(';').unwrap_or(rest).trim_end();
    let inner = rest.strip_suffix(')')?;
    is_single_argument(inner).then(|| inner.trim())
}

/// Brackets outside string literals balance and never close more than
/// they opened, so `inner` cannot end one call and start another.
fn is_single_argument(inner: &str) -> bool {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for c in inner.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0 && quote.is_none()
}

/// Pulls the `charset=` parameter out of a `Content-Type` value.
fn content_type_charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim())
    })
}

// ─── ResponseBuilder ─────────────────────────────────────────────────────────

pub struct ResponseBuilder {
    status: u16,
    headers: Vec<(String, String)>,
    url: String,
    body: Vec<u8>,
    charset: Option<Charset>,
    fallback: Charset,
    elapsed: Duration,
}

impl ResponseBuilder {
    fn new(fallback: Charset) -> Self {
        ResponseBuilder {
            status: 200,
            headers: Vec::new(),
            url: String::new(),
            body: Vec::new(),
            charset: None,
            fallback,
            elapsed: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Overrides whatever the `Content-Type` header declares.
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = Some(charset);
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn build(self) -> Response {
        let charset = self.charset.unwrap_or_else(|| {
            let declared = self
                .headers
                .iter()
                .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                .find_map(|(_, v)| content_type_charset(v));
            match declared {
                Some(label) => Charset::from_label(label).unwrap_or_else(|| {
                    debug!(charset = label, "unsupported charset, decoding as UTF-8");
                    Charset::utf8()
                }),
                None => self.fallback,
            }
        });

        Response {
            status: self.status,
            headers: self.headers,
            url: self.url,
            body: self.body,
            charset,
            elapsed: self.elapsed,
            text: OnceCell::new(),
            json: OnceCell::new(),
            jsonp: OnceCell::new(),
            html: OnceCell::new(),
            xml: OnceCell::new(),
        }
    }
}
