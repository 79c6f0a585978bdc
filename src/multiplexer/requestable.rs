//! A single upstream URL the multiplexer can fetch.

use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone)]
pub struct Requestable {
    key: String,
    url: Url,
    decoded_path: String,
    template_url: String,
    metadata: HashMap<String, String>,
    timing_label: Option<String>,
}

impl Requestable {
    /// Build a requestable for an ad-hoc URL. The template URL is the URL itself.
    pub fn new(url: Url) -> Self {
        let decoded_path = decode_path(url.path()).unwrap_or_else(|| url.path().to_string());
        let template_url = url.to_string();

        Self::from_parts(url, decoded_path, template_url)
    }

    pub(crate) fn from_parts(url: Url, decoded_path: String, template_url: String) -> Self {
        Self {
            key: String::new(),
            url,
            decoded_path,
            template_url,
            metadata: HashMap::new(),
            timing_label: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timing_label(mut self, label: Option<String>) -> Self {
        self.timing_label = label;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The concrete URL, parameters substituted and query attached.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL path with percent-escapes decoded.
    pub fn decoded_path(&self) -> &str {
        &self.decoded_path
    }

    /// The URL with `:name` placeholders left in place. Safe to log.
    pub fn template_url(&self) -> &str {
        &self.template_url
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn timing_label(&self) -> Option<&str> {
        self.timing_label.as_deref()
    }

    /// Path (and query, if any) covered by the request signature.
    pub fn signing_path(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.decoded_path, query),
            None => self.decoded_path.clone(),
        }
    }
}

/// Percent-decode a URL path. Bytes that are not UTF-8 once decoded are
/// replaced, so only a malformed escape (`%` without two hex digits) fails.
pub fn decode_path(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    Some(String::from_utf8_lossy(&urlencoding::decode_binary(bytes)).into_owned())
}
