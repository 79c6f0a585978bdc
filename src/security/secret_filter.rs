//! URL redaction for logs and error messages.
//!
//! Query parameter values are replaced with `FILTERED` unless their name is
//! explicitly allowed, and credentials embedded in the URL are masked.

use std::collections::HashSet;
use url::Url;

pub const FILTERED: &str = "FILTERED";
pub const FILTERED_INVALID_URL: &str = "FILTEREDINVALIDURL";

#[derive(Debug, Clone, Default)]
pub struct SecretFilter {
    allowed: HashSet<String>,
}

impl SecretFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter that lets the given query parameter names through.
    pub fn with_allowed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for name in names {
            filter.allow(name);
        }
        filter
    }

    /// Allow a query parameter (case-insensitive) to be logged verbatim.
    pub fn allow(&mut self, name: impl AsRef<str>) {
        self.allowed.insert(name.as_ref().to_lowercase());
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(&name.to_lowercase())
    }

    pub fn filter_url(&self, url: &Url) -> Url {
        let mut filtered = url.clone();

        if !filtered.username().is_empty() || filtered.password().is_some() {
            let _ = filtered.set_username(FILTERED);
            let _ = filtered.set_password(Some(FILTERED));
        }

        if url.query().is_some() {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(name, value)| {
                    let value = if self.is_allowed(&name) {
                        value.into_owned()
                    } else {
                        FILTERED.to_string()
                    };
                    (name.into_owned(), value)
                })
                .collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));

            if pairs.is_empty() {
                filtered.set_query(None);
            } else {
                filtered.query_pairs_mut().clear().extend_pairs(&pairs);
            }
        }

        filtered
    }

    pub fn filter_url_str(&self, url: &str) -> String {
        match Url::parse(url) {
            Ok(parsed) => self.filter_url(&parsed).to_string(),
            Err(_) => FILTERED_INVALID_URL.to_string(),
        }
    }
}
