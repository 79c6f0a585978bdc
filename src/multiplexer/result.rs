//! Outcome of one upstream fetch.

use axum::http::{header, HeaderMap, StatusCode};
use bytes::Bytes;
use std::time::Duration;

use crate::security::headers::strip_hop_by_hop;

#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Concrete URL that was requested.
    pub url: String,
    /// Time until response headers arrived.
    pub duration: Duration,
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Response body, gzip transport encoding already removed.
    pub body: Bytes,
    pub timing_label: Option<String>,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the upstream sent the body with `Content-Encoding: gzip`.
    pub fn was_gzip_encoded(&self) -> bool {
        is_gzip(&self.headers)
    }

    /// Response headers with hop-by-hop headers removed.
    pub fn headers_without_hop_by_hop(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);
        headers
    }
}

pub(crate) fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false)
}
