//! Composed response construction.
//!
//! # Responsibilities
//! - Stitch fragment bodies into the final document
//! - Copy headers from the root fragment, minus hop-by-hop and ignored ones
//! - Emit a combined Server-Timing header
//! - Fill in the render-time marker
//! - Re-compress the document when the root fragment arrived gzipped
//!
//! # Design Decisions
//! - Content-Length and Content-Encoding are never copied from fragments
//! - Compression failures fall back to an uncompressed body

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use flate2::{write::GzEncoder, Compression};
use std::io::Write;
use std::time::Duration;

use crate::fragment::stitch::{self, map_results_to_keys, ROOT_KEY};
use crate::multiplexer::server_timing::{self, SERVER_TIMING};
use crate::multiplexer::FetchResult;
use crate::routing::Route;
use crate::security::headers::strip_hop_by_hop;

/// Replaced with the time spent rendering, in milliseconds.
pub const TIMING_MARKER: &[u8] = b"<view-proxy-timing></view-proxy-timing>";

pub struct ResponseBuilder<'a> {
    route: &'a Route,
    results: &'a [FetchResult],
    ignore_headers: &'a [HeaderName],
    elapsed: Duration,
}

impl<'a> ResponseBuilder<'a> {
    pub fn new(route: &'a Route, results: &'a [FetchResult]) -> Self {
        Self {
            route,
            results,
            ignore_headers: &[],
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_ignored_headers(mut self, headers: &'a [HeaderName]) -> Self {
        self.ignore_headers = headers;
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    fn root(&self) -> Option<&'a FetchResult> {
        self.route
            .fragment_order()
            .iter()
            .position(|key| key == ROOT_KEY)
            .and_then(|index| self.results.get(index))
    }

    /// The composed document, before compression.
    pub fn body(&self) -> Vec<u8> {
        let by_key = map_results_to_keys(self.route.fragment_order(), self.results);
        let body = stitch::compose(self.route.structure(), self.route.layout(), &by_key);

        let elapsed_ms = self.elapsed.as_millis().to_string();
        match stitch::replace_first(&body, TIMING_MARKER, elapsed_ms.as_bytes()) {
            Some(timed) => timed,
            None => body,
        }
    }

    /// Headers for the client response, before compression.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = self
            .root()
            .map(|root| root.headers.clone())
            .unwrap_or_default();

        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::CONTENT_ENCODING);
        for name in self.ignore_headers {
            headers.remove(name);
        }

        headers.remove(&SERVER_TIMING);
        if let Some(value) = server_timing::combined_header(self.results) {
            headers.insert(SERVER_TIMING, value);
        }

        headers
    }

    pub fn build(self) -> Response {
        let mut headers = self.headers();
        let mut body = self.body();

        if self.root().map(FetchResult::was_gzip_encoded).unwrap_or(false) {
            match gzip(&body) {
                Ok(encoded) => {
                    body = encoded;
                    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                }
                Err(e) => tracing::error!(error = %e, route = self.route.path(), "Failed to gzip response"),
            }
        }

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = StatusCode::OK;
        *response.headers_mut() = headers;
        response
    }
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}
