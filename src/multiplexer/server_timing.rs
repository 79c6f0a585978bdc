//! Server-Timing header parsing and aggregation.
//!
//! # Data Flow
//! ```text
//! FetchResult[] (each with optional timing label + upstream Server-Timing)
//!     → one "{label}-fragment" metric per labelled fragment
//!     → upstream metrics re-namespaced as "{label}-{name}"
//!     → single comma-joined header value for the client
//! ```

use axum::http::{HeaderName, HeaderValue};
use std::fmt;
use std::time::Duration;

use super::result::FetchResult;

pub const SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    pub description: Option<String>,
    pub duration: Option<Duration>,
}

impl Metric {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            duration: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(description) = &self.description {
            write!(f, ";desc={}", quote_if_needed(description))?;
        }
        if let Some(duration) = self.duration {
            write!(f, ";dur={}", duration.as_nanos() as f64 / 1_000_000.0)?;
        }
        Ok(())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn quote_if_needed(value: &str) -> String {
    if !value.is_empty() && value.chars().all(is_token_char) {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Split on `delimiter` outside of double quotes.
fn split_unquoted(input: &str, delimiter: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                pieces.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&input[start..]);
    pieces
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}

/// Parse a Server-Timing header value. Malformed entries are skipped.
pub fn parse(value: &str) -> Vec<Metric> {
    let mut metrics = Vec::new();

    for entry in split_unquoted(value, ',') {
        let mut params = split_unquoted(entry, ';').into_iter();
        let name = match params.next().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };
        let mut metric = Metric::new(name);

        for param in params {
            let Some((key, raw)) = param.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "dur" if metric.duration.is_none() => {
                    if let Ok(ms) = unquote(raw).parse::<f64>() {
                        if ms.is_finite() && ms >= 0.0 {
                            metric.duration = Some(Duration::from_nanos((ms * 1_000_000.0).round() as u64));
                        }
                    }
                }
                "desc" if metric.description.is_none() => {
                    metric.description = Some(unquote(raw));
                }
                _ => {}
            }
        }

        metrics.push(metric);
    }

    metrics
}

/// Metrics describing a set of fragment results.
pub fn metrics_for_results(results: &[FetchResult]) -> Vec<Metric> {
    let mut metrics = Vec::new();

    for result in results {
        let Some(label) = result.timing_label.as_deref() else {
            continue;
        };

        metrics.push(
            Metric::new(format!("{}-fragment", label))
                .with_description(format!("{} fragment", label))
                .with_duration(result.duration),
        );

        for value in result.headers.get_all(&SERVER_TIMING) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for upstream in parse(value) {
                let Some(duration) = upstream.duration.filter(|d| !d.is_zero()) else {
                    continue;
                };
                metrics.push(
                    Metric::new(format!("{}-{}", label, upstream.name))
                        .with_description(format!("{} {}", label, upstream.name))
                        .with_duration(duration),
                );
            }
        }
    }

    metrics
}

/// Combined Server-Timing value for a response, if any fragment was labelled.
pub fn combined_header(results: &[FetchResult]) -> Option<HeaderValue> {
    let metrics = metrics_for_results(results);
    if metrics.is_empty() {
        return None;
    }

    let value = metrics
        .iter()
        .map(Metric::to_string)
        .collect::<Vec<_>>()
        .join(",");

    match HeaderValue::from_str(&value) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping unrepresentable Server-Timing header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use bytes::Bytes;

    fn result(label: Option<&str>, duration_ms: u64, server_timing: Option<&'static str>) -> FetchResult {
        let mut headers = HeaderMap::new();
        if let Some(value) = server_timing {
            headers.insert(SERVER_TIMING, HeaderValue::from_static(value));
        }
        FetchResult {
            url: "http://fake.net/".into(),
            duration: Duration::from_millis(duration_ms),
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
            timing_label: label.map(str::to_owned),
        }
    }

    #[test]
    fn test_parse_header() {
        let metrics = parse(r#"db;dur=53.2;desc="Database, primary", cache;desc=hit, total;dur=12"#);

        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].name, "db");
        assert_eq!(metrics[0].description.as_deref(), Some("Database, primary"));
        assert_eq!(metrics[0].duration, Some(Duration::from_micros(53_200)));
        assert_eq!(metrics[1].description.as_deref(), Some("hit"));
        assert_eq!(metrics[1].duration, None);
        assert_eq!(metrics[2].duration, Some(Duration::from_millis(12)));
    }

    #[test]
    fn test_format_metric() {
        let metric = Metric::new("layout-fragment")
            .with_description("layout fragment")
            .with_duration(Duration::from_millis(3));
        assert_eq!(metric.to_string(), r#"layout-fragment;desc="layout fragment";dur=3"#);

        assert_eq!(Metric::new("db").with_description("primary").to_string(), "db;desc=primary");
    }

    #[test]
    fn test_combined_header_namespaces_upstream_metrics() {
        let results = vec![
            result(Some("layout"), 10, None),
            result(Some("body"), 20, Some("db;dur=5;desc=\"query\", cache;dur=0")),
            result(None, 30, Some("ignored;dur=9")),
        ];

        let value = combined_header(&results).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            r#"layout-fragment;desc="layout fragment";dur=10,body-fragment;desc="body fragment";dur=20,body-db;desc="body db";dur=5"#
        );
    }

    #[test]
    fn test_no_labels_no_header() {
        assert!(combined_header(&[result(None, 1, None)]).is_none());
    }
}
