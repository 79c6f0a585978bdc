//! Concurrent fragment fetching.
//!
//! # Responsibilities
//! - Fetch every requestable of a route concurrently
//! - Return results in input order, regardless of completion order
//! - Fail fast: the first error cancels all outstanding fetches
//! - Enforce an overall deadline and honor caller cancellation
//! - Sign fragment requests and undo gzip transport encoding
//!
//! # Data Flow
//! ```text
//! fetch_all(requestables, headers, cancel)
//!     → child CancellationToken (scope)
//!     → JoinSet: one task per requestable, tagged with its index
//!     → join_next() fills result slots; first Err cancels the scope
//!     → Vec<FetchResult> in input order
//! ```
//!
//! # Design Decisions
//! - Caller headers are cloned per task, never shared mutably
//! - Tasks are aborted as soon as the outcome is decided

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request};
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use super::error::MultiplexError;
use super::requestable::Requestable;
use super::result::{is_gzip, FetchResult};
use super::tripper::Tripper;
use crate::observability::metrics;
use crate::security::secret_filter::SecretFilter;
use crate::security::signing;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

type TaskOutcome = (usize, Result<FetchResult, MultiplexError>);

/// Fans requests out to upstream servers.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    tripper: Arc<dyn Tripper>,
    timeout: Duration,
    hmac_secret: Option<Arc<str>>,
    non_2xx_errors: bool,
    secret_filter: Arc<SecretFilter>,
    max_body_bytes: usize,
}

impl Multiplexer {
    pub fn new(tripper: Arc<dyn Tripper>) -> Self {
        Self {
            tripper,
            timeout: DEFAULT_TIMEOUT,
            hmac_secret: None,
            non_2xx_errors: true,
            secret_filter: Arc::new(SecretFilter::new()),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_hmac_secret(mut self, secret: Option<String>) -> Self {
        self.hmac_secret = secret.filter(|s| !s.is_empty()).map(Arc::from);
        self
    }

    /// Whether non-2xx fragment responses abort the whole fetch (default true).
    pub fn with_non_2xx_errors(mut self, enabled: bool) -> Self {
        self.non_2xx_errors = enabled;
        self
    }

    pub fn with_secret_filter(mut self, filter: SecretFilter) -> Self {
        self.secret_filter = Arc::new(filter);
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn secret_filter(&self) -> &SecretFilter {
        &self.secret_filter
    }

    /// Fetch all requestables concurrently.
    ///
    /// Results line up with `requestables` by index. The first failure, the
    /// deadline, or cancellation of `cancel` ends the whole operation.
    pub async fn fetch_all(
        &self,
        requestables: &[Requestable],
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchResult>, MultiplexError> {
        if cancel.is_cancelled() {
            return Err(MultiplexError::Canceled);
        }

        let scope = cancel.child_token();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();

        for (index, requestable) in requestables.iter().enumerate() {
            let fetcher = self.clone();
            let requestable = requestable.clone();
            let headers = headers.clone();
            let scope = scope.clone();
            let span = tracing::info_span!(
                "fetch_url",
                key = requestable.key(),
                url = %self.secret_filter.filter_url(requestable.url()),
                metadata = ?requestable.metadata(),
            );

            tasks.spawn(
                async move {
                    let outcome = tokio::select! {
                        biased;
                        _ = scope.cancelled() => Err(MultiplexError::Canceled),
                        outcome = fetcher.fetch_requestable(&requestable, headers) => outcome,
                    };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MultiplexError::Canceled),
            collected = tokio::time::timeout(self.timeout, collect(&mut tasks, requestables.len())) => {
                match collected {
                    Ok(outcome) => outcome,
                    Err(elapsed) => Err(MultiplexError::Timeout { timeout: self.timeout, source: elapsed }),
                }
            }
        };

        scope.cancel();
        tasks.abort_all();

        if let Err(e) = &outcome {
            tracing::debug!(error = %e, "Multiplexed fetch aborted");
        }
        outcome
    }

    /// Fetch a single URL with the given method and body.
    ///
    /// Non-2xx responses are returned as results, never as errors.
    pub async fn fetch_single(
        &self,
        method: Method,
        url: &Url,
        headers: HeaderMap,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> Result<FetchResult, MultiplexError> {
        if cancel.is_cancelled() {
            return Err(MultiplexError::Canceled);
        }

        let template_url = url.to_string();
        let fetch = self.fetch(method, url, &template_url, headers, Body::from(body));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MultiplexError::Canceled),
            outcome = tokio::time::timeout(self.timeout, fetch) => match outcome {
                Ok(outcome) => outcome,
                Err(elapsed) => Err(MultiplexError::Timeout { timeout: self.timeout, source: elapsed }),
            },
        }
    }

    async fn fetch_requestable(
        &self,
        requestable: &Requestable,
        mut headers: HeaderMap,
    ) -> Result<FetchResult, MultiplexError> {
        if let Some(secret) = &self.hmac_secret {
            signing::sign_headers(&mut headers, secret, &requestable.signing_path())?;
        }

        let mut result = self
            .fetch(
                Method::GET,
                requestable.url(),
                requestable.template_url(),
                headers,
                Body::empty(),
            )
            .await?;
        result.timing_label = requestable.timing_label().map(str::to_owned);

        metrics::record_fragment(
            requestable.timing_label().unwrap_or("unlabeled"),
            result.status.as_u16(),
            result.duration,
        );

        if self.non_2xx_errors && !result.is_success() {
            return Err(MultiplexError::Status {
                status: result.status,
                url: self.secret_filter.filter_url_str(requestable.template_url()),
                result: Box::new(result),
            });
        }

        Ok(result)
    }

    async fn fetch(
        &self,
        method: Method,
        url: &Url,
        template_url: &str,
        headers: HeaderMap,
        body: Body,
    ) -> Result<FetchResult, MultiplexError> {
        let start = Instant::now();

        let mut request = Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .body(body)
            .map_err(|source| MultiplexError::InvalidRequest {
                url: self.secret_filter.filter_url_str(template_url),
                source,
            })?;
        *request.headers_mut() = headers;

        let response = self
            .tripper
            .request(request)
            .await
            .map_err(|source| MultiplexError::Transport {
                method,
                url: self.secret_filter.filter_url_str(template_url),
                source,
            })?;
        let duration = start.elapsed();

        let (parts, body) = response.into_parts();
        let raw = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|source| MultiplexError::Body {
                url: self.secret_filter.filter_url_str(template_url),
                source,
            })?;

        let body = if is_gzip(&parts.headers) {
            decode_gzip(&raw, self.max_body_bytes).map_err(|source| MultiplexError::Decode {
                url: self.secret_filter.filter_url_str(template_url),
                source,
            })?
        } else {
            raw
        };

        Ok(FetchResult {
            url: url.to_string(),
            duration,
            status: parts.status,
            headers: parts.headers,
            body,
            timing_label: None,
        })
    }
}

async fn collect(
    tasks: &mut JoinSet<TaskOutcome>,
    len: usize,
) -> Result<Vec<FetchResult>, MultiplexError> {
    let mut slots: Vec<Option<FetchResult>> = vec![None; len];

    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        slots[index] = Some(outcome?);
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Decompress a gzip body, failing once the output passes `limit` bytes.
fn decode_gzip(raw: &[u8], limit: usize) -> std::io::Result<Bytes> {
    let mut decoded = Vec::with_capacity(raw.len().saturating_mul(2).min(limit));
    GzDecoder::new(raw)
        .take(limit as u64 + 1)
        .read_to_end(&mut decoded)?;

    if decoded.len() > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("decompressed body exceeds {} bytes", limit),
        ));
    }
    Ok(Bytes::from(decoded))
}
