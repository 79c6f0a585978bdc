//! Pluggable HTTP transport for upstream requests.
//!
//! # Responsibilities
//! - Abstract "send a request, get a response" behind an object-safe trait
//! - Provide the default hyper client transport
//! - Provide a logging decorator around any transport
//!
//! # Design Decisions
//! - Futures are boxed so `Arc<dyn Tripper>` can be shared across tasks
//! - Responses are normalized to `axum::body::Body`

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::fmt;
use std::time::{Duration, Instant};

use crate::security::secret_filter::SecretFilter;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type TripperFuture = BoxFuture<'static, Result<Response<Body>, BoxError>>;

/// Sends a single HTTP request.
pub trait Tripper: Send + Sync + fmt::Debug {
    fn request(&self, request: Request<Body>) -> TripperFuture;
}

/// Default transport backed by the pooled hyper client.
#[derive(Clone)]
pub struct HyperTripper {
    client: Client<HttpConnector, Body>,
}

impl HyperTripper {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

impl Default for HyperTripper {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl fmt::Debug for HyperTripper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTripper").finish_non_exhaustive()
    }
}

impl Tripper for HyperTripper {
    fn request(&self, request: Request<Body>) -> TripperFuture {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.request(request).await?;
            Ok::<_, BoxError>(response.map(Body::new))
        })
    }
}

/// Logs method, redacted URL, status and latency of every request.
#[derive(Debug)]
pub struct LoggingTripper<T> {
    inner: T,
    filter: SecretFilter,
}

impl<T: Tripper> LoggingTripper<T> {
    pub fn new(inner: T, filter: SecretFilter) -> Self {
        Self { inner, filter }
    }
}

impl<T: Tripper> Tripper for LoggingTripper<T> {
    fn request(&self, request: Request<Body>) -> TripperFuture {
        let method = request.method().clone();
        let url = self.filter.filter_url_str(&request.uri().to_string());
        let response = self.inner.request(request);

        Box::pin(async move {
            let start = Instant::now();
            let outcome = response.await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match &outcome {
                Ok(response) => tracing::info!(
                    method = %method,
                    url = %url,
                    status = response.status().as_u16(),
                    duration_ms,
                    "Upstream response"
                ),
                Err(e) => tracing::warn!(
                    method = %method,
                    url = %url,
                    duration_ms,
                    error = %e,
                    "Upstream request failed"
                ),
            }

            outcome
        })
    }
}
