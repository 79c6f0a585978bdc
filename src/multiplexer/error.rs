//! Multiplexer error types.

use axum::http::{Method, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio::time::error::Elapsed;

use super::result::FetchResult;
use super::tripper::BoxError;
use crate::security::signing::SigningError;

/// Errors that can abort a multiplexed fetch.
///
/// URLs carried in errors are redacted and use the fragment template, so
/// they are safe to log.
#[derive(Debug, Error)]
pub enum MultiplexError {
    /// A fragment answered with a non-2xx status while those count as errors.
    #[error("status: {} url: {}", .status.as_u16(), .url)]
    Status {
        status: StatusCode,
        url: String,
        result: Box<FetchResult>,
    },

    #[error("{method} \"{url}\": {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("could not read body from \"{url}\": {source}")]
    Body {
        url: String,
        #[source]
        source: axum::Error,
    },

    #[error("could not decode gzip body from \"{url}\": {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("multiplexer timed out: {source}")]
    Timeout {
        timeout: Duration,
        #[source]
        source: Elapsed,
    },

    #[error("multiplexer request was canceled")]
    Canceled,

    #[error("could not build request for \"{url}\": {source}")]
    InvalidRequest {
        url: String,
        #[source]
        source: axum::http::Error,
    },

    #[error("could not sign fragment request: {0}")]
    Signing(#[from] SigningError),

    #[error("fragment task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MultiplexError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            MultiplexError::Status { .. } => "status",
            MultiplexError::Transport { .. } => "transport",
            MultiplexError::Body { .. } => "body",
            MultiplexError::Decode { .. } => "decode",
            MultiplexError::Timeout { .. } => "timeout",
            MultiplexError::Canceled => "canceled",
            MultiplexError::InvalidRequest { .. } => "invalid_request",
            MultiplexError::Signing(_) => "signing",
            MultiplexError::Task(_) => "task",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MultiplexError::Timeout { .. })
    }

    /// The fragment result behind a status error.
    pub fn result(&self) -> Option<&FetchResult> {
        match self {
            MultiplexError::Status { result, .. } => Some(result),
            _ => None,
        }
    }
}
