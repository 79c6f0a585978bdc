//! Error responses for failed compositions.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use thiserror::Error;

use crate::fragment::FragmentError;
use crate::multiplexer::MultiplexError;
use crate::routing::Route;

/// Why a matched route could not be rendered.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error(transparent)]
    Multiplex(#[from] MultiplexError),
}

impl ProxyError {
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Fragment(FragmentError::MissingParameter { .. }) => "missing_parameter",
            ProxyError::Fragment(FragmentError::InvalidEncoding { .. }) => "invalid_encoding",
            ProxyError::Multiplex(e) => e.kind(),
        }
    }
}

/// Turns a render failure into the client response.
pub trait ErrorHandler: Send + Sync + fmt::Debug {
    fn handle(&self, route: &Route, error: &ProxyError) -> Response;
}

/// Answers every failure with a plain 500.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, _route: &Route, _error: &ProxyError) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
