//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → [routing layer matches route]
//!     → [multiplexer fetches fragments]
//!     → response.rs (stitch, headers, Server-Timing, gzip)
//!     → Send to client
//!
//! No match:
//!     → passthrough.rs (forward to upstream) or 404
//! ```

pub mod error;
pub mod passthrough;
pub mod request;
pub mod response;
pub mod server;

pub use error::{DefaultErrorHandler, ErrorHandler, ProxyError};
pub use request::{RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::ResponseBuilder;
pub use server::{AppState, HttpServer};
