//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → signing.rs (HMAC over path and timestamp, when a secret is set)
//!     → Fragment request
//!
//! Logging:
//!     → secret_filter.rs (redact query values and userinfo)
//! ```
//!
//! # Design Decisions
//! - Query values are redacted unless explicitly allowed
//! - Forwarding headers set by an earlier proxy are kept

pub mod headers;
pub mod secret_filter;
pub mod signing;

pub use secret_filter::SecretFilter;
