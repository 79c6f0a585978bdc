//! Upstream fetching subsystem.
//!
//! # Data Flow
//! ```text
//! Route + params + query
//!     → Requestable[] (concrete URLs, template URLs, timing labels)
//!     → request.rs (concurrent fail-fast fan-out via a Tripper)
//!     → FetchResult[] in route order
//!     → server_timing.rs (combined Server-Timing value)
//! ```
//!
//! # Design Decisions
//! - The transport is a trait object so tests and decorators can swap it
//! - Errors never carry raw URLs; they are redacted before construction

pub mod error;
pub mod request;
pub mod requestable;
pub mod result;
pub mod server_timing;
pub mod tripper;

pub use error::MultiplexError;
pub use request::Multiplexer;
pub use requestable::Requestable;
pub use result::FetchResult;
pub use tripper::{HyperTripper, LoggingTripper, Tripper};
