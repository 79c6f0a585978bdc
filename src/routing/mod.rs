//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Import (at startup / on reload):
//!     routes JSON (file or target endpoint)
//!     → importer.rs (deserialize, build fragment trees)
//!     → route.rs (validate parameters, precompute fragment order)
//!     → router.rs (RouteTable, registration order)
//!
//! Incoming Request (raw escaped path):
//!     → router.rs (first matching route)
//!     → Return: (Route, PathParams) or no match
//! ```
//!
//! # Design Decisions
//! - Routes are validated at registration, never at request time
//! - No regex in the hot path (segment comparison only)
//! - Deterministic: same input always matches same route

pub mod importer;
pub mod route;
pub mod router;

pub use route::{mapping, Route, RouteValidationError};
pub use router::RouteTable;
