//! Fragment subsystem.
//!
//! # Data Flow
//! ```text
//! definition.rs: path template + children → Requestable per request
//! stitch.rs:     fragment tree + FetchResult[] → composed document
//! ```

pub mod definition;
pub mod stitch;

pub use definition::{FragmentDefinition, FragmentError, PathParams};
pub use stitch::{Layout, StitchStructure};
