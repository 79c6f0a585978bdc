//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared by the server and multiplexer
//!
//! On routes file change:
//!     watcher.rs detects change
//!     → routing::importer rebuilds a RouteTable
//!     → atomic swap of Arc<RouteTable>
//!     → in-flight requests keep the table they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only routes hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, ResponseConfig, RoutingConfig,
    SecurityConfig, TimeoutConfig, UpstreamConfig,
};
