//! viewproxy: a fragment-composition reverse proxy.
//!
//! Requests that match a configured route are rendered by fetching every
//! fragment of the route concurrently and stitching the bodies into the
//! layout. Everything else is passed through to the upstream origin.

pub mod config;
pub mod fragment;
pub mod http;
pub mod lifecycle;
pub mod multiplexer;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use fragment::FragmentDefinition;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use multiplexer::Multiplexer;
pub use routing::{Route, RouteTable};
