//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for viewproxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream server that serves fragments.
    pub upstream: UpstreamConfig,

    /// Where routes come from and how they match.
    pub routing: RoutingConfig,

    /// Composed response settings.
    pub response: ResponseConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3005").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3005".to_string(),
        }
    }
}

/// Upstream fragment server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL fragment paths are appended to.
    pub target: String,

    /// Deadline for fetching all fragments of one request.
    pub timeout_ms: u64,

    /// Shared secret used to sign fragment requests.
    pub hmac_secret: Option<String>,

    /// Largest fragment body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            target: "http://localhost:3000".to_string(),
            timeout_ms: 10_000,
            hmac_secret: None,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Route sources and matching behavior.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutingConfig {
    /// JSON file with route definitions.
    pub routes_file: Option<PathBuf>,

    /// Path on the upstream target serving route definitions as JSON.
    pub routes_path: Option<String>,

    /// Reload `routes_file` when it changes.
    pub watch: bool,

    /// Treat `/a/b/` like `/a/b`.
    pub ignore_trailing_slash: bool,

    /// Forward unmatched requests to the upstream instead of answering 404.
    pub passthrough: bool,

    /// Origin for passthrough requests. Defaults to the upstream target.
    pub passthrough_target: Option<String>,
}

/// Composed response settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResponseConfig {
    /// Headers from the root fragment that are not copied to the client.
    pub ignore_headers: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection timeout to upstream servers.
    pub connect_secs: u64,

    /// Total inbound request timeout.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when RUST_LOG is unset.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Expose Prometheus metrics.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Query parameters whose values may appear in logs and errors.
    pub allowed_query_params: Vec<String>,

    /// Largest inbound body forwarded on passthrough, in bytes.
    pub max_request_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_query_params: Vec::new(),
            max_request_body_bytes: 2 * 1024 * 1024,
        }
    }
}
