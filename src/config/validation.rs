//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check option combinations (watching requires a routes file and no HTTP import)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use super::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid listener bind address '{0}'")]
    BindAddress(String),

    #[error("invalid upstream target '{target}': {reason}")]
    Target { target: String, reason: String },

    #[error("invalid passthrough target '{target}': {reason}")]
    PassthroughTarget { target: String, reason: String },

    #[error("upstream timeout must be greater than zero")]
    ZeroUpstreamTimeout,

    #[error("request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("routing.watch requires routing.routes_file")]
    WatchWithoutFile,

    #[error("routing.watch only reloads routing.routes_file and cannot be combined with routing.routes_path")]
    WatchWithRoutesPath,

    #[error("invalid ignored header name '{0}'")]
    IgnoreHeader(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if let Err(reason) = check_http_url(&config.upstream.target) {
        errors.push(ValidationError::Target {
            target: config.upstream.target.clone(),
            reason,
        });
    }

    if let Some(target) = &config.routing.passthrough_target {
        if let Err(reason) = check_http_url(target) {
            errors.push(ValidationError::PassthroughTarget {
                target: target.clone(),
                reason,
            });
        }
    }

    if config.upstream.timeout_ms == 0 {
        errors.push(ValidationError::ZeroUpstreamTimeout);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.routing.watch && config.routing.routes_file.is_none() {
        errors.push(ValidationError::WatchWithoutFile);
    }

    if config.routing.watch && config.routing.routes_path.is_some() {
        errors.push(ValidationError::WatchWithRoutesPath);
    }

    for name in &config.response.ignore_headers {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::IgnoreHeader(name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_http_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.target = "ftp://example.com".into();
        config.upstream.timeout_ms = 0;
        config.routing.watch = true;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::ZeroUpstreamTimeout));
        assert!(errors.contains(&ValidationError::WatchWithoutFile));
    }

    #[test]
    fn test_watch_rejects_http_routes() {
        let mut config = ProxyConfig::default();
        config.routing.routes_file = Some("routes.json".into());
        config.routing.watch = true;
        assert!(validate_config(&config).is_ok());

        config.routing.routes_path = Some("/_viewproxy/routes".into());
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::WatchWithRoutesPath]
        );
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ProxyConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MetricsAddress("nope".into())]
        );
    }

    #[test]
    fn test_invalid_ignore_header() {
        let mut config = ProxyConfig::default();
        config.response.ignore_headers = vec!["etag".into(), "bad header".into()];

        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::IgnoreHeader("bad header".into())]
        );
    }
}
