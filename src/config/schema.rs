//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the surrogate key proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin server the proxy forwards to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Surrogate key projection settings.
    pub surrogate_keys: SurrogateKeyConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
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

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Surrogate key projection configuration.
///
/// The 16 KB limit and the fingerprint width are fixed by the CDN and are
/// deliberately absent here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SurrogateKeyConfig {
    /// Install the projection layer.
    pub enabled: bool,

    /// Drop `X-Drupal-Cache-Tags` from responses after projecting it.
    pub strip_cache_tags: bool,

    /// Treat requests carrying `X-Sub-Request` as sub-requests. Only enable
    /// when the edge strips that header from client requests.
    pub trust_sub_request_header: bool,
}

impl Default for SurrogateKeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strip_cache_tags: false,
            trust_sub_request_header: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.upstream.address, "127.0.0.1:3000");
        assert!(config.surrogate_keys.enabled);
        assert!(!config.surrogate_keys.strip_cache_tags);
        assert!(!config.surrogate_keys.trust_sub_request_header);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_sections() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            address = "10.0.0.5:8000"

            [observability]
            log_format = "json"
            metrics_enabled = false

            [surrogate_keys]
            strip_cache_tags = true
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.address, "10.0.0.5:8000");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.metrics_enabled);
        assert!(config.surrogate_keys.enabled);
        assert!(config.surrogate_keys.strip_cache_tags);
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_unknown_log_format_is_rejected() {
        let result: Result<ProxyConfig, _> = toml::from_str(
            r#"
            [observability]
            log_format = "xml"
            "#,
        );
        assert!(result.is_err());
    }
}
