//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Token rules
    #[serde(default)]
    pub tokens: RawTokenSettings,

    /// Per-client IPC rate limit
    #[serde(default)]
    pub rate_limit: RawRateLimit,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path (default: $XDG_RUNTIME_DIR/tollgate/tollgated.sock)
    pub socket_path: Option<PathBuf>,

    /// Data directory for the token database
    pub data_dir: Option<PathBuf>,
}

/// Token rules
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTokenSettings {
    /// Longest accepted token name, in bytes
    pub max_name_length: Option<usize>,

    /// Page size used when a list request does not give one
    pub default_page_size: Option<u32>,

    /// Largest page size a client may ask for
    pub max_page_size: Option<u32>,
}

/// Rate limit for IPC clients
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRateLimit {
    /// Requests allowed per interval
    pub requests: Option<u32>,

    /// Interval length in milliseconds
    pub interval_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            socket_path = "/run/tollgate/tollgated.sock"
            data_dir = "/var/lib/tollgate"

            [tokens]
            max_name_length = 48
            default_page_size = 20

            [rate_limit]
            requests = 10
            interval_ms = 500
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tokens.max_name_length, Some(48));
        assert_eq!(config.tokens.max_page_size, None);
        assert_eq!(config.rate_limit.interval_ms, Some(500));
        assert_eq!(
            config.service.data_dir,
            Some(PathBuf::from("/var/lib/tollgate"))
        );
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.socket_path.is_none());
        assert!(config.tokens.default_page_size.is_none());
    }
}
