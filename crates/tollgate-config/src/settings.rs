//! Validated configuration structures

use crate::schema::{RawConfig, RawRateLimit, RawServiceConfig, RawTokenSettings};
use std::path::PathBuf;
use std::time::Duration;

/// Validated configuration ready for use by the service
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub service: ServicePaths,
    pub tokens: TokenLimits,
    pub rate_limit: RateLimitSettings,
}

impl ServiceConfig {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServicePaths::from_raw(raw.service),
            tokens: TokenLimits::from_raw(raw.tokens),
            rate_limit: RateLimitSettings::from_raw(raw.rate_limit),
        }
    }
}

/// Filesystem locations used by the service
#[derive(Debug, Clone)]
pub struct ServicePaths {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
}

impl ServicePaths {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(tollgate_util::socket_path_without_env),
            data_dir: raw
                .data_dir
                .unwrap_or_else(tollgate_util::data_dir_without_env),
        }
    }
}

impl Default for ServicePaths {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Rules applied to token requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    /// Longest accepted name, in bytes
    pub max_name_length: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl TokenLimits {
    fn from_raw(raw: RawTokenSettings) -> Self {
        Self {
            max_name_length: raw.max_name_length.unwrap_or(crate::MAX_NAME_LENGTH),
            default_page_size: raw.default_page_size.unwrap_or(crate::DEFAULT_PAGE_SIZE),
            max_page_size: raw.max_page_size.unwrap_or(crate::MAX_PAGE_SIZE),
        }
    }
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self::from_raw(RawTokenSettings::default())
    }
}

/// Per-client request budget on the IPC socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub requests: u32,
    pub interval: Duration,
}

impl RateLimitSettings {
    fn from_raw(raw: RawRateLimit) -> Self {
        Self {
            requests: raw.requests.unwrap_or(30),
            interval: Duration::from_millis(raw.interval_ms.unwrap_or(1000)),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::from_raw(RawRateLimit::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_limit_defaults() {
        let limits = TokenLimits::default();
        assert_eq!(limits.max_name_length, 30);
        assert_eq!(limits.default_page_size, 10);
        assert_eq!(limits.max_page_size, 100);
    }

    #[test]
    fn rate_limit_defaults() {
        let rl = RateLimitSettings::default();
        assert_eq!(rl.requests, 30);
        assert_eq!(rl.interval, Duration::from_secs(1));
    }

    #[test]
    fn explicit_paths_win() {
        let raw = RawServiceConfig {
            socket_path: Some(PathBuf::from("/tmp/t.sock")),
            data_dir: Some(PathBuf::from("/srv/tollgate")),
        };
        let paths = ServicePaths::from_raw(raw);
        assert_eq!(paths.socket_path, PathBuf::from("/tmp/t.sock"));
        assert_eq!(paths.data_dir, PathBuf::from("/srv/tollgate"));
    }
}
