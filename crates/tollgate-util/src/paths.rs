//! Default paths for tollgate components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/tollgate/tollgated.sock` or `/tmp/tollgate-$USER/tollgated.sock`
//! - Config: `$XDG_CONFIG_HOME/tollgate/config.toml` or `~/.config/tollgate/config.toml`
//! - Data: `$XDG_DATA_HOME/tollgate` or `~/.local/share/tollgate`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const TOLLGATE_SOCKET_ENV: &str = "TOLLGATE_SOCKET";

/// Environment variable for overriding the data directory
pub const TOLLGATE_DATA_DIR_ENV: &str = "TOLLGATE_DATA_DIR";

/// Environment variable for overriding the config file
pub const TOLLGATE_CONFIG_ENV: &str = "TOLLGATE_CONFIG";

const SOCKET_FILENAME: &str = "tollgated.sock";
const CONFIG_FILENAME: &str = "config.toml";
const APP_DIR: &str = "tollgate";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$TOLLGATE_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/tollgate/tollgated.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/tollgate-$USER/tollgated.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(TOLLGATE_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking TOLLGATE_SOCKET.
/// Used for config defaults where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$TOLLGATE_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/tollgate/config.toml`
/// 3. `~/.config/tollgate/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(TOLLGATE_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$TOLLGATE_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/tollgate` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/tollgate` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(TOLLGATE_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking TOLLGATE_DATA_DIR.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}
