//! Centralized application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/eleonor/` | `~/.local/share/eleonor/` |
//! | Config | `~/Library/Application Support/eleonor/` | `~/.config/eleonor/` |
//!
//! # Environment Overrides
//!
//! - `ELEONOR_DATA_DIR` overrides [`data_dir`]
//! - `ELEONOR_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// File name of the persisted avatar control credential.
pub const TOKEN_FILE_NAME: &str = "vts_token.json";

/// Application data root directory.
///
/// Holds the avatar control token. Resolves to `dirs::data_dir()/eleonor/`
/// unless `ELEONOR_DATA_DIR` is set.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ELEONOR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("eleonor"))
        .unwrap_or_else(|| PathBuf::from("/tmp/eleonor-data"))
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/eleonor/` unless `ELEONOR_CONFIG_DIR` is set.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("ELEONOR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("eleonor"))
        .unwrap_or_else(|| PathBuf::from("/tmp/eleonor-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default avatar control token path (`data_dir()/vts_token.json`).
#[must_use]
pub fn token_file() -> PathBuf {
    data_dir().join(TOKEN_FILE_NAME)
}
