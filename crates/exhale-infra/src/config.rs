//! Platform configuration loader for Exhale.
//!
//! Reads `config.toml` from the data directory (`~/.exhale/` in production)
//! and deserializes it into [`PlatformConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use exhale_types::config::PlatformConfig;

/// Resolve the data directory from `EXHALE_DATA_DIR`, falling back to
/// `~/.exhale`.
pub fn resolve_data_dir() -> PathBuf {
    match std::env::var("EXHALE_DATA_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".exhale")
        }
    }
}

/// Load platform configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`PlatformConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_platform_config(data_dir: &Path) -> PlatformConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return PlatformConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return PlatformConfig::default();
        }
    };

    match toml::from_str::<PlatformConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            PlatformConfig::default()
        }
    }
}
