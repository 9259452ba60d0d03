//! Configuration loader for Cadence.
//!
//! Reads `cadence.toml` and deserializes it into [`CadenceConfig`]. Falls back
//! to sensible defaults when the file is missing or malformed.

use std::path::Path;

use cadence_types::config::CadenceConfig;

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "cadence.toml";

/// Errors from parsing a configuration document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a TOML configuration document.
pub fn parse_config(content: &str) -> Result<CadenceConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`CadenceConfig::default()`].
/// - If the file exists but cannot be read or parsed, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(path: &Path) -> CadenceConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return CadenceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return CadenceConfig::default();
        }
    };

    match parse_config(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            CadenceConfig::default()
        }
    }
}
