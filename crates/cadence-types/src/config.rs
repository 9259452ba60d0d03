//! Configuration types for Cadence.
//!
//! `CadenceConfig` represents the `cadence.toml` file that tunes the engine,
//! both prompt executors and the session backend connection. Every field has
//! a default, so an empty file (or no file) is a valid configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub tool_loop: ToolLoopConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Agent addressed by steps that do not name one.
    #[serde(default = "default_agent")]
    pub default_agent: String,
    /// Round cap for definitions without `maxRounds`.
    #[serde(default = "default_max_rounds")]
    pub default_max_rounds: u32,
    /// Values placed under `user` before caller inputs are merged in.
    #[serde(default)]
    pub user_defaults: Map<String, Value>,
}

fn default_agent() -> String {
    "build".to_string()
}

fn default_max_rounds() -> u32 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_agent: default_agent(),
            default_max_rounds: default_max_rounds(),
            user_defaults: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Timing and retry policy of the polling executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Submission attempts before giving up.
    #[serde(default = "default_max_send_attempts")]
    pub max_send_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Overall ceiling for waiting on a reply.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of history entries fetched per check.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

fn default_max_send_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    2_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_poll_timeout_secs() -> u64 {
    300
}

fn default_history_limit() -> u32 {
    100
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: default_max_send_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_poll_timeout_secs(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolLoopConfig {
    /// Backend round trips allowed per `execute` call.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_max_steps() -> u32 {
    10
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Connection settings for the HTTP session backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Model identifier, `provider/model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:4096".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_id: None,
            model: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = CadenceConfig::default();
        assert_eq!(config.engine.default_agent, "build");
        assert_eq!(config.engine.default_max_rounds, 10);
        assert_eq!(config.polling.max_send_attempts, 5);
        assert_eq!(config.polling.retry_backoff_ms, 2_000);
        assert_eq!(config.polling.poll_interval_ms, 500);
        assert_eq!(config.polling.timeout_secs, 300);
        assert_eq!(config.tool_loop.max_steps, 10);
        assert!(config.backend.session_id.is_none());
    }

    #[test]
    fn test_config_deserialize_empty_uses_defaults() {
        let config: CadenceConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.default_max_rounds, 10);
        assert_eq!(config.backend.base_url, "http://127.0.0.1:4096");
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
[engine]
default_agent = "plan"
default_max_rounds = 4

[engine.user_defaults]
repo = "cadence"

[polling]
poll_interval_ms = 250

[backend]
base_url = "http://localhost:9000"
session_id = "ses_123"
model = "anthropic/claude-sonnet-4"
"#;
        let config: CadenceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.default_agent, "plan");
        assert_eq!(config.engine.default_max_rounds, 4);
        assert_eq!(config.engine.user_defaults["repo"], "cadence");
        assert_eq!(config.polling.poll_interval_ms, 250);
        assert_eq!(config.polling.max_send_attempts, 5);
        assert_eq!(config.backend.session_id.as_deref(), Some("ses_123"));
    }
}
