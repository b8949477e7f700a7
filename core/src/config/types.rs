use serde::{Deserialize, Serialize};

use crate::client::DEFAULT_MODEL;
use crate::queue::GenerationSettings;
use crate::router::RouterConfig;
use crate::task::CollectOptions;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub collect: CollectOptions,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.generation.validate()?;
        if self.client.model.trim().is_empty() {
            return Err("client.model must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "imagegen.manager=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Relay service the HTTP generator talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Relay root; `/api/image/generate` is appended.
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_ms() -> u64 {
    120_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            model: default_model(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
[generation]
concurrency = 4
backoff = "exponential"

[client]
base_url = "http://relay.local"

[router]
debounce_ms = 50
"#,
        )
        .unwrap();

        assert_eq!(cfg.generation.concurrency, 4);
        assert_eq!(cfg.generation.max_retries, 2);
        assert_eq!(cfg.client.base_url, "http://relay.local");
        assert_eq!(cfg.client.model, "jimeng");
        assert_eq!(cfg.router.debounce_ms, 50);
        assert!(cfg.collect.skip_filled_interactive);
        assert!(cfg.logging.console);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let cfg: AppConfig = toml::from_str("[generation]\nconcurrency = 0\n").unwrap();
        assert!(cfg.validate().is_err());
    }
}
