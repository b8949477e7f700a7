use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffKind {
    /// Wait `retry_delay_ms` before every attempt.
    #[default]
    Fixed,
    /// Double the delay on every attempt, capped at `max_retry_delay_ms`.
    Exponential,
}

/// Runtime knobs read by the manager at every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Maximum in-flight generation calls (batch size).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_enable_cache")]
    pub enable_cache: bool,

    #[serde(default)]
    pub backoff: BackoffKind,

    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Drop results of tasks dispatched before the last `clear_queue`.
    #[serde(default = "default_cancel_on_clear")]
    pub cancel_on_clear: bool,
}

fn default_concurrency() -> usize {
    2
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_enable_cache() -> bool {
    true
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_cancel_on_clear() -> bool {
    true
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            enable_cache: default_enable_cache(),
            backoff: BackoffKind::default(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            cancel_on_clear: default_cancel_on_clear(),
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be at least 1".to_string());
        }
        Ok(())
    }

    /// Apply a partial update; fields left `None` keep their value.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            concurrency: patch.concurrency.unwrap_or(self.concurrency),
            max_retries: patch.max_retries.unwrap_or(self.max_retries),
            retry_delay_ms: patch.retry_delay_ms.unwrap_or(self.retry_delay_ms),
            enable_cache: patch.enable_cache.unwrap_or(self.enable_cache),
            backoff: patch.backoff.unwrap_or(self.backoff),
            max_retry_delay_ms: patch.max_retry_delay_ms.unwrap_or(self.max_retry_delay_ms),
            cancel_on_clear: patch.cancel_on_clear.unwrap_or(self.cancel_on_clear),
        }
    }
}

/// Partial settings update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub enable_cache: Option<bool>,
    #[serde(default)]
    pub backoff: Option<BackoffKind>,
    #[serde(default)]
    pub max_retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub cancel_on_clear: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let settings: GenerationSettings = toml::from_str("").unwrap();
        assert_eq!(settings, GenerationSettings::default());
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.retry_delay_ms, 1000);
        assert!(settings.enable_cache);
        assert!(settings.cancel_on_clear);
    }

    #[test]
    fn test_merged_keeps_unset_fields() {
        let base = GenerationSettings::default();
        let merged = base.merged(&SettingsPatch {
            concurrency: Some(4),
            backoff: Some(BackoffKind::Exponential),
            ..SettingsPatch::default()
        });
        assert_eq!(merged.concurrency, 4);
        assert_eq!(merged.backoff, BackoffKind::Exponential);
        assert_eq!(merged.max_retries, base.max_retries);
        assert_eq!(merged.retry_delay_ms, base.retry_delay_ms);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let settings = GenerationSettings {
            concurrency: 0,
            ..GenerationSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
