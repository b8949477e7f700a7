use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

pub const ENV_RELAY_URL: &str = "IMAGEGEN_RELAY_URL";
pub const ENV_MODEL: &str = "IMAGEGEN_MODEL";
pub const ENV_CONCURRENCY: &str = "IMAGEGEN_CONCURRENCY";

/// Get the default data directory: ~/.imagegen
pub fn get_imagegen_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".imagegen"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let data_dir = get_imagegen_data_dir()?;
    let mut cfg = load_from(&data_dir.join("config.toml"), Path::new("config.toml"))?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(cfg)
}

/// Read the first config file that exists; defaults when neither does.
pub fn load_from(user_config: &Path, local_config: &Path) -> anyhow::Result<AppConfig> {
    for path in [user_config, local_config] {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            return toml::from_str::<AppConfig>(&s)
                .with_context(|| format!("parse config {}", path.display()));
        }
    }
    Ok(AppConfig::default())
}

pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty(ENV_RELAY_URL) {
        cfg.client.base_url = v;
    }
    if let Some(v) = non_empty(ENV_MODEL) {
        cfg.client.model = v;
    }
    if let Some(v) = non_empty(ENV_CONCURRENCY) {
        cfg.generation.concurrency = v
            .trim()
            .parse()
            .with_context(|| format!("{} must be a positive integer, got '{}'", ENV_CONCURRENCY, v))?;
    }
    Ok(())
}
