use std::sync::Arc;

use anyhow::Result;

use imagegen_core::api::{AppConfig, ImageGenerator};

use crate::generator::HttpImageGenerator;

pub fn build_generator(cfg: &AppConfig) -> Result<Arc<dyn ImageGenerator>> {
    if cfg.client.base_url.trim().is_empty() {
        tracing::warn!(
            target: "imagegen.client",
            stage = "client.config.missing_base_url",
            "relay base url is empty; every generation will fail"
        );
    }
    Ok(Arc::new(HttpImageGenerator::new(
        &cfg.client.base_url,
        cfg.client.timeout_ms,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_generator_from_config() {
        let mut cfg = AppConfig::default();
        cfg.client.base_url = "http://relay.test".to_string();
        let generator = build_generator(&cfg).unwrap();
        assert_eq!(generator.name(), "http-relay");
    }
}
