//! Server configuration

use anyhow::Result;
use hirewise_lib::EngineConfig;
use serde::Deserialize;
use tracing::warn;

/// Server configuration
///
/// Read from an optional `hirewise.toml` and `HIREWISE_*` variables, with
/// `__` separating nested keys (`HIREWISE_ENGINE__DATA_DIR=/var/lib/hirewise`).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in logs
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Largest accepted upload body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "hirewise".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            max_upload_bytes: default_max_upload_bytes(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("hirewise").required(false))
            .add_source(config::Environment::with_prefix("HIREWISE").separator("__"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid configuration, using defaults");
            ServerConfig::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.engine.leaderboard_size, 10);
    }

    #[test]
    fn test_nested_engine_settings_deserialize() {
        let config: ServerConfig = config::Config::builder()
            .set_override("api_port", 9000i64)
            .unwrap()
            .set_override("engine.training.min_training_samples", 25i64)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.engine.training.min_training_samples, 25);
        assert_eq!(config.engine.training.n_estimators, 100);
    }
}
