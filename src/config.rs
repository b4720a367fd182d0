use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::pipeline::DEFAULT_MAX_ATTEMPTS;

/// Main configuration structure for tabletalk.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TabletalkConfig {
    /// Pipeline routing settings
    pub pipeline: PipelineConfig,
    /// Model backend settings
    pub model: ModelConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bound on the execution/repair retry cycle
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token budget
    pub num_predict: u32,
    /// Per-request timeout
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection string
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level directive when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON-formatted log lines
    pub json_logs: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            temperature: 0.1,
            num_predict: 1024,
            request_timeout_seconds: 120,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ecommerce.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TabletalkConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (tabletalk.toml, or an explicit path)
    /// 3. Environment variables (prefixed with TABLETALK__)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(explicit) => {
                builder = builder.add_source(File::from(explicit));
            }
            None => {
                if Path::new("tabletalk.toml").exists() {
                    builder = builder.add_source(File::with_name("tabletalk"));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("TABLETALK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load .env file if it exists.
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_baseline() {
        let config = TabletalkConfig::default();
        assert_eq!(config.pipeline.max_attempts, 3);
        assert_eq!(config.model.base_url, "http://localhost:11434");
        assert_eq!(config.database.url, "sqlite://ecommerce.db");
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tabletalk.toml");
        std::fs::write(
            &path,
            "[pipeline]\nmax_attempts = 5\n\n[database]\nurl = \"sqlite://other.db\"\n",
        )
        .expect("write config");

        let config = TabletalkConfig::load(Some(&path)).expect("load");
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.database.url, "sqlite://other.db");
        // untouched sections keep their defaults
        assert_eq!(config.model.model, "qwen2.5-coder:7b");
    }
}
