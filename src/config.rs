use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_s: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_s: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabasesConfig {
    pub hr_path: String,
    pub sales_path: String,
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            hr_path: "./data/hr.db".to_string(),
            sales_path: "./data/sales.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_rounds: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { max_rounds: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: String,
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_path: "./data/guardian.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub llm: LlmConfig,
    pub databases: DatabasesConfig,
    pub workflow: WorkflowConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load config from a YAML file; a missing file yields defaults.
    /// A handful of env vars override for container deployments.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("parse config {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_default() -> Result<Self> {
        let path =
            std::env::var("GUARDIAN_CONFIG").unwrap_or_else(|_| "guardian.yaml".to_string());
        Self::load(path)
    }

    fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("GUARDIAN_HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = std::env::var("GUARDIAN_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(key) = std::env::var("GUARDIAN_LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("GUARDIAN_LLM_BASE_URL") {
            if !url.is_empty() {
                self.llm.base_url = url;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.workflow.max_rounds, 8);
        assert_eq!(config.storage.backend, "sqlite");
        assert_eq!(config.databases.hr_path, "./data/hr.db");
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let raw = "server:\n  port: 9100\nworkflow:\n  max_rounds: 3\n";
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.workflow.max_rounds, 3);
        assert_eq!(config.llm.timeout_s, 60);
    }
}
