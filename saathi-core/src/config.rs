use config::{Config, File};
use serde::Deserialize;

use crate::error::SaathiError;

#[derive(Debug, Deserialize, Clone)]
pub struct SaathiConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Empty means no Postgres: activities are kept in memory.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    pub base_url: String,
    /// Upper bound on a single generateContent call, enforced by the agent runner.
    pub request_timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "GEMINI_API_KEY".to_string(),
            model: "gemini-1.5-pro-latest".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            request_timeout_seconds: 60,
        }
    }
}

impl GeminiConfig {
    /// Read the raw API key from the configured environment variable.
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    /// Program spawned for worksheet evaluation.
    pub program: String,
    /// Arguments placed before the JSON payload argument.
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_seconds: u64,
    /// Maximum characters of child output echoed back in error details.
    pub diagnostic_chars: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            program: "saathi-evaluate".to_string(),
            args: Vec::new(),
            timeout_seconds: 120,
            diagnostic_chars: 500,
        }
    }
}

impl SaathiConfig {
    pub fn load(path: &str) -> Result<Self, SaathiError> {
        Config::builder()
            .add_source(File::with_name(path))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|source| SaathiError::Config {
                path: path.to_string(),
                source,
            })
    }
}
