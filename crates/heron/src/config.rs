use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use crate::trace::{OtlpHttpExporter, Tracer};

pub const ENV_PREFIX: &str = "HERON";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
    #[error("Failed to set up trace export: {0}")]
    Tracing(#[from] anyhow::Error),
}

/// Environment variable that sets a dotted settings key, e.g. `provider.model`
pub fn to_env_var(field_path: &str) -> String {
    let (section, rest) = field_path.split_once('.').unwrap_or((field_path, ""));
    if rest.is_empty() {
        format!("{}_{}", ENV_PREFIX, section.to_uppercase())
    } else {
        format!(
            "{}_{}__{}",
            ENV_PREFIX,
            section.to_uppercase(),
            rest.replace('.', "__").to_uppercase()
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracingSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub project_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    pub path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSettings {
    /// Stop with an error after this many model round trips; unset means no limit
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    pub tracing: TracingSettings,
    pub data: DataSettings,
    #[serde(default)]
    pub agent: AgentSettings,
}

impl Settings {
    /// Load `.env` (if any), then defaults layered under `HERON_*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load()
    }

    fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Provider defaults
            .set_default("provider.host", OPENAI_HOST)?
            .set_default("provider.model", OPENAI_MODEL)?
            // Tracing defaults, a collector on the local machine
            .set_default("tracing.enabled", true)?
            .set_default("tracing.endpoint", "http://localhost:6006/v1/traces")?
            .set_default("tracing.project_name", "evaluating-agent")?
            // Dataset defaults
            .set_default("data.path", "sales.db")?
            .set_default("data.table", "sales")?;

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            builder = builder.set_default("provider.api_key", api_key)?;
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match config.try_deserialize::<Settings>() {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);
                if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn provider_config(&self) -> Result<OpenAiProviderConfig, ConfigError> {
        let api_key = self
            .provider
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: "OPENAI_API_KEY".to_string(),
            })?;

        Ok(OpenAiProviderConfig {
            host: self.provider.host.clone(),
            api_key,
            model: self.provider.model.clone(),
            temperature: self.provider.temperature,
            max_tokens: self.provider.max_tokens,
        })
    }

    pub fn tracer(&self) -> Result<Tracer, ConfigError> {
        if !self.tracing.enabled {
            return Ok(Tracer::noop());
        }
        let exporter =
            OtlpHttpExporter::new(&self.tracing.endpoint, &self.tracing.project_name)?;
        Ok(Tracer::new(Box::new(exporter)))
    }
}
