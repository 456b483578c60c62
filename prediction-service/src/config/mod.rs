use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INSIGHT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub artifacts: ArtifactConfig,
    pub insight: InsightConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Directory holding `<domain>_{model,scaler,feature_columns}.json`.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightConfig {
    /// Absent means the insight endpoint is unconfigured.
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl InsightConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::with_max_retries(self.max_retries)
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: DEFAULT_INSIGHT_TIMEOUT_SECS,
            max_retries: DEFAULT_INSIGHT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// `["*"]` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl PredictionConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        Ok(PredictionConfig {
            common: common_config,
            artifacts: ArtifactConfig {
                dir: PathBuf::from(get_env("ARTIFACT_DIR", Some("model_artifacts"), is_prod)?),
            },
            insight: InsightConfig {
                api_key: get_optional_env("GEMINI_API_KEY").map(Secret::new),
                model: get_env("INSIGHT_MODEL", Some("gemini-2.0-flash"), is_prod)?,
                api_base: get_env(
                    "INSIGHT_API_BASE",
                    Some("https://generativelanguage.googleapis.com/v1beta"),
                    false,
                )?,
                timeout_secs: parse_env(
                    "INSIGHT_TIMEOUT_SECS",
                    DEFAULT_INSIGHT_TIMEOUT_SECS,
                )?,
                max_retries: parse_env("INSIGHT_MAX_RETRIES", DEFAULT_INSIGHT_MAX_RETRIES)?,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&get_env(
                    "CORS_ALLOWED_ORIGINS",
                    Some("*"),
                    false,
                )?),
            },
        })
    }

    /// Configuration for tests: ephemeral port, no insight credential.
    pub fn for_tests(artifact_dir: impl Into<PathBuf>) -> Self {
        PredictionConfig {
            common: core_config::Config {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            artifacts: ArtifactConfig {
                dir: artifact_dir.into(),
            },
            insight: InsightConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
            },
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Unset and empty are both treated as absent.
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
