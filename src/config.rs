use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LLM_CONFIG_PATH: &str = "extract_llm.yml";
const DEFAULT_JOBS_OUTPUT_PATH: &str = "jobs.json";
const DEFAULT_PAGE_TIMEOUT_MS: u64 = 80_000;
const DEFAULT_WORD_COUNT_THRESHOLD: usize = 30;
/// Desktop Chrome user agent sent with every page request unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const OPENAI_DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const OLLAMA_DEFAULT_MODEL: &str = "ollama/llama3.2";

/// Errors encountered while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// LLM settings did not name a provider.
    #[error("Provider not specified in config")]
    MissingProvider,
    /// Provider string did not match a supported backend.
    #[error("Unsupported provider '{0}'; expected 'openai/<model>' or 'ollama/<model>'")]
    UnsupportedProvider(String),
    /// LLM settings file could not be read or decoded.
    #[error("Failed to load LLM settings from {}: {source}", path.display())]
    Load {
        /// Settings file that was requested.
        path: PathBuf,
        /// Underlying loader error.
        #[source]
        source: ::config::ConfigError,
    },
}

/// Runtime configuration for the crawler CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Page crawled by `crawl` when no URL is passed.
    pub target_url: Option<String>,
    /// Remote job listing page.
    pub target_url_jobs: Option<String>,
    /// Local (or locally mirrored) job listing page.
    pub target_url_jobs_local: Option<String>,
    /// Optional provider override such as `ollama/llama3.2`.
    pub target_model: Option<String>,
    /// YAML file holding LLM extraction settings.
    pub llm_config_path: PathBuf,
    /// Destination for filtered job records.
    pub jobs_output_path: PathBuf,
    /// Upper bound on a single page fetch.
    pub page_timeout: Duration,
    /// Minimum words for a markdown block to be kept.
    pub word_count_threshold: usize,
    /// User agent sent with page requests.
    pub user_agent: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load `.env` (when present) and then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            target_url = ?config.target_url,
            target_url_jobs = ?config.target_url_jobs,
            target_url_jobs_local = ?config.target_url_jobs_local,
            page_timeout_ms = config.page_timeout.as_millis() as u64,
            word_count_threshold = config.word_count_threshold,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let parsed = |key: &str| -> Result<Option<u64>, ConfigError> {
            optional(key)
                .map(|value| {
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
                })
                .transpose()
        };

        Ok(Self {
            target_url: optional("TARGET_URL"),
            target_url_jobs: optional("TARGET_URL_JOBS"),
            target_url_jobs_local: optional("TARGET_URL_JOBS_LOCAL"),
            target_model: optional("TARGET_MODEL"),
            llm_config_path: optional("EXTRACT_LLM_CONFIG")
                .unwrap_or_else(|| DEFAULT_LLM_CONFIG_PATH.to_string())
                .into(),
            jobs_output_path: optional("JOBS_OUTPUT_PATH")
                .unwrap_or_else(|| DEFAULT_JOBS_OUTPUT_PATH.to_string())
                .into(),
            page_timeout: Duration::from_millis(
                parsed("PAGE_TIMEOUT_MS")?.unwrap_or(DEFAULT_PAGE_TIMEOUT_MS),
            ),
            word_count_threshold: parsed("WORD_COUNT_THRESHOLD")?
                .map(|value| value as usize)
                .unwrap_or(DEFAULT_WORD_COUNT_THRESHOLD),
            user_agent: optional("CRAWLER_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        })
    }

    /// Look up one of the target URLs by variable name, failing when it is unset.
    pub fn require_url(&self, variable: &str) -> Result<&str, ConfigError> {
        let value = match variable {
            "TARGET_URL" => &self.target_url,
            "TARGET_URL_JOBS" => &self.target_url_jobs,
            "TARGET_URL_JOBS_LOCAL" => &self.target_url_jobs_local,
            _ => &None,
        };
        value
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable(variable.to_string()))
    }
}

/// Supported structured-extraction backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Hosted OpenAI chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

impl std::str::FromStr for ProviderKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Provider string split into backend and model, e.g. `openai/gpt-4o-mini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Backend handling the request.
    pub kind: ProviderKind,
    /// Model name passed to the backend.
    pub model: String,
}

impl ProviderSpec {
    /// Parse `<kind>/<model>`.
    pub fn parse(provider: &str) -> Result<Self, ConfigError> {
        let unsupported = || ConfigError::UnsupportedProvider(provider.to_string());
        let (kind, model) = provider.trim().split_once('/').ok_or_else(unsupported)?;
        let kind = kind.parse().map_err(|()| unsupported())?;
        let model = model.trim();
        if model.is_empty() {
            return Err(unsupported());
        }
        Ok(Self {
            kind,
            model: model.to_string(),
        })
    }
}

/// Sampling parameters forwarded to the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens generated per request.
    pub max_tokens: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 8000,
            top_p: 0.9,
        }
    }
}

/// Settings for the LLM extraction step.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmExtractionConfig {
    /// Provider string, `<kind>/<model>`.
    pub provider: String,
    /// API token; OpenAI falls back to `OPENAI_API_KEY`.
    pub api_token: Option<String>,
    /// Override for the provider's base URL.
    pub base_url: Option<String>,
    /// Generation parameters.
    pub params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct RawLlmSettings {
    provider: Option<String>,
    api_token: Option<String>,
    base_url: Option<String>,
    #[serde(default)]
    params: GenerationParams,
}

impl LlmExtractionConfig {
    /// Fast hosted preset.
    pub fn openai_fast() -> Self {
        Self {
            provider: OPENAI_DEFAULT_MODEL.into(),
            api_token: None,
            base_url: None,
            params: GenerationParams::default(),
        }
    }

    /// Local Ollama preset; no token required.
    pub fn ollama_local() -> Self {
        Self {
            provider: OLLAMA_DEFAULT_MODEL.into(),
            ..Self::openai_fast()
        }
    }

    /// Load settings from a YAML (or any `config`-supported) file.
    ///
    /// `EXTRACT_LLM__<KEY>` environment variables override file values, e.g.
    /// `EXTRACT_LLM__PARAMS__TEMPERATURE=0.2`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let load_error = |source: ::config::ConfigError| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        };
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(true))
            .add_source(
                ::config::Environment::with_prefix("EXTRACT_LLM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(load_error)?;
        let raw: RawLlmSettings = settings.try_deserialize().map_err(load_error)?;

        let provider = raw
            .provider
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingProvider)?;

        let config = Self {
            provider,
            api_token: raw.api_token.filter(|value| !value.trim().is_empty()),
            base_url: raw.base_url.filter(|value| !value.trim().is_empty()),
            params: raw.params,
        };
        config.provider_spec()?;
        tracing::debug!(%config, "Loaded LLM extraction settings");
        Ok(config)
    }

    /// Replace the provider, e.g. from `TARGET_MODEL`.
    pub fn with_provider(mut self, provider: Option<&str>) -> Self {
        if let Some(provider) = provider.filter(|value| !value.trim().is_empty()) {
            self.provider = provider.trim().to_string();
        }
        self
    }

    /// Parsed provider.
    pub fn provider_spec(&self) -> Result<ProviderSpec, ConfigError> {
        ProviderSpec::parse(&self.provider)
    }

    /// API token, falling back to `OPENAI_API_KEY` for OpenAI providers.
    pub fn resolved_api_token(&self) -> Option<String> {
        self.api_token.clone().or_else(|| {
            match self.provider_spec().map(|spec| spec.kind) {
                Ok(ProviderKind::OpenAI) => load_env_optional("OPENAI_API_KEY"),
                _ => None,
            }
        })
    }

    /// Sampling parameters as the JSON object handed to providers.
    pub fn extra_args(&self) -> serde_json::Value {
        serde_json::json!({
            "temperature": self.params.temperature,
            "top_p": self.params.top_p,
            "max_tokens": self.params.max_tokens,
        })
    }
}

impl fmt::Display for LlmExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LlmExtractionConfig(provider={}, max_tokens={})",
            self.provider, self.params.max_tokens
        )
    }
}

/// Read an environment variable, treating blank values as absent.
pub(crate) fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
