//! Structured extraction: turning crawled markdown into JSON records with an LLM.
//!
//! Providers sit behind [`ExtractionClient`], which accepts a fully assembled prompt and returns
//! the model's raw reply. [`LlmExtractionStrategy`] owns everything above that seam: chunking the
//! page, building prompts, parsing replies into records, and marking failed chunks.

pub mod chunking;
mod ollama;
mod openai;
mod strategy;
mod task;

use crate::config::{GenerationParams, LlmExtractionConfig, ProviderKind, ProviderSpec};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use chunking::ChunkingError;
pub use ollama::OllamaExtractionClient;
pub use openai::OpenAiExtractionClient;
pub use strategy::LlmExtractionStrategy;
pub use task::ExtractionTask;

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Errors surfaced by extraction providers.
#[derive(Debug, Error)]
pub enum ExtractionClientError {
    /// Provider could not be reached or is not serving the expected endpoint.
    #[error("Extraction provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate extraction: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// One prompt sent to a provider.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Model name understood by the provider.
    pub model: String,
    /// Fully assembled prompt.
    pub prompt: String,
    /// Sampling parameters.
    pub params: GenerationParams,
}

/// Interface implemented by LLM providers used for extraction.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Return the model's textual reply to `request`.
    async fn complete(&self, request: ExtractionRequest) -> Result<String, ExtractionClientError>;
}

/// Build the client matching `settings.provider`.
///
/// Base URLs resolve from the settings first, then `OPENAI_BASE_URL` / `OLLAMA_URL`, then the
/// public defaults.
pub fn build_extraction_client(
    spec: &ProviderSpec,
    settings: &LlmExtractionConfig,
) -> Result<Arc<dyn ExtractionClient>, ExtractionClientError> {
    let base_url = |variable: &str, default: &str| {
        settings
            .base_url
            .clone()
            .or_else(|| crate::config::load_env_optional(variable))
            .unwrap_or_else(|| default.to_string())
    };

    let client: Arc<dyn ExtractionClient> = match spec.kind {
        ProviderKind::OpenAI => Arc::new(OpenAiExtractionClient::new(
            base_url("OPENAI_BASE_URL", DEFAULT_OPENAI_URL),
            settings.resolved_api_token(),
        )?),
        ProviderKind::Ollama => Arc::new(OllamaExtractionClient::new(base_url(
            "OLLAMA_URL",
            DEFAULT_OLLAMA_URL,
        ))?),
    };
    tracing::info!(provider = %settings.provider, model = %spec.model, "Extraction client ready");
    Ok(client)
}

pub(crate) fn http_client(user_agent: &str) -> Result<reqwest::Client, ExtractionClientError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .map_err(|error| {
            ExtractionClientError::ProviderUnavailable(format!(
                "failed to build HTTP client: {error}"
            ))
        })
}
