use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ExtractionClient, ExtractionClientError, ExtractionRequest, http_client};

const SYSTEM_PROMPT: &str =
    "You extract structured records from web page content. Reply with JSON only.";

/// Client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiExtractionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiExtractionClient {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// Requests are sent without an `Authorization` header when `api_key` is `None`, which
    /// suits local OpenAI-compatible servers.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ExtractionClientError> {
        Ok(Self {
            http: http_client("whoishiring/extract")?,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[async_trait]
impl ExtractionClient for OpenAiExtractionClient {
    async fn complete(&self, request: ExtractionRequest) -> Result<String, ExtractionClientError> {
        let body = ChatRequest {
            model: &request.model,
            temperature: request.params.temperature,
            top_p: request.params.top_p,
            max_tokens: request.params.max_tokens,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        let mut builder = self.http.post(self.endpoint()).json(&body);
        if let Some(key) = self.api_key.as_deref() {
            builder = builder.bearer_auth(key.trim());
        }

        let response = builder.send().await.map_err(|error| {
            ExtractionClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ExtractionClientError::ProviderUnavailable(format!(
                "endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ExtractionClientError::GenerationFailed(format!(
                "OpenAI returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|error| {
            ExtractionClientError::InvalidResponse(format!(
                "failed to decode chat completion: {error}"
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| {
                ExtractionClientError::InvalidResponse("chat completion had no content".into())
            })
    }
}
