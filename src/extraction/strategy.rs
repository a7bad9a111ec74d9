use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::chunking::{DEFAULT_CHUNK_TOKEN_THRESHOLD, DEFAULT_OVERLAP_RATE, chunk_for_extraction};
use super::{ExtractionClient, ExtractionRequest};
use crate::config::{GenerationParams, ProviderSpec};
use crate::crawler::ExtractionStrategy;

/// Chunked, schema-guided extraction over a single LLM provider.
pub struct LlmExtractionStrategy {
    client: Arc<dyn ExtractionClient>,
    provider: ProviderSpec,
    schema: Value,
    instruction: String,
    params: GenerationParams,
    chunk_token_threshold: usize,
    overlap_rate: f32,
}

impl LlmExtractionStrategy {
    /// Create a strategy with the default chunk budget and overlap.
    pub fn new(
        client: Arc<dyn ExtractionClient>,
        provider: ProviderSpec,
        schema: Value,
        instruction: impl Into<String>,
        params: GenerationParams,
    ) -> Self {
        Self {
            client,
            provider,
            schema,
            instruction: instruction.into(),
            params,
            chunk_token_threshold: DEFAULT_CHUNK_TOKEN_THRESHOLD,
            overlap_rate: DEFAULT_OVERLAP_RATE,
        }
    }

    /// Override the per-request token budget and overlap fraction.
    pub fn with_chunking(mut self, chunk_token_threshold: usize, overlap_rate: f32) -> Self {
        self.chunk_token_threshold = chunk_token_threshold;
        self.overlap_rate = overlap_rate;
        self
    }

    /// Extract record blocks from `content`, one provider call per chunk.
    ///
    /// Blocks carry the index of the chunk they came from. A chunk whose call or reply fails
    /// contributes a single error block instead of records, so one bad chunk never discards the
    /// rest of the page.
    pub async fn extract_blocks(&self, url: &str, content: &str) -> Vec<Value> {
        let chunks = match chunk_for_extraction(
            content,
            self.chunk_token_threshold,
            self.overlap_rate,
            &self.provider,
        ) {
            Ok(chunks) => chunks,
            Err(error) => {
                tracing::warn!(%error, "Chunking failed; sending content as a single chunk");
                vec![content.to_string()]
            }
        };
        tracing::info!(url, chunks = chunks.len(), model = %self.provider.model, "Extracting");

        let mut blocks = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let request = ExtractionRequest {
                model: self.provider.model.clone(),
                prompt: build_prompt(url, chunk, &self.instruction, &self.schema),
                params: self.params,
            };
            let outcome = match self.client.complete(request).await {
                Ok(reply) => parse_blocks(&reply),
                Err(error) => Err(error.to_string()),
            };
            match outcome {
                Ok(parsed) => {
                    tracing::debug!(index, blocks = parsed.len(), "Chunk extracted");
                    blocks.extend(parsed.into_iter().map(|block| tag_block(block, index)));
                }
                Err(message) => {
                    tracing::warn!(index, error = %message, "Chunk extraction failed");
                    blocks.push(json!({
                        "index": index,
                        "error": true,
                        "tags": ["error"],
                        "content": message,
                    }));
                }
            }
        }
        blocks
    }
}

#[async_trait]
impl ExtractionStrategy for LlmExtractionStrategy {
    async fn run(&self, url: &str, content: &str) -> String {
        let blocks = self.extract_blocks(url, content).await;
        serde_json::to_string(&blocks).unwrap_or_else(|_| "[]".to_string())
    }
}

fn build_prompt(url: &str, content: &str, instruction: &str, schema: &Value) -> String {
    let schema = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!(
        "Here is the content from the URL: {url}\n\n<url_content>\n{content}\n</url_content>\n\n\
         {instruction}\n\n\
         Extract every matching record and return them as a JSON array whose items follow this \
         schema:\n<schema_block>\n{schema}\n</schema_block>\n\n\
         Return only valid JSON, with no commentary or code fences."
    )
}

/// Interpret a provider reply as a list of record blocks.
fn parse_blocks(reply: &str) -> Result<Vec<Value>, String> {
    let body = strip_code_fence(reply.trim());
    let value = serde_json::from_str::<Value>(body)
        .or_else(|error| {
            json_span(body)
                .and_then(|span| serde_json::from_str(span).ok())
                .ok_or(error)
        })
        .map_err(|error| format!("reply was not valid JSON: {error}"))?;

    Ok(match value {
        Value::Array(items) => items,
        Value::Object(map) if map.len() == 1 && map.values().all(Value::is_array) => map
            .into_iter()
            .find_map(|(_, value)| match value {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        other => vec![other],
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Outermost `[...]` or `{...}` span, for replies with prose around the JSON.
fn json_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn tag_block(block: Value, index: usize) -> Value {
    match block {
        Value::Object(mut map) => {
            map.entry("index").or_insert_with(|| json!(index));
            map.entry("error").or_insert(Value::Bool(false));
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::extraction::ExtractionClientError;
    use std::sync::Mutex;

    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, ExtractionClientError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, ExtractionClientError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ExtractionClient for ScriptedClient {
        async fn complete(
            &self,
            request: ExtractionRequest,
        ) -> Result<String, ExtractionClientError> {
            self.prompts.lock().unwrap().push(request.prompt);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("[]".into()))
        }
    }

    fn strategy(client: Arc<ScriptedClient>) -> LlmExtractionStrategy {
        LlmExtractionStrategy::new(
            client,
            ProviderSpec {
                kind: ProviderKind::Ollama,
                model: "no-such-tokenizer".into(),
            },
            json!({"type": "object"}),
            "Extract jobs",
            GenerationParams::default(),
        )
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let blocks = parse_blocks("```json\n[{\"a\": 1}, {\"a\": 2}]\n```").expect("blocks");
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn object_wrapping_single_array_yields_items() {
        let blocks = parse_blocks(r#"{"jobs": [{"company": "Acme"}]}"#).expect("blocks");
        assert_eq!(blocks, vec![json!({"company": "Acme"})]);
    }

    #[test]
    fn plain_object_is_one_block() {
        let blocks =
            parse_blocks(r#"{"model_name": "gpt-4o", "input_fee": "$2.50"}"#).expect("blocks");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["model_name"], "gpt-4o");
    }

    #[test]
    fn prose_around_json_is_salvaged() {
        let blocks =
            parse_blocks("Sure! Here you go:\n[{\"a\": 1}]\nHope this helps.").expect("blocks");
        assert_eq!(blocks, vec![json!({"a": 1})]);
        assert!(parse_blocks("no json here").is_err());
    }

    #[tokio::test]
    async fn blocks_are_tagged_with_chunk_index() {
        let client = ScriptedClient::new(vec![Ok(r#"[{"job_description": "Rust"}]"#.into())]);
        let strategy = strategy(client.clone());

        let blocks = strategy.extract_blocks("https://example.com", "Acme hiring").await;

        assert_eq!(blocks, vec![json!({"job_description": "Rust", "index": 0, "error": false})]);
        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("https://example.com"));
        assert!(prompts[0].contains("Acme hiring"));
        assert!(prompts[0].contains("Extract jobs"));
    }

    #[tokio::test]
    async fn failed_chunk_becomes_error_block() {
        let client = ScriptedClient::new(vec![
            Ok(r#"[{"job_description": "first"}]"#.into()),
            Err(ExtractionClientError::GenerationFailed("boom".into())),
        ]);
        let strategy = strategy(client).with_chunking(3, 0.0);

        let raw = strategy.run("https://example.com", "one two three four five six").await;
        let blocks: Vec<Value> = serde_json::from_str(&raw).expect("array");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0]["error"], false);
        assert_eq!(blocks[1]["index"], 1);
        assert_eq!(blocks[1]["error"], true);
        assert_eq!(blocks[1]["tags"], json!(["error"]));
        assert!(blocks[1]["content"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn existing_error_flag_is_kept() {
        let client = ScriptedClient::new(vec![Ok(r#"[{"error": true, "content": "x"}]"#.into())]);
        let blocks = strategy(client).extract_blocks("u", "text").await;
        assert_eq!(blocks[0]["error"], true);
    }
}
