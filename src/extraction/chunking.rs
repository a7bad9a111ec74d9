//! Splitting crawled markdown into LLM-sized chunks.
//!
//! Pages such as a monthly hiring thread easily exceed a model's context window, so the
//! extraction strategy sends one chunk per request. Chunk boundaries come from `semchunk-rs`;
//! token counts come from `tiktoken-rs` when the model has a known encoding and from a
//! whitespace counter otherwise (typical for Ollama models). Adjacent chunks can share a small
//! token overlap so that a posting cut in half is still seen whole by one of the two requests.

use crate::config::{ProviderKind, ProviderSpec};
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};

/// Token counting function shared between the chunker and the overlap pass.
pub(crate) type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Default per-request token budget.
pub const DEFAULT_CHUNK_TOKEN_THRESHOLD: usize = 2048;
/// Default fraction of the budget repeated from the previous chunk.
pub const DEFAULT_OVERLAP_RATE: f32 = 0.1;

/// Errors produced while splitting content for extraction.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Extraction configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Split `text` into chunks of at most `chunk_size` tokens for `provider`.
///
/// `overlap_rate` is the share of `chunk_size` carried over from the end of the previous chunk.
/// Whitespace-only input yields no chunks.
pub fn chunk_for_extraction(
    text: &str,
    chunk_size: usize,
    overlap_rate: f32,
    provider: &ProviderSpec,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let counter = build_token_counter(provider)?;
    let overlap = (chunk_size as f32 * overlap_rate.clamp(0.0, 0.5)) as usize;
    Ok(chunk_with_counter(text, chunk_size, overlap, counter))
}

fn build_token_counter(provider: &ProviderSpec) -> Result<TokenCounter, ChunkingError> {
    match provider.kind {
        ProviderKind::OpenAI => tiktoken_counter(&provider.model),
        ProviderKind::Ollama => match get_bpe_from_model(&provider.model) {
            Ok(encoding) => Ok(counter_from_encoding(encoding)),
            Err(_) => {
                tracing::debug!(
                    model = %provider.model,
                    "No tiktoken encoding for Ollama model; counting whitespace tokens"
                );
                Ok(whitespace_counter())
            }
        },
    }
}

fn tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let encoding = match get_bpe_from_model(model) {
        Ok(encoding) => encoding,
        Err(lookup_error) => {
            tracing::debug!(model, error = %lookup_error, "Unknown OpenAI model; using o200k_base");
            let fallback = if model.starts_with("gpt-3.5") || model.starts_with("gpt-4-") {
                cl100k_base()
            } else {
                o200k_base()
            };
            fallback.map_err(|source| ChunkingError::Tokenizer {
                model: model.to_string(),
                source,
            })?
        }
    };
    Ok(counter_from_encoding(encoding))
}

fn counter_from_encoding(encoding: CoreBPE) -> TokenCounter {
    let encoding = Arc::new(encoding);
    Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
}

pub(crate) fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| match segment.split_whitespace().count() {
        0 if !segment.is_empty() => 1,
        count => count,
    })
}

pub(crate) fn chunk_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: TokenCounter,
) -> Vec<String> {
    let chunker_counter = counter.clone();
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| chunker_counter.as_ref()(segment)),
    );
    let chunks = chunker.chunk(text);

    let overlap = overlap.min(chunk_size.saturating_sub(1));
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut result = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for chunk in chunks {
        let combined = match previous.as_deref() {
            Some(prev) => {
                let tail = suffix_within_budget(prev, overlap, &counter);
                let joined = if tail.is_empty() {
                    chunk.clone()
                } else {
                    format!("{} {}", tail.trim_end(), chunk.trim_start())
                };
                match suffix_within_budget(&joined, chunk_size, &counter) {
                    "" => chunk.clone(),
                    fitted => fitted.to_string(),
                }
            }
            None => chunk.clone(),
        };
        result.push(combined);
        previous = Some(chunk);
    }
    result
}

/// Longest word-aligned suffix of `text` whose token count fits in `budget`.
fn suffix_within_budget<'a>(text: &'a str, budget: usize, counter: &TokenCounter) -> &'a str {
    if budget == 0 {
        return "";
    }
    text.char_indices()
        .filter(|(offset, ch)| *offset == 0 || ch.is_whitespace())
        .map(|(offset, _)| text[offset..].trim_start())
        .find(|candidate| counter.as_ref()(candidate) <= budget)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama(model: &str) -> ProviderSpec {
        ProviderSpec {
            kind: ProviderKind::Ollama,
            model: model.into(),
        }
    }

    #[test]
    fn splits_by_whitespace_budget() {
        let chunks = chunk_with_counter("one two three four five", 2, 0, whitespace_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let counter = whitespace_counter();
        let chunks = chunk_with_counter("one two three four five", 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two three", "three four five"]);
        assert!(chunks.iter().all(|chunk| counter.as_ref()(chunk) <= 3));
    }

    #[test]
    fn blank_input_has_no_chunks() {
        let chunks = chunk_for_extraction("  \n ", 16, 0.1, &ollama("llama3.2")).expect("chunks");
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let error = chunk_for_extraction("text", 0, 0.1, &ollama("llama3.2")).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn openai_chunks_respect_tiktoken_budget() {
        let provider = ProviderSpec {
            kind: ProviderKind::OpenAI,
            model: "gpt-4o-mini".into(),
        };
        let text = "Acme | Rust engineer | Remote. We build search infrastructure in Rust and Go.";
        let chunks = chunk_for_extraction(text, 8, 0.0, &provider).expect("chunks");
        let counter = tiktoken_counter("gpt-4o-mini").expect("counter");
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| counter.as_ref()(chunk) <= 8));
    }
}
