#![deny(missing_docs)]

//! Crawl "Who is hiring" pages, extract job postings with an LLM, and prepare them for embedding.

/// Environment and LLM-provider configuration.
pub mod config;
/// Page fetching and markdown rendering.
pub mod crawler;
/// LLM-backed structured extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Job-record filtering, cleaning, and document assembly.
pub mod processing;
/// Record schemas handed to the extraction model.
pub mod schema;
