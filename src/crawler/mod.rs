//! Page crawling: fetch a URL, render it as markdown, and optionally run an extraction strategy.
//!
//! [`PageCrawler`] is the seam between the pipeline and whatever fetches pages. The shipped
//! implementation, [`HttpCrawler`], fetches static HTML over HTTP and does not execute scripts.

mod http;
pub mod markdown;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, DEFAULT_USER_AGENT};

pub use http::HttpCrawler;

/// Errors raised while setting up a crawler.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How the crawler's page cache is consulted for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Read cached pages and store fresh ones.
    #[default]
    Enabled,
    /// Never touch the cache.
    Disabled,
    /// Serve from cache but never store.
    ReadOnly,
    /// Store fetched pages but never serve from cache.
    WriteOnly,
    /// Skip the cache for this run only.
    Bypass,
}

impl CacheMode {
    /// Whether a cached page may satisfy the request.
    pub fn should_read(self) -> bool {
        matches!(self, CacheMode::Enabled | CacheMode::ReadOnly)
    }

    /// Whether a freshly fetched page should be stored.
    pub fn should_write(self) -> bool {
        matches!(self, CacheMode::Enabled | CacheMode::WriteOnly)
    }
}

/// Session-wide crawler settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// User agent sent with every request.
    pub user_agent: String,
    /// Log each fetch at info rather than debug level.
    pub verbose: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verbose: false,
        }
    }
}

impl BrowserConfig {
    /// Settings derived from the loaded configuration.
    pub fn from_config(config: &Config, verbose: bool) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            verbose,
        }
    }
}

/// Turns page content into a JSON array string of extracted blocks.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Extract blocks from `content`, which was fetched from `url`.
    async fn run(&self, url: &str, content: &str) -> String;
}

/// Per-crawl settings.
#[derive(Clone)]
pub struct CrawlerRunConfig {
    /// Cache policy for this crawl.
    pub cache_mode: CacheMode,
    /// Minimum words for a non-heading markdown block to be kept.
    pub word_count_threshold: usize,
    /// Upper bound on the page fetch.
    pub page_timeout: Duration,
    /// Strategy run over the rendered markdown, if any.
    pub extraction_strategy: Option<Arc<dyn ExtractionStrategy>>,
}

impl Default for CrawlerRunConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::Enabled,
            word_count_threshold: 1,
            page_timeout: Duration::from_secs(60),
            extraction_strategy: None,
        }
    }
}

impl fmt::Debug for CrawlerRunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlerRunConfig")
            .field("cache_mode", &self.cache_mode)
            .field("word_count_threshold", &self.word_count_threshold)
            .field("page_timeout", &self.page_timeout)
            .field("extraction_strategy", &self.extraction_strategy.is_some())
            .finish()
    }
}

impl CrawlerRunConfig {
    /// Settings used for job listing pages: bypass the cache, drop short blocks, allow slow pages.
    pub fn for_jobs(config: &Config) -> Self {
        Self::default()
            .cache_mode(CacheMode::Bypass)
            .word_count_threshold(config.word_count_threshold)
            .page_timeout(config.page_timeout)
    }

    /// Set the cache policy.
    pub fn cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// Set the minimum block word count.
    pub fn word_count_threshold(mut self, threshold: usize) -> Self {
        self.word_count_threshold = threshold;
        self
    }

    /// Set the fetch timeout.
    pub fn page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Attach an extraction strategy.
    pub fn extraction_strategy(mut self, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        self.extraction_strategy = Some(strategy);
        self
    }
}

/// Outcome of crawling one URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlResult {
    /// URL that was requested.
    pub url: String,
    /// Whether the page was fetched.
    pub success: bool,
    /// Rendered page content.
    pub markdown: String,
    /// Strategy output (a JSON array string) when a strategy was attached.
    pub extracted_content: Option<String>,
    /// Failure description when `success` is false.
    pub error_message: Option<String>,
    /// HTTP status, when a response was received.
    pub status_code: Option<u16>,
}

impl CrawlResult {
    pub(crate) fn failure(url: &str, status_code: Option<u16>, message: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            error_message: Some(message),
            status_code,
            ..Self::default()
        }
    }
}

/// Something that can crawl a URL.
#[async_trait]
pub trait PageCrawler: Send + Sync {
    /// Crawl `url` with `run_config`; failures are reported in the result.
    async fn crawl(&self, url: &str, run_config: &CrawlerRunConfig) -> CrawlResult;
}
