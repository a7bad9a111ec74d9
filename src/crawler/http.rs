use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};

use super::markdown::{filter_blocks, html_to_markdown};
use super::{BrowserConfig, CrawlError, CrawlResult, CrawlerRunConfig, PageCrawler};

/// Static-HTML crawler backed by `reqwest`.
pub struct HttpCrawler {
    client: reqwest::Client,
    verbose: bool,
    cache: Mutex<HashMap<String, CachedPage>>,
}

#[derive(Clone)]
struct CachedPage {
    markdown: String,
    status_code: u16,
}

impl HttpCrawler {
    /// Build a crawler sending `browser.user_agent` with browser-like accept headers.
    pub fn new(browser: &BrowserConfig) -> Result<Self, CrawlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(browser.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            verbose: browser.verbose,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cached(&self, url: &str) -> Option<CachedPage> {
        self.cache.lock().ok()?.get(url).cloned()
    }

    fn store(&self, url: &str, page: CachedPage) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url.to_string(), page);
        }
    }

    async fn fetch(
        &self,
        url: &str,
        run_config: &CrawlerRunConfig,
    ) -> Result<CachedPage, CrawlResult> {
        let response = self
            .client
            .get(url)
            .timeout(run_config.page_timeout)
            .send()
            .await
            .map_err(|error| CrawlResult::failure(url, None, format!("request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlResult::failure(
                url,
                Some(status.as_u16()),
                format!("HTTP {status} from {url}"),
            ));
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_none_or(|value| value.contains("html"));
        let body = response.text().await.map_err(|error| {
            CrawlResult::failure(
                url,
                Some(status.as_u16()),
                format!("failed to read body: {error}"),
            )
        })?;

        let rendered = if is_html { html_to_markdown(&body) } else { body };
        Ok(CachedPage {
            markdown: filter_blocks(&rendered, run_config.word_count_threshold),
            status_code: status.as_u16(),
        })
    }
}

#[async_trait]
impl PageCrawler for HttpCrawler {
    async fn crawl(&self, url: &str, run_config: &CrawlerRunConfig) -> CrawlResult {
        let mode = run_config.cache_mode;
        let page = match mode.should_read().then(|| self.cached(url)).flatten() {
            Some(page) => {
                tracing::debug!(url, "Serving page from cache");
                page
            }
            None => match self.fetch(url, run_config).await {
                Ok(page) => {
                    if mode.should_write() {
                        self.store(url, page.clone());
                    }
                    page
                }
                Err(failure) => {
                    tracing::warn!(
                        url,
                        status = ?failure.status_code,
                        error = ?failure.error_message,
                        "Crawl failed"
                    );
                    return failure;
                }
            },
        };

        if self.verbose {
            tracing::info!(
                url,
                status = page.status_code,
                chars = page.markdown.len(),
                "Crawled page"
            );
        } else {
            tracing::debug!(
                url,
                status = page.status_code,
                chars = page.markdown.len(),
                "Crawled page"
            );
        }

        let extracted_content = match &run_config.extraction_strategy {
            Some(strategy) => Some(strategy.run(url, &page.markdown).await),
            None => None,
        };

        CrawlResult {
            url: url.to_string(),
            success: true,
            markdown: page.markdown,
            extracted_content,
            error_message: None,
            status_code: Some(page.status_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CacheMode, ExtractionStrategy};
    use httpmock::{Method::GET, MockServer};
    use std::sync::Arc;

    const PAGE: &str = "<html><body><h2>Ask HN: Who is hiring?</h2>\
        <p>Acme Corp | Rust engineer | NYC | Onsite</p><p>ok</p></body></html>";

    fn crawler() -> HttpCrawler {
        HttpCrawler::new(&BrowserConfig::default()).expect("crawler")
    }

    struct EchoStrategy;

    #[async_trait]
    impl ExtractionStrategy for EchoStrategy {
        async fn run(&self, url: &str, content: &str) -> String {
            serde_json::json!([{ "url": url, "words": content.split_whitespace().count() }])
                .to_string()
        }
    }

    #[tokio::test]
    async fn renders_page_and_filters_short_blocks() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jobs");
                then.status(200).header("content-type", "text/html").body(PAGE);
            })
            .await;

        let run = CrawlerRunConfig::default().word_count_threshold(3);
        let result = crawler().crawl(&server.url("/jobs"), &run).await;

        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert!(result.markdown.contains("Who is hiring?"));
        assert!(result.markdown.contains("Acme Corp"));
        assert!(!result.markdown.contains("ok"));
        assert!(result.extracted_content.is_none());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(503);
            })
            .await;

        let result = crawler()
            .crawl(&server.url("/missing"), &CrawlerRunConfig::default())
            .await;

        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        assert!(result.error_message.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn bypass_refetches_while_enabled_uses_cache() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/jobs");
                then.status(200).header("content-type", "text/html").body(PAGE);
            })
            .await;
        let crawler = crawler();
        let url = server.url("/jobs");

        let enabled = CrawlerRunConfig::default();
        crawler.crawl(&url, &enabled).await;
        crawler.crawl(&url, &enabled).await;
        mock.assert_hits(1);

        crawler
            .crawl(&url, &enabled.clone().cache_mode(CacheMode::Bypass))
            .await;
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn strategy_output_becomes_extracted_content() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jobs");
                then.status(200).header("content-type", "text/plain").body("Acme hiring now");
            })
            .await;

        let run = CrawlerRunConfig::default().extraction_strategy(Arc::new(EchoStrategy));
        let result = crawler().crawl(&server.url("/jobs"), &run).await;

        let extracted: serde_json::Value =
            serde_json::from_str(&result.extracted_content.expect("content")).expect("json");
        assert_eq!(extracted[0]["words"], 3);
    }
}
