// TestDependencies - mock implementations for testing
//
// Provides mock providers that can be injected into ServerDeps for tests.
// Responses are scripted in order; when the script runs out the mock falls
// back to a benign default so unrelated tests stay short.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    BaseSummarizer, BaseWebScraper, ContentBlock, ScrapeError, ScrapeResult, SummarizeError,
};

// =============================================================================
// Mock Web Scraper
// =============================================================================

pub struct MockWebScraper {
    responses: Arc<Mutex<Vec<Result<ScrapeResult, ScrapeError>>>>,
    scrape_calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockWebScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWebScraper {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            scrape_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful page with the given markdown.
    pub fn with_page(self, markdown: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(ScrapeResult {
            url: "https://example.com".to_string(),
            markdown: markdown.to_string(),
            title: Some("Test Page".to_string()),
        }));
        self
    }

    /// Queue a scrape failure.
    pub fn with_error(self, error: ScrapeError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    /// Get all URLs that were scraped.
    pub fn scrape_calls(&self) -> Vec<String> {
        self.scrape_calls.lock().unwrap().clone()
    }

    /// Check if a URL was scraped.
    pub fn was_scraped(&self, url: &str) -> bool {
        self.scrape_calls.lock().unwrap().iter().any(|u| u == url)
    }
}

#[async_trait]
impl BaseWebScraper for MockWebScraper {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        // Record the call
        self.scrape_calls.lock().unwrap().push(url.to_string());

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            responses.remove(0)
        } else {
            Ok(ScrapeResult {
                url: url.to_string(),
                markdown: "# Mock Content\n\nThis is mock scraped content.".to_string(),
                title: Some("Mock Page".to_string()),
            })
        }
    }
}

// =============================================================================
// Mock Summarizer
// =============================================================================

pub struct MockSummarizer {
    responses: Arc<Mutex<Vec<Result<Vec<ContentBlock>, SummarizeError>>>>,
    summarize_calls: Arc<Mutex<Vec<String>>>,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            summarize_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful response with the given blocks.
    pub fn with_blocks(self, blocks: Vec<ContentBlock>) -> Self {
        self.responses.lock().unwrap().push(Ok(blocks));
        self
    }

    /// Queue a single text block response.
    pub fn with_summary(self, text: &str) -> Self {
        self.with_blocks(vec![ContentBlock::text(text)])
    }

    /// Queue a summarize failure.
    pub fn with_error(self, error: SummarizeError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    /// Get the content passed to each summarize call.
    pub fn summarize_calls(&self) -> Vec<String> {
        self.summarize_calls.lock().unwrap().clone()
    }

    /// Number of times summarize was invoked.
    pub fn call_count(&self) -> usize {
        self.summarize_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseSummarizer for MockSummarizer {
    async fn summarize(&self, content: &str) -> Result<Vec<ContentBlock>, SummarizeError> {
        // Record the call
        self.summarize_calls
            .lock()
            .unwrap()
            .push(content.to_string());

        let mut responses = self.responses.lock().unwrap();
        if !responses.is_empty() {
            responses.remove(0)
        } else {
            Ok(vec![ContentBlock::text("Mock summary.")])
        }
    }
}
