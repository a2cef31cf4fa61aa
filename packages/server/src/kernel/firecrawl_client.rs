//! Firecrawl client implementation of BaseWebScraper.
//!
//! Talks to the Firecrawl REST API and asks for markdown output, which is
//! what the summarization step wants to read.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BaseWebScraper, ScrapeError, ScrapeResult};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Firecrawl-backed scraper.
///
/// Firecrawl handles JavaScript rendering and anti-bot protection and hands
/// back page content already converted to markdown.
pub struct FirecrawlClient {
    client: Client,
    api_key: String,
    base_url: String,
}

// Request/Response types for the Firecrawl API

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
}

impl FirecrawlClient {
    /// Create a new Firecrawl client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ScrapeError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: FIRECRAWL_API_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn classify_transport(url: &str, err: reqwest::Error) -> ScrapeError {
        if err.is_timeout() {
            ScrapeError::Timeout {
                url: url.to_string(),
            }
        } else {
            ScrapeError::Http(err.to_string())
        }
    }
}

#[async_trait]
impl BaseWebScraper for FirecrawlClient {
    async fn scrape(&self, url: &str) -> Result<ScrapeResult, ScrapeError> {
        let response = self
            .client
            .post(format!("{}/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ScrapeRequest {
                url: url.to_string(),
                formats: vec!["markdown".to_string()],
            })
            .send()
            .await
            .map_err(|e| Self::classify_transport(url, e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ScrapeError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ScrapeError::Http(e.to_string()))?;

        if !body.success {
            return Err(ScrapeError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            });
        }

        let data = body.data.ok_or(ScrapeError::NoContent)?;
        let markdown = data
            .markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or(ScrapeError::NoContent)?;

        Ok(ScrapeResult {
            url: url.to_string(),
            markdown,
            title: data.metadata.and_then(|m| m.title),
        })
    }
}
