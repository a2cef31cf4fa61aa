//! Anthropic client implementation of BaseSummarizer.
//!
//! A minimal Messages API client: one system prompt, one user turn, content
//! blocks back. The caller decides what to do with non-text blocks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BaseSummarizer, ContentBlock, SummarizeError};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes websites \
and provides a summary of the content. In one paragraph, provide a summary of the \
content of the website. In another paragraph, provide a list of the most important \
links on the website.";

/// Anthropic Messages API client.
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

// Request/Response types for the Messages API

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicClient {
    /// Create a new Anthropic client for the given model.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SummarizeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| SummarizeError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            model: model.into(),
        })
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl BaseSummarizer for AnthropicClient {
    async fn summarize(&self, content: &str) -> Result<Vec<ContentBlock>, SummarizeError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SUMMARY_SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| SummarizeError::Http(e.to_string()))?;

        let status = response.status();
        // 529 is Anthropic's "overloaded" answer; treat it like a rate limit
        if status.as_u16() == 429 || status.as_u16() == 529 {
            return Err(SummarizeError::RateLimited);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .map(|detail| detail.message)
                .unwrap_or_else(|| "summarize request rejected".to_string());
            return Err(SummarizeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;

        if body.content.is_empty() {
            return Err(SummarizeError::InvalidResponse(
                "response carried no content blocks".to_string(),
            ));
        }

        Ok(body.content)
    }
}
