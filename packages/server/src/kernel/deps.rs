//! Shared dependencies handed to workflow steps and API handlers.

use std::sync::Arc;

use super::{BaseResultStore, BaseSummarizer, BaseWebScraper};

/// The application's infrastructure, behind trait objects so tests can
/// swap in mocks without touching domain code.
pub struct ServerDeps {
    pub scraper: Arc<dyn BaseWebScraper>,
    pub summarizer: Arc<dyn BaseSummarizer>,
    pub results: Arc<dyn BaseResultStore>,
}

impl ServerDeps {
    /// Assemble the dependency bundle.
    pub fn new(
        scraper: Arc<dyn BaseWebScraper>,
        summarizer: Arc<dyn BaseSummarizer>,
        results: Arc<dyn BaseResultStore>,
    ) -> Self {
        Self {
            scraper,
            summarizer,
            results,
        }
    }
}
