// Kernel - infrastructure layer
//
// Provider clients, the result store, and the dependency bundle. Domain code
// sees only the Base* traits; concrete clients are wired in at startup.

pub mod anthropic_client;
pub mod deps;
pub mod firecrawl_client;
pub mod result_store;
pub mod traits;

#[cfg(test)]
pub mod test_dependencies;

pub use anthropic_client::AnthropicClient;
pub use deps::ServerDeps;
pub use firecrawl_client::FirecrawlClient;
pub use result_store::InMemoryResultStore;
pub use traits::{
    BaseResultStore, BaseSummarizer, BaseWebScraper, ContentBlock, ScrapeError, ScrapeResult,
    SummarizeError,
};
