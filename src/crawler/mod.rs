//! Crawler module for mirroring a site into the content store
//!
//! This module contains the crawl engine, including:
//! - HTTP fetching
//! - HTML parsing into links and embedded resources
//! - Request scheduling, politeness and robots.txt exclusion
//! - Resource harvesting and API endpoint extraction
//! - Overall crawl coordination

mod coordinator;
mod endpoints;
mod fetcher;
mod harvester;
mod parser;
mod scheduler;

pub use coordinator::{write_endpoints, Coordinator, CrawlReport};
pub use endpoints::extract_endpoints;
pub use fetcher::{build_http_client, fetch_url, is_html, is_textual, FetchResult};
pub use harvester::beautify_body;
pub use parser::{parse_page, resolve_link, ParsedPage};
pub use scheduler::{CrawlTask, FetchPermit, Frontier, Scheduler};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for the crawl stage. It will:
/// 1. Open the index and start a run
/// 2. Create the content root
/// 3. Crawl from the seed until the frontier drains
/// 4. Write the endpoint list
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `config_hash` - Hash of the configuration file
pub async fn crawl(config: Config, config_hash: &str) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash)?;
    coordinator.run().await
}
