//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: visited set, endpoint set and running counters of one run
//! - `DomainState`: per-host politeness tracking (request spacing, robots crawl delay)

mod crawl_state;
mod domain_state;

// Re-export main types
pub use crawl_state::{CounterSnapshot, CrawlCounters, CrawlState};
pub use domain_state::DomainState;
