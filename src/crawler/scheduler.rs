//! Frontier and fetch admission
//!
//! This module handles:
//! - The FIFO frontier of pending crawl tasks
//! - Global concurrency limiting via a semaphore
//! - Per-host request spacing, raised by robots.txt crawl delays
//! - Robots.txt exclusion for every outbound fetch

use crate::config::CrawlerConfig;
use crate::robots::RobotsCache;
use crate::state::DomainState;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A URL waiting to be crawled as a page
///
/// Created when a link is discovered and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Canonical URL
    pub url: Url,

    /// Link distance from the seed (the seed is depth 0)
    pub depth: u32,
}

/// Pending crawl tasks in discovery order
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<CrawlTask>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: CrawlTask) {
        self.queue.push_back(task);
    }

    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Permission to perform one fetch
///
/// Holds a slot of the global concurrency limit until dropped.
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Scheduler gates every outbound fetch
///
/// The scheduler coordinates:
/// - Global concurrency limits (max in-flight requests)
/// - Per-host spacing (minimum time between requests)
/// - Robots.txt exclusion
pub struct Scheduler {
    /// Global semaphore for limiting concurrent fetches
    global_semaphore: Arc<Semaphore>,

    /// Per-host state tracking
    domain_states: Mutex<HashMap<String, DomainState>>,

    robots: RobotsCache,

    /// Configured politeness delay
    base_delay: Duration,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `robots` - Robots.txt cache consulted before every fetch
    pub fn new(config: &CrawlerConfig, robots: RobotsCache) -> Self {
        Self {
            global_semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests as usize)),
            domain_states: Mutex::new(HashMap::new()),
            robots,
            base_delay: Duration::from_millis(config.politeness_delay_ms),
        }
    }

    /// Waits until the URL may be fetched
    ///
    /// Returns None when robots.txt excludes the URL. Otherwise a global
    /// permit is acquired and the call sleeps until the host's next request
    /// slot; the permit is held for the duration of the fetch.
    pub async fn admit(&self, url: &Url) -> Option<FetchPermit> {
        if !self.robots.is_allowed(url).await {
            tracing::debug!("Excluded by robots.txt: {}", url);
            return None;
        }
        let crawl_delay = self.robots.crawl_delay(url).await;

        let permit = Arc::clone(&self.global_semaphore)
            .acquire_owned()
            .await
            .ok()?;

        let host = url.host_str().unwrap_or_default().to_lowercase();
        let wait = {
            let mut states = self.domain_states.lock().unwrap();
            let state = states.entry(host.clone()).or_insert_with(DomainState::new);
            state.set_crawl_delay(crawl_delay);
            state.reserve(self.base_delay, Instant::now())
        };

        if !wait.is_zero() {
            tracing::trace!("Waiting {:?} before requesting {}", wait, host);
            tokio::time::sleep(wait).await;
        }

        Some(FetchPermit { _permit: permit })
    }

    /// Gets a copy of the state for a specific host
    pub fn domain_state(&self, host: &str) -> Option<DomainState> {
        self.domain_states.lock().unwrap().get(host).cloned()
    }

    /// Total requests admitted across all hosts
    pub fn total_requests(&self) -> u64 {
        self.domain_states
            .lock()
            .unwrap()
            .values()
            .map(|s| s.request_count as u64)
            .sum()
    }
}
