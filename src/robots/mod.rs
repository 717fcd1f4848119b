//! Robots.txt handling module
//!
//! Fetches each origin's robots.txt once per run and answers allow/deny and
//! crawl-delay questions for every outbound request.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use url::Url;

/// Fetches robots.txt for an origin
///
/// Any failure (network error, non-2xx status, unreadable body) yields an
/// allow-all policy. Robots handling never drops a crawl on its own account.
pub async fn fetch_robots(client: &Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            tracing::debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

type PolicySlot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Per-run robots.txt cache keyed by origin
///
/// Each origin gets its own slot. Callers for the same origin wait on that
/// slot's single fetch, while other origins proceed independently.
pub struct RobotsCache {
    client: Client,
    agent_token: String,
    enabled: bool,
    entries: Mutex<HashMap<String, PolicySlot>>,
}

impl RobotsCache {
    /// Creates a cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt files
    /// * `agent_token` - Product token matched against `User-agent` lines
    /// * `enabled` - When false every lookup is allow-all and nothing is fetched
    pub fn new(client: Client, agent_token: impl Into<String>, enabled: bool) -> Self {
        Self {
            client,
            agent_token: agent_token.into(),
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the robots policy for the URL's origin, fetching it on first use
    pub async fn policy_for(&self, url: &Url) -> Arc<ParsedRobots> {
        if !self.enabled {
            return Arc::new(ParsedRobots::allow_all());
        }

        let origin = url.origin().ascii_serialization();

        let slot = {
            let mut entries = self.entries.lock().unwrap();
            Arc::clone(entries.entry(origin.clone()).or_default())
        };

        let policy = slot
            .get_or_init(|| async {
                tracing::debug!("Fetching robots.txt for {}", origin);
                Arc::new(fetch_robots(&self.client, &origin).await)
            })
            .await;
        Arc::clone(policy)
    }

    /// Checks if a URL may be fetched
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.policy_for(url)
            .await
            .is_allowed(url.as_str(), &self.agent_token)
    }

    /// Crawl delay requested by the URL's origin, in seconds
    pub async fn crawl_delay(&self, url: &Url) -> Option<f64> {
        self.policy_for(url).await.crawl_delay(&self.agent_token)
    }
}
