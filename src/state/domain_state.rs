use std::time::{Duration, Instant};

/// Tracks the politeness state of one host during crawling
///
/// Every outbound fetch to the host, page or resource, goes through
/// [`DomainState::reserve`], which hands out the next free request slot.
#[derive(Debug, Clone, Default)]
pub struct DomainState {
    /// Number of requests made to this host in the current run
    pub request_count: u32,

    /// When the most recently reserved request to this host may start
    pub last_request_time: Option<Instant>,

    /// `Crawl-delay` from the host's robots.txt, if any
    pub crawl_delay: Option<Duration>,
}

impl DomainState {
    /// Creates a new DomainState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// The spacing enforced between two requests to this host
    ///
    /// The larger of the configured politeness delay and the robots.txt
    /// crawl delay.
    pub fn effective_delay(&self, base: Duration) -> Duration {
        match self.crawl_delay {
            Some(robots) => std::cmp::max(base, robots),
            None => base,
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, base: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let ready_at = last + self.effective_delay(base);
        if ready_at > now {
            Some(ready_at - now)
        } else {
            None
        }
    }

    /// Reserves the next request slot and returns how long the caller must wait
    ///
    /// The slot is recorded immediately, so concurrent callers queue up one
    /// delay apart instead of all firing when the first delay elapses.
    pub fn reserve(&mut self, base: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(base, now).unwrap_or(Duration::ZERO);
        self.request_count += 1;
        self.last_request_time = Some(now + wait);
        wait
    }

    /// Records the robots.txt crawl delay for this host
    pub fn set_crawl_delay(&mut self, seconds: Option<f64>) {
        self.crawl_delay = seconds
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64);
    }
}
