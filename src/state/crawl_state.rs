use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Mutable state of one crawl run, shared by every fetch job
///
/// Owned by the [`Coordinator`](crate::crawler::Coordinator) and handed to
/// jobs behind an `Arc`. Pages and resources share one claimed-URL set and
/// every claim is a single critical section, so a canonical URL is fetched
/// at most once, by whichever job claims it first.
#[derive(Debug, Default)]
pub struct CrawlState {
    claimed: Mutex<HashMap<String, FetchKind>>,
    endpoints: Mutex<BTreeSet<String>>,
    counters: CrawlCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Page,
    Resource,
}

/// Running totals, used for reporting only
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub pages_stored: AtomicU64,
    pub resources_stored: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub transform_failures: AtomicU64,
    pub characters: AtomicU64,
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub pages_stored: u64,
    pub resources_stored: u64,
    pub fetch_failures: u64,
    pub transform_failures: u64,
    pub characters: u64,
    pub endpoints: u64,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically checks and marks a canonical URL as visited
    ///
    /// Returns `true` if the caller now owns the URL, `false` if it had
    /// already been claimed as a page or a resource.
    pub fn mark_visited(&self, canonical: &str) -> bool {
        self.claim(canonical, FetchKind::Page)
    }

    /// Claims a canonical URL for a resource fetch
    ///
    /// Fails if the URL was already claimed, as a page or as a resource.
    pub fn claim_resource(&self, canonical: &str) -> bool {
        self.claim(canonical, FetchKind::Resource)
    }

    fn claim(&self, canonical: &str, kind: FetchKind) -> bool {
        match self.claimed.lock().unwrap().entry(canonical.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(kind);
                true
            }
        }
    }

    /// Returns true if the canonical URL was claimed by any fetch
    pub fn is_claimed(&self, canonical: &str) -> bool {
        self.claimed.lock().unwrap().contains_key(canonical)
    }

    /// Number of pages claimed so far
    pub fn visited_count(&self) -> usize {
        self.claimed
            .lock()
            .unwrap()
            .values()
            .filter(|kind| **kind == FetchKind::Page)
            .count()
    }

    /// Adds endpoint literals; duplicates are dropped by exact string equality
    pub fn add_endpoints<I>(&self, found: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut endpoints = self.endpoints.lock().unwrap();
        found
            .into_iter()
            .filter(|endpoint| endpoints.insert(endpoint.clone()))
            .count()
    }

    /// All endpoints found so far, sorted
    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().iter().cloned().collect()
    }

    pub fn counters(&self) -> &CrawlCounters {
        &self.counters
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let c = &self.counters;
        CounterSnapshot {
            pages_stored: c.pages_stored.load(Ordering::Relaxed),
            resources_stored: c.resources_stored.load(Ordering::Relaxed),
            fetch_failures: c.fetch_failures.load(Ordering::Relaxed),
            transform_failures: c.transform_failures.load(Ordering::Relaxed),
            characters: c.characters.load(Ordering::Relaxed),
            endpoints: self.endpoints.lock().unwrap().len() as u64,
        }
    }
}

impl CrawlCounters {
    pub fn page_stored(&self, characters: usize) {
        self.pages_stored.fetch_add(1, Ordering::Relaxed);
        self.characters.fetch_add(characters as u64, Ordering::Relaxed);
    }

    pub fn resource_stored(&self, characters: usize) {
        self.resources_stored.fetch_add(1, Ordering::Relaxed);
        self.characters.fetch_add(characters as u64, Ordering::Relaxed);
    }

    pub fn fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn transform_failed(&self) {
        self.transform_failures.fetch_add(1, Ordering::Relaxed);
    }
}
