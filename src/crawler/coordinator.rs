//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Initializing the index, the content store and the run record
//! - Managing the frontier queue and the pool of fetch jobs
//! - Deduplicating pages and resources
//! - Handing pages to the resource harvester and endpoint extractor
//! - Persisting the endpoint set once the crawl has drained

use crate::config::Config;
use crate::corpus::ContentStore;
use crate::crawler::endpoints::extract_endpoints;
use crate::crawler::fetcher::{build_http_client, fetch_url, is_html, is_textual, FetchResult};
use crate::crawler::harvester::{harvest_resource, FetchContext};
use crate::crawler::parser::parse_page;
use crate::crawler::scheduler::{CrawlTask, Frontier, Scheduler};
use crate::robots::RobotsCache;
use crate::state::{CounterSnapshot, CrawlState};
use crate::storage::{ResourceOrigin, SqliteStorage, Storage};
use crate::url::{canonical_key, canonicalize_url, AllowedDomains};
use crate::{HarvestError, UrlError};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// What a finished fetch job hands back to the coordinator
enum JobOutcome {
    Page {
        links: Vec<CrawlTask>,
        resources: Vec<Url>,
        depth: u32,
    },
    Resource,
}

/// Summary of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub run_id: i64,
    pub counters: CounterSnapshot,
    pub endpoints: Vec<String>,
    pub elapsed: Duration,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    ctx: Arc<FetchContext>,
    allowed: AllowedDomains,
    seed: Url,
    run_id: i64,
}

impl Coordinator {
    /// Creates a new coordinator and opens a run
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    /// * `config_hash` - Hash of the configuration file, stored on the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to crawl
    /// * `Err(HarvestError)` - The index or the content root is unusable
    pub fn new(config: Config, config_hash: &str) -> Result<Self, HarvestError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        Self::with_storage(config, config_hash, storage)
    }

    /// Creates a coordinator over an already opened index
    pub fn with_storage(
        config: Config,
        config_hash: &str,
        mut storage: SqliteStorage,
    ) -> Result<Self, HarvestError> {
        let seed = canonicalize_url(&config.target.seed_url)?;
        let allowed = AllowedDomains::from_seed(&seed).ok_or(UrlError::MissingDomain)?;

        let run_id = storage.create_run(config_hash, seed.as_str())?;
        tracing::info!("Starting run {} from {}", run_id, seed);

        let storage = Arc::new(Mutex::new(storage));
        let store = ContentStore::open(
            &config.output.content_dir,
            allowed.primary(),
            Arc::clone(&storage),
            run_id,
        )?;

        let client = build_http_client(&config.user_agent, config.crawler.request_timeout_secs)?;
        let robots = RobotsCache::new(
            client.clone(),
            config.user_agent.crawler_name.clone(),
            config.crawler.obey_robots,
        );
        let scheduler = Scheduler::new(&config.crawler, robots);

        let ctx = Arc::new(FetchContext {
            client,
            scheduler,
            store,
            state: Arc::new(CrawlState::new()),
        });

        Ok(Self {
            config: Arc::new(config),
            storage,
            ctx,
            allowed,
            seed,
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// The content store this run writes to
    pub fn store(&self) -> ContentStore {
        self.ctx.store.clone()
    }

    /// The shared corpus index
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    pub fn state(&self) -> Arc<CrawlState> {
        Arc::clone(&self.ctx.state)
    }

    /// Runs the main crawl loop
    ///
    /// Tasks are taken from the frontier in discovery order. Each task is
    /// checked against the depth bound and the visited set before any fetch
    /// is issued; page and resource jobs then run concurrently, bounded by
    /// the scheduler. The loop ends once the frontier is empty and every job
    /// has finished.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let start_time = Instant::now();
        let max_depth = self.config.crawler.max_depth;
        let state = Arc::clone(&self.ctx.state);

        let mut frontier = Frontier::new();
        frontier.push(CrawlTask {
            url: self.seed.clone(),
            depth: 0,
        });

        let mut jobs: JoinSet<JobOutcome> = JoinSet::new();
        let mut pages_done = 0u64;

        loop {
            while let Some(task) = frontier.pop() {
                if task.depth > max_depth {
                    tracing::trace!("Depth {} exceeds maximum for {}", task.depth, task.url);
                    continue;
                }
                if !state.mark_visited(&canonical_key(&task.url)) {
                    continue;
                }

                let ctx = Arc::clone(&self.ctx);
                let allowed = self.allowed.clone();
                jobs.spawn(crawl_page(ctx, allowed, task));
            }

            let Some(joined) = jobs.join_next().await else {
                tracing::info!("Frontier is empty, crawl complete");
                break;
            };

            match joined {
                Ok(JobOutcome::Page {
                    links,
                    resources,
                    depth,
                }) => {
                    pages_done += 1;

                    for resource in resources {
                        if state.claim_resource(&canonical_key(&resource)) {
                            let ctx = Arc::clone(&self.ctx);
                            jobs.spawn(async move {
                                harvest_resource(ctx, resource, depth).await;
                                JobOutcome::Resource
                            });
                        }
                    }

                    for link in links {
                        if !state.is_claimed(&canonical_key(&link.url)) {
                            frontier.push(link);
                        }
                    }

                    if pages_done % 10 == 0 {
                        tracing::info!(
                            "Progress: {} pages crawled, {} in frontier, {} jobs running, {:.2} pages/sec",
                            pages_done,
                            frontier.len(),
                            jobs.len(),
                            pages_done as f64 / start_time.elapsed().as_secs_f64()
                        );
                    }
                }
                Ok(JobOutcome::Resource) => {}
                Err(e) => tracing::error!("Fetch job failed: {}", e),
            }
        }

        let endpoints = state.endpoints();
        if let Err(e) = write_endpoints(Path::new(&self.config.output.api_endpoints_path), &endpoints)
        {
            tracing::error!("Failed to write endpoint list: {}", e);
        }

        {
            let mut storage = self.storage.lock().unwrap();
            storage.complete_run(self.run_id)?;
        }

        let report = CrawlReport {
            run_id: self.run_id,
            counters: state.snapshot(),
            endpoints,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Crawl completed: {} pages visited, {} stored, {} resources, {} requests in {:?}",
            state.visited_count(),
            report.counters.pages_stored,
            report.counters.resources_stored,
            self.ctx.scheduler.total_requests(),
            report.elapsed
        );

        Ok(report)
    }
}

/// Fetches and stores one page, returning what it links to and embeds
async fn crawl_page(ctx: Arc<FetchContext>, allowed: AllowedDomains, task: CrawlTask) -> JobOutcome {
    let empty = JobOutcome::Page {
        links: Vec::new(),
        resources: Vec::new(),
        depth: task.depth,
    };

    let Some(_permit) = ctx.scheduler.admit(&task.url).await else {
        tracing::info!("URL {} disallowed by robots.txt", task.url);
        return empty;
    };

    let (final_url, content_type, body) = match fetch_url(&ctx.client, task.url.as_str()).await {
        FetchResult::Success {
            final_url,
            content_type,
            body,
            ..
        } => (final_url, content_type, body),
        failure => {
            tracing::warn!(
                "Failed to fetch {}: {}",
                task.url,
                failure.failure_reason().unwrap_or_default()
            );
            ctx.state.counters().fetch_failed();
            return empty;
        }
    };

    // A redirect may land on a page some other job already owns
    let page_url = match canonicalize_url(&final_url) {
        Ok(url) if url != task.url => {
            if !allowed.allows(&url) {
                tracing::debug!("{} redirected off-site to {}", task.url, url);
                return empty;
            }
            if !ctx.state.mark_visited(&canonical_key(&url)) {
                tracing::debug!("{} redirected to already visited {}", task.url, url);
                return empty;
            }
            url
        }
        _ => task.url.clone(),
    };

    let content_type = content_type.as_deref();
    if let Err(e) = ctx
        .store
        .persist(&page_url, content_type, ResourceOrigin::Page, task.depth, &body)
        .await
    {
        tracing::warn!("Failed to store {}: {}", page_url, e);
        return empty;
    }

    let text = String::from_utf8_lossy(&body);
    let textual = is_textual(content_type);
    ctx.state
        .counters()
        .page_stored(if textual { text.chars().count() } else { 0 });

    if textual {
        ctx.state.add_endpoints(extract_endpoints(&text));
    }

    if !is_html(content_type) {
        return empty;
    }

    let parsed = parse_page(&text, &page_url);
    let links = parsed
        .links
        .into_iter()
        .filter(|link| allowed.allows(link))
        .map(|url| CrawlTask {
            url,
            depth: task.depth + 1,
        })
        .collect();

    tracing::debug!("Crawled {} (depth {})", page_url, task.depth);

    JobOutcome::Page {
        links,
        resources: parsed.resources,
        depth: task.depth,
    }
}

/// Writes the endpoint set as a pretty-printed JSON array
pub fn write_endpoints(path: &Path, endpoints: &[String]) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(endpoints)?;
    std::fs::write(path, json)?;
    tracing::info!("Wrote {} endpoint literals to {}", endpoints.len(), path.display());
    Ok(())
}
