//! Resource harvester
//!
//! Fetches the embedded resources of a page (scripts, styles, images and the
//! like), reformats scripts and stylesheets, and stores the result. Every
//! resource is handled independently: one failure is logged and the rest
//! carry on.

use crate::corpus::ContentStore;
use crate::crawler::endpoints::extract_endpoints;
use crate::crawler::fetcher::{fetch_url, is_textual, FetchResult};
use crate::crawler::scheduler::Scheduler;
use crate::state::CrawlState;
use crate::storage::ResourceOrigin;
use crate::transform::{beautify, SourceKind, TransformError};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

/// Everything a fetch job needs, shared behind an `Arc`
pub(crate) struct FetchContext {
    pub client: Client,
    pub scheduler: Scheduler,
    pub store: ContentStore,
    pub state: Arc<CrawlState>,
}

/// Reformats a script or stylesheet body
///
/// Returns `Ok(None)` for any other content type; the body is then stored as
/// fetched.
pub fn beautify_body(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Option<String>, TransformError> {
    let kind = content_type.and_then(SourceKind::from_content_type);
    match kind {
        Some(kind @ (SourceKind::Script | SourceKind::Style)) => {
            let text = String::from_utf8_lossy(body);
            beautify(&text, kind).map(Some)
        }
        _ => Ok(None),
    }
}

/// Fetches, reformats and stores one embedded resource
pub(crate) async fn harvest_resource(ctx: Arc<FetchContext>, url: Url, depth: u32) {
    let Some(_permit) = ctx.scheduler.admit(&url).await else {
        return;
    };

    let (final_url, content_type, body) = match fetch_url(&ctx.client, url.as_str()).await {
        FetchResult::Success {
            final_url,
            content_type,
            body,
            ..
        } => (final_url, content_type, body),
        failure => {
            tracing::warn!(
                "Failed to fetch resource {}: {}",
                url,
                failure.failure_reason().unwrap_or_default()
            );
            ctx.state.counters().fetch_failed();
            return;
        }
    };

    let stored_url = Url::parse(&final_url).unwrap_or_else(|_| url.clone());
    let content_type = content_type.as_deref();

    let bytes = match beautify_body(content_type, &body) {
        Ok(Some(pretty)) => pretty.into_bytes(),
        Ok(None) => body,
        Err(e) => {
            tracing::warn!("Could not reformat {}, storing as fetched: {}", url, e);
            ctx.state.counters().transform_failed();
            body
        }
    };

    if let Err(e) = ctx
        .store
        .persist(&stored_url, content_type, ResourceOrigin::Resource, depth, &bytes)
        .await
    {
        tracing::warn!("Failed to store resource {}: {}", url, e);
        return;
    }

    let mut characters = 0;
    if is_textual(content_type) {
        let text = String::from_utf8_lossy(&bytes);
        characters = text.chars().count();
        let added = ctx.state.add_endpoints(extract_endpoints(&text));
        if added > 0 {
            tracing::debug!("{} new endpoint literals in {}", added, url);
        }
    }
    ctx.state.counters().resource_stored(characters);

    tracing::debug!("Stored resource {} (depth {})", url, depth);
}
