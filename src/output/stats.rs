//! Corpus statistics from the index database
//!
//! This module reads what a run stored and summarizes it for budgeting the
//! analysis stage: file counts, bytes, characters and an estimated token
//! total.

use crate::analysis::CHARS_PER_TOKEN;
use crate::crawler::is_textual;
use crate::storage::{ResourceOrigin, RunRecord, Storage};
use crate::HarvestError;
use std::collections::BTreeMap;
use std::path::Path;

/// Files and bytes of one content type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCount {
    pub files: u64,
    pub bytes: u64,
}

/// Summary of one run's corpus
#[derive(Debug, Clone)]
pub struct CorpusStatistics {
    pub run: RunRecord,

    /// Number of stored paths
    pub total_files: u64,

    pub total_bytes: u64,

    pub pages: u64,
    pub resources: u64,
    pub render_artifacts: u64,

    /// Counts keyed by MIME type without parameters
    pub by_content_type: BTreeMap<String, TypeCount>,

    /// Characters across text-like files still present on disk
    pub characters: u64,
}

impl CorpusStatistics {
    /// Rough token total at four characters per token
    pub fn estimated_tokens(&self) -> u64 {
        self.characters.div_ceil(CHARS_PER_TOKEN)
    }
}

/// Loads statistics for a run, or the latest run when `run_id` is `None`
///
/// # Arguments
///
/// * `storage` - The index to query
/// * `content_root` - Root the stored paths are relative to
/// * `run_id` - Run to summarize
///
/// # Returns
///
/// * `Ok(Some(CorpusStatistics))` - The run's statistics
/// * `Ok(None)` - The index holds no runs
/// * `Err(HarvestError)` - Failed to query the index
pub fn load_statistics(
    storage: &dyn Storage,
    content_root: &Path,
    run_id: Option<i64>,
) -> Result<Option<CorpusStatistics>, HarvestError> {
    let run = match run_id {
        Some(id) => storage.get_run(id)?,
        None => match storage.get_latest_run()? {
            Some(run) => run,
            None => return Ok(None),
        },
    };

    let records = storage.list_corpus(run.id)?;
    let mut stats = CorpusStatistics {
        run,
        total_files: 0,
        total_bytes: 0,
        pages: 0,
        resources: 0,
        render_artifacts: 0,
        by_content_type: BTreeMap::new(),
        characters: 0,
    };

    for record in &records {
        stats.total_files += 1;
        stats.total_bytes += record.byte_len;
        match record.origin {
            ResourceOrigin::Page => stats.pages += 1,
            ResourceOrigin::Resource => stats.resources += 1,
            ResourceOrigin::Render => stats.render_artifacts += 1,
        }

        let mime = record
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let entry = stats.by_content_type.entry(mime).or_default();
        entry.files += 1;
        entry.bytes += record.byte_len;

        if is_textual(record.content_type.as_deref()) {
            if let Ok(bytes) = std::fs::read(content_root.join(&record.path)) {
                stats.characters += String::from_utf8_lossy(&bytes).chars().count() as u64;
            }
        }
    }

    Ok(Some(stats))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CorpusStatistics) {
    println!("=== Corpus Statistics ===\n");

    println!("Run {}:", stats.run.id);
    println!("  Seed: {}", stats.run.seed_url);
    println!("  Started: {}", stats.run.started_at);
    if let Some(finished) = &stats.run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Status: {}", stats.run.status.to_db_string());
    println!();

    println!("Overview:");
    println!("  Stored files: {}", stats.total_files);
    println!("  Pages: {}", stats.pages);
    println!("  Resources: {}", stats.resources);
    println!("  Render artifacts: {}", stats.render_artifacts);
    println!("  Total bytes: {}", stats.total_bytes);
    println!();

    if !stats.by_content_type.is_empty() {
        println!("By Content Type:");
        let mut types: Vec<_> = stats.by_content_type.iter().collect();
        types.sort_by(|a, b| b.1.files.cmp(&a.1.files).then_with(|| a.0.cmp(b.0)));
        for (mime, count) in types {
            println!("  {}: {} files, {} bytes", mime, count.files, count.bytes);
        }
        println!();
    }

    println!(
        "Total characters: {} (~{} tokens)",
        stats.characters,
        stats.estimated_tokens()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewResource, SqliteStorage};
    use tempfile::TempDir;

    fn resource(path: &str, content_type: &str, origin: ResourceOrigin, bytes: u64) -> NewResource {
        NewResource {
            path: path.to_string(),
            source_url: None,
            content_type: Some(content_type.to_string()),
            origin,
            depth: 0,
            byte_len: bytes,
        }
    }

    #[test]
    fn test_empty_index() {
        let dir = TempDir::new().unwrap();
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(load_statistics(&storage, dir.path(), None).unwrap().is_none());
    }

    #[test]
    fn test_statistics_from_latest_run() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("example.com")).unwrap();
        std::fs::write(dir.path().join("example.com/index.html"), "12345678").unwrap();

        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let old = storage.create_run("h", "https://example.com/").unwrap();
        storage
            .record_resource(old, &resource("old.html", "text/html", ResourceOrigin::Page, 99))
            .unwrap();

        let run = storage.create_run("h", "https://example.com/").unwrap();
        for r in [
            resource("example.com/index.html", "text/html; charset=utf-8", ResourceOrigin::Page, 8),
            resource("example.com/logo.png", "image/png", ResourceOrigin::Resource, 100),
            resource("rendered_page.html", "text/html", ResourceOrigin::Render, 20),
        ] {
            storage.record_resource(run, &r).unwrap();
        }

        let stats = load_statistics(&storage, dir.path(), None).unwrap().unwrap();
        assert_eq!(stats.run.id, run);
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_bytes, 128);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.render_artifacts, 1);
        assert_eq!(
            stats.by_content_type.get("text/html"),
            Some(&TypeCount { files: 2, bytes: 28 })
        );
        // rendered_page.html is not on disk
        assert_eq!(stats.characters, 8);
        assert_eq!(stats.estimated_tokens(), 2);
    }
}
