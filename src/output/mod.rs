//! Output module for crawl and analysis summaries
//!
//! This module handles:
//! - Printing and logging the end-of-crawl summary
//! - Printing the analysis session outcome
//! - Corpus statistics read back from the index

pub mod stats;

pub use stats::{load_statistics, print_statistics, CorpusStatistics, TypeCount};

use crate::analysis::AnalysisReport;
use crate::crawler::CrawlReport;

/// Prints the end-of-crawl summary and records it in the log
pub fn print_crawl_summary(report: &CrawlReport) {
    let c = &report.counters;
    tracing::info!(
        "Run {} finished in {:.1}s: {} pages, {} resources, {} fetch failures, {} transform failures, {} characters, {} endpoints",
        report.run_id,
        report.elapsed.as_secs_f64(),
        c.pages_stored,
        c.resources_stored,
        c.fetch_failures,
        c.transform_failures,
        c.characters,
        report.endpoints.len()
    );

    println!("=== Crawl Summary ===\n");
    println!("Run {} ({:.1}s)", report.run_id, report.elapsed.as_secs_f64());
    println!("  Pages stored: {}", c.pages_stored);
    println!("  Resources stored: {}", c.resources_stored);
    println!("  Fetch failures: {}", c.fetch_failures);
    println!("  Transform failures: {}", c.transform_failures);
    println!("  Total characters: {}", c.characters);
    println!("  API endpoints found: {}", report.endpoints.len());
}

/// Prints how an analysis session went
pub fn print_analysis_summary(report: &AnalysisReport) {
    println!("=== Analysis Summary ===\n");
    match report.session_id {
        Some(id) => println!("Session {}", id),
        None => {
            println!("Nothing to analyze");
            return;
        }
    }
    println!("  Files analyzed: {}", report.files);
    println!("  Batches sent: {}", report.batches);
    println!("  Turns recorded: {}", report.turns);
    println!("  Failed turns: {}", report.failed_turns);
    if report.cancelled {
        println!("  Cancelled before completion");
    }
}
