//! Storage module for the corpus index and analysis session log
//!
//! The content store writes bytes to disk; this module remembers what was
//! written, in which order, and what every analysis turn sent and received:
//! - SQLite database initialization and schema management
//! - Run tracking
//! - Corpus ordering (first-write sequence per stored path)
//! - Append-only session logs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Which stage produced a stored resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOrigin {
    /// A crawled page
    Page,
    /// An embedded resource harvested from a page
    Resource,
    /// An artifact of the dynamic rendering pass
    Render,
}

impl ResourceOrigin {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Resource => "resource",
            Self::Render => "render",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "page" => Some(Self::Page),
            "resource" => Some(Self::Resource),
            "render" => Some(Self::Render),
            _ => None,
        }
    }
}

/// A write about to be recorded in the corpus index
#[derive(Debug, Clone)]
pub struct NewResource {
    /// Path relative to the content root, `/`-separated
    pub path: String,
    pub source_url: Option<String>,
    pub content_type: Option<String>,
    pub origin: ResourceOrigin,
    pub depth: u32,
    pub byte_len: u64,
}

/// A stored resource as recorded in the corpus index
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    /// Discovery sequence; corpus order is ascending `seq`
    pub seq: i64,
    pub run_id: i64,
    pub path: String,
    pub source_url: Option<String>,
    pub content_type: Option<String>,
    pub origin: ResourceOrigin,
    pub depth: u32,
    pub byte_len: u64,
    pub first_seen_at: String,
    pub updated_at: String,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub seed_url: String,
    pub status: RunStatus,
}

/// An analysis session over one run's corpus
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
}

/// One persisted analysis turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRecord {
    pub turn_index: u32,
    pub kind: String,
    pub label: String,
    pub manifest: Vec<String>,
    pub request: String,
    pub succeeded: bool,
    pub response: String,
    pub created_at: String,
}

/// Status of a run or session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
