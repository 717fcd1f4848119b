//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    NewResource, ResourceRecord, RunRecord, RunStatus, SessionRecord, TurnRecord,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for the corpus index and session log backend
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new harvest run and returns its ID
    fn create_run(&mut self, config_hash: &str, seed_url: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run, if any
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed and stamps its finish time
    fn complete_run(&mut self, run_id: i64) -> StorageResult<()>;

    // ===== Corpus Index =====

    /// Records a write to the content store
    ///
    /// The first write of a path fixes its position in the corpus; later
    /// writes of the same path update its metadata in place.
    fn record_resource(&mut self, run_id: i64, resource: &NewResource)
        -> StorageResult<ResourceRecord>;

    /// Lists a run's corpus in discovery order
    fn list_corpus(&self, run_id: i64) -> StorageResult<Vec<ResourceRecord>>;

    // ===== Session Log =====

    /// Opens a new analysis session over a run's corpus
    fn create_session(&mut self, run_id: i64) -> StorageResult<i64>;

    /// Appends one turn to a session's log
    fn append_turn(&mut self, session_id: i64, turn: &TurnRecord) -> StorageResult<()>;

    /// Lists a session's turns in order
    fn list_turns(&self, session_id: i64) -> StorageResult<Vec<TurnRecord>>;

    /// Gets the most recent session over a run's corpus, if any
    fn get_latest_session(&self, run_id: i64) -> StorageResult<Option<SessionRecord>>;

    /// Closes a session with a final status
    fn finish_session(&mut self, session_id: i64, status: RunStatus) -> StorageResult<()>;
}
