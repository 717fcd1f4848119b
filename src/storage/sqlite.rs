//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    NewResource, ResourceOrigin, ResourceRecord, RunRecord, RunStatus, SessionRecord, TurnRecord,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RESOURCE_COLUMNS: &str = "id, run_id, path, source_url, content_type, origin, depth,
     byte_len, first_seen_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        seed_url: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRecord> {
    Ok(ResourceRecord {
        seq: row.get(0)?,
        run_id: row.get(1)?,
        path: row.get(2)?,
        source_url: row.get(3)?,
        content_type: row.get(4)?,
        origin: ResourceOrigin::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(ResourceOrigin::Resource),
        depth: row.get(6)?,
        byte_len: row.get::<_, i64>(7)? as u64,
        first_seen_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, seed_url: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, seed_url, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, seed_url, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, seed_url, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, seed_url, status
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Corpus Index =====

    fn record_resource(
        &mut self,
        run_id: i64,
        resource: &NewResource,
    ) -> StorageResult<ResourceRecord> {
        let now = Utc::now().to_rfc3339();

        // The row id is assigned on first insert only, so rewrites keep
        // their original place in the corpus.
        self.conn.execute(
            "INSERT INTO resources
                (run_id, path, source_url, content_type, origin, depth, byte_len,
                 first_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(run_id, path) DO UPDATE SET
                source_url = excluded.source_url,
                content_type = excluded.content_type,
                byte_len = excluded.byte_len,
                updated_at = excluded.updated_at",
            params![
                run_id,
                resource.path,
                resource.source_url,
                resource.content_type,
                resource.origin.to_db_string(),
                resource.depth,
                resource.byte_len as i64,
                now,
            ],
        )?;

        let record = self.conn.query_row(
            &format!(
                "SELECT {} FROM resources WHERE run_id = ?1 AND path = ?2",
                RESOURCE_COLUMNS
            ),
            params![run_id, resource.path],
            resource_from_row,
        )?;

        Ok(record)
    }

    fn list_corpus(&self, run_id: i64) -> StorageResult<Vec<ResourceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM resources WHERE run_id = ?1 ORDER BY id ASC",
            RESOURCE_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![run_id], resource_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    // ===== Session Log =====

    fn create_session(&mut self, run_id: i64) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sessions (run_id, started_at, status) VALUES (?1, ?2, ?3)",
                params![run_id, now, RunStatus::Running.to_db_string()],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StorageError::RunNotFound(run_id)
                }
                other => StorageError::Sqlite(other),
            })?;
        Ok(self.conn.last_insert_rowid())
    }

    fn append_turn(&mut self, session_id: i64, turn: &TurnRecord) -> StorageResult<()> {
        let manifest = serde_json::to_string(&turn.manifest)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO turns
                    (session_id, turn_index, kind, label, manifest, request, succeeded,
                     response, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session_id,
                    turn.turn_index,
                    turn.kind,
                    turn.label,
                    manifest,
                    turn.request,
                    turn.succeeded,
                    turn.response,
                    turn.created_at,
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, Some(msg))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation
                        && msg.contains("FOREIGN KEY") =>
                {
                    StorageError::SessionNotFound(session_id)
                }
                other => StorageError::Sqlite(other),
            })?;
        Ok(())
    }

    fn list_turns(&self, session_id: i64) -> StorageResult<Vec<TurnRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT turn_index, kind, label, manifest, request, succeeded, response, created_at
             FROM turns WHERE session_id = ?1 ORDER BY turn_index ASC",
        )?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut turns = Vec::with_capacity(rows.len());
        for (turn_index, kind, label, manifest, request, succeeded, response, created_at) in rows {
            let manifest: Vec<String> = serde_json::from_str(&manifest)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            turns.push(TurnRecord {
                turn_index,
                kind,
                label,
                manifest,
                request,
                succeeded,
                response,
                created_at,
            });
        }

        Ok(turns)
    }

    fn get_latest_session(&self, run_id: i64) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                "SELECT id, run_id, started_at, finished_at, status
                 FROM sessions WHERE run_id = ?1 ORDER BY id DESC LIMIT 1",
                params![run_id],
                |row| {
                    Ok(SessionRecord {
                        id: row.get(0)?,
                        run_id: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Running),
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    fn finish_session(&mut self, session_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE sessions SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, session_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(path: &str, byte_len: u64) -> NewResource {
        NewResource {
            path: path.to_string(),
            source_url: Some(format!("https://example.com/{}", path)),
            content_type: Some("text/html".to_string()),
            origin: ResourceOrigin::Page,
            depth: 0,
            byte_len,
        }
    }

    fn turn(index: u32, succeeded: bool) -> TurnRecord {
        TurnRecord {
            turn_index: index,
            kind: "batch".to_string(),
            label: format!("batch_{}_analysis", index),
            manifest: vec!["a.html".to_string(), "b.js".to_string()],
            request: "analyze".to_string(),
            succeeded,
            response: "ok".to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_create_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("abc123", "https://example.com/").unwrap();
        assert!(run_id > 0);

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.seed_url, "https://example.com/");
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_complete_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("abc123", "https://example.com/").unwrap();
        storage.complete_run(run_id).unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, run_id);
        assert_eq!(latest.status, RunStatus::Completed);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_missing_run() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
        assert!(storage.get_latest_run().unwrap().is_none());
    }

    #[test]
    fn test_corpus_keeps_first_write_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "https://example.com/").unwrap();

        let first = storage.record_resource(run_id, &resource("index.html", 10)).unwrap();
        storage.record_resource(run_id, &resource("app.js", 20)).unwrap();
        let rewritten = storage.record_resource(run_id, &resource("index.html", 30)).unwrap();

        assert_eq!(first.seq, rewritten.seq);
        assert_eq!(rewritten.byte_len, 30);

        let corpus = storage.list_corpus(run_id).unwrap();
        let paths: Vec<&str> = corpus.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["index.html", "app.js"]);
    }

    #[test]
    fn test_corpus_is_scoped_to_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_a = storage.create_run("h", "https://a.example/").unwrap();
        let run_b = storage.create_run("h", "https://b.example/").unwrap();

        storage.record_resource(run_a, &resource("index.html", 1)).unwrap();
        storage.record_resource(run_b, &resource("index.html", 1)).unwrap();
        storage.record_resource(run_b, &resource("about/index.html", 1)).unwrap();

        assert_eq!(storage.list_corpus(run_a).unwrap().len(), 1);
        assert_eq!(storage.list_corpus(run_b).unwrap().len(), 2);
    }

    #[test]
    fn test_session_log_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "https://example.com/").unwrap();
        let session_id = storage.create_session(run_id).unwrap();

        storage.append_turn(session_id, &turn(0, true)).unwrap();
        storage.append_turn(session_id, &turn(1, false)).unwrap();
        storage.finish_session(session_id, RunStatus::Completed).unwrap();

        let turns = storage.list_turns(session_id).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].manifest, vec!["a.html", "b.js"]);
        assert!(turns[0].succeeded);
        assert!(!turns[1].succeeded);
    }

    #[test]
    fn test_turn_index_is_unique() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "https://example.com/").unwrap();
        let session_id = storage.create_session(run_id).unwrap();

        storage.append_turn(session_id, &turn(0, true)).unwrap();
        assert!(storage.append_turn(session_id, &turn(0, true)).is_err());
    }

    #[test]
    fn test_latest_session_per_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_a = storage.create_run("h", "https://a.example/").unwrap();
        let run_b = storage.create_run("h", "https://b.example/").unwrap();
        assert!(storage.get_latest_session(run_a).unwrap().is_none());

        let first = storage.create_session(run_a).unwrap();
        storage.finish_session(first, RunStatus::Completed).unwrap();
        let second = storage.create_session(run_a).unwrap();
        storage.finish_session(second, RunStatus::Interrupted).unwrap();
        storage.create_session(run_b).unwrap();

        let latest = storage.get_latest_session(run_a).unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.status, RunStatus::Interrupted);
        assert!(latest.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_session() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.finish_session(7, RunStatus::Completed),
            Err(StorageError::SessionNotFound(7))
        ));
    }
}
