//! Content store: the on-disk mirror plus its ordered index
//!
//! Bytes go to `<root>/<domain>/<mirrored path>`; every write is also
//! recorded in the corpus index so the analysis stage can walk the corpus in
//! discovery order.

mod paths;

pub use paths::{canonical_path, INDEX_FILE};

use crate::storage::{NewResource, ResourceOrigin, ResourceRecord, SqliteStorage, Storage};
use crate::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// Persisted mapping from canonical path to bytes
#[derive(Clone)]
pub struct ContentStore {
    root: PathBuf,
    domain: String,
    index: Arc<Mutex<SqliteStorage>>,
    run_id: i64,
}

impl ContentStore {
    /// Opens the store, creating the content root if needed
    ///
    /// Failing to create the root is the one unrecoverable error of a run.
    pub fn open(
        root: impl Into<PathBuf>,
        domain: &str,
        index: Arc<Mutex<SqliteStorage>>,
        run_id: i64,
    ) -> Result<Self, HarvestError> {
        let root = root.into();
        std::fs::create_dir_all(root.join(domain)).map_err(|source| {
            HarvestError::ContentRoot {
                path: root.display().to_string(),
                source,
            }
        })?;

        Ok(Self {
            root,
            domain: domain.to_string(),
            index,
            run_id,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    /// Shared handle on the index database
    pub fn index(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.index)
    }

    /// Storage path of a URL, relative to the content root
    ///
    /// Everything fetched during a crawl lands under the seed domain, resources
    /// from other hosts included.
    pub fn path_for(&self, url: &Url) -> String {
        format!("{}/{}", self.domain, canonical_path(url.path()))
    }

    /// Absolute location of a relative storage path
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes a fetched body and records it in the index
    ///
    /// Later writes to the same path overwrite the file and keep the path's
    /// original position in the corpus.
    pub async fn persist(
        &self,
        url: &Url,
        content_type: Option<&str>,
        origin: ResourceOrigin,
        depth: u32,
        bytes: &[u8],
    ) -> Result<ResourceRecord, HarvestError> {
        let relative = self.path_for(url);
        self.write(relative, Some(url.to_string()), content_type, origin, depth, bytes)
            .await
    }

    /// Writes a named artifact directly under the content root
    pub async fn write_artifact(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<ResourceRecord, HarvestError> {
        self.write(
            name.to_string(),
            None,
            content_type,
            ResourceOrigin::Render,
            0,
            bytes,
        )
        .await
    }

    async fn write(
        &self,
        relative: String,
        source_url: Option<String>,
        content_type: Option<&str>,
        origin: ResourceOrigin,
        depth: u32,
        bytes: &[u8],
    ) -> Result<ResourceRecord, HarvestError> {
        let target = self.absolute(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!("Stored {} ({} bytes)", relative, bytes.len());

        let resource = NewResource {
            path: relative,
            source_url,
            content_type: content_type.map(str::to_string),
            origin,
            depth,
            byte_len: bytes.len() as u64,
        };

        let mut index = self.index.lock().unwrap();
        Ok(index.record_resource(self.run_id, &resource)?)
    }

    /// The run's corpus in discovery order
    pub fn list_corpus(&self) -> Result<Vec<ResourceRecord>, HarvestError> {
        let index = self.index.lock().unwrap();
        Ok(index.list_corpus(self.run_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ContentStore {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "https://example.com/").unwrap();
        ContentStore::open(
            dir.path().join("content"),
            "example.com",
            Arc::new(Mutex::new(storage)),
            run_id,
        )
        .unwrap()
    }

    #[test]
    fn test_path_for() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let url = Url::parse("https://example.com/docs/intro?x=1").unwrap();
        assert_eq!(store.path_for(&url), "example.com/docs/intro/index.html");

        let url = Url::parse("https://cdn.other.net/lib/app.js").unwrap();
        assert_eq!(store.path_for(&url), "example.com/lib/app.js");
    }

    #[tokio::test]
    async fn test_persist_writes_and_indexes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let url = Url::parse("https://example.com/a/b.js").unwrap();
        let record = store
            .persist(&url, Some("application/javascript"), ResourceOrigin::Resource, 1, b"x=1;")
            .await
            .unwrap();

        assert_eq!(record.path, "example.com/a/b.js");
        let on_disk = std::fs::read(store.absolute(&record.path)).unwrap();
        assert_eq!(on_disk, b"x=1;");
    }

    #[tokio::test]
    async fn test_overwrite_keeps_position() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let first = Url::parse("https://example.com/").unwrap();
        let second = Url::parse("https://example.com/app.js").unwrap();

        store.persist(&first, None, ResourceOrigin::Page, 0, b"one").await.unwrap();
        store.persist(&second, None, ResourceOrigin::Resource, 1, b"two").await.unwrap();
        store.persist(&first, None, ResourceOrigin::Page, 0, b"three").await.unwrap();

        let corpus = store.list_corpus().unwrap();
        let paths: Vec<&str> = corpus.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["example.com/index.html", "example.com/app.js"]);

        let on_disk = std::fs::read_to_string(store.absolute("example.com/index.html")).unwrap();
        assert_eq!(on_disk, "three");
    }

    #[tokio::test]
    async fn test_artifact_at_root() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let record = store
            .write_artifact("rendered_page.html", Some("text/html"), b"<html></html>\n")
            .await
            .unwrap();

        assert_eq!(record.path, "rendered_page.html");
        assert_eq!(record.origin, ResourceOrigin::Render);
        assert!(dir.path().join("content/rendered_page.html").exists());
    }

    #[test]
    fn test_unusable_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let storage = SqliteStorage::new_in_memory().unwrap();
        let result = ContentStore::open(&blocker, "example.com", Arc::new(Mutex::new(storage)), 1);
        assert!(matches!(result, Err(HarvestError::ContentRoot { .. })));
    }
}
