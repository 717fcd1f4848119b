//! Loading the stored corpus for analysis

use crate::corpus::ContentStore;
use crate::storage::ResourceRecord;
use crate::HarvestError;

/// One stored file ready to be batched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Path the file is labeled with in messages and manifests
    pub label: String,
    pub content: String,
}

/// Whether the path's extension is excluded from analysis
pub fn is_skipped(path: &str, skip_extensions: &[String]) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => skip_extensions
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Reads one stored file
///
/// Bytes that are not valid UTF-8 are decoded lossily. A blank file is an
/// `EmptyContent` error so the caller can log and skip it.
pub async fn load_file(store: &ContentStore, record: &ResourceRecord) -> Result<CorpusFile, HarvestError> {
    let location = store.absolute(&record.path);
    let label = location.display().to_string();
    let bytes = tokio::fs::read(&location).await?;
    let content = String::from_utf8_lossy(&bytes).into_owned();

    if content.trim().is_empty() {
        return Err(HarvestError::EmptyContent { path: label });
    }

    Ok(CorpusFile { label, content })
}

/// Loads every analyzable file in corpus order
///
/// Skipped extensions, blank files and unreadable files are logged and left
/// out; nothing else is dropped.
pub async fn load_corpus(
    store: &ContentStore,
    skip_extensions: &[String],
) -> Result<Vec<CorpusFile>, HarvestError> {
    let records = store.list_corpus()?;
    let mut files = Vec::with_capacity(records.len());

    for record in &records {
        if is_skipped(&record.path, skip_extensions) {
            tracing::info!("Skipping {}", record.path);
            continue;
        }
        match load_file(store, record).await {
            Ok(file) => files.push(file),
            Err(HarvestError::EmptyContent { path }) => {
                tracing::warn!("Skipping empty file: {}", path);
            }
            Err(e) => {
                tracing::warn!("Skipping unreadable file {}: {}", record.path, e);
            }
        }
    }

    Ok(files)
}

/// The message body for one batch: every file labeled with its path
pub fn batch_message(files: &[CorpusFile]) -> String {
    let mut message = String::with_capacity(files.iter().map(|f| f.content.len() + f.label.len() + 10).sum());
    for file in files {
        message.push_str("\nFile: ");
        message.push_str(&file.label);
        message.push_str("\n\n");
        message.push_str(&file.content);
        message.push('\n');
    }
    message
}
