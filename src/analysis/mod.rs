//! Batched analysis of a finished corpus
//!
//! Files are loaded in corpus order, costed by a [`TokenCounter`], packed by
//! the [`BatchPlanner`] and sent one batch per turn through an
//! [`AnalysisSession`]. Every turn, failed ones included, is persisted with
//! the manifest of files it covered.

mod client;
mod corpus;
mod gemini;
mod planner;
mod reports;
mod session;
mod tokens;

pub use client::{AnalysisClient, ServiceError};
pub use corpus::{batch_message, is_skipped, load_corpus, load_file, CorpusFile};
pub use gemini::GeminiClient;
pub use planner::{plan_batches, Batch, BatchPlanner, PlannerState};
pub use reports::{render_report, report_file_name, write_report};
pub use session::{
    AnalysisSession, CancelFlag, Exchange, Outcome, SessionLog, SessionRecorder, SessionSettings,
    TurnKind, DEFAULT_FINAL_PROMPT, DEFAULT_FRAMING_PROMPT,
};
pub use tokens::{count_or_zero, EstimateTokenCounter, TokenCounter, CHARS_PER_TOKEN};

use crate::config::{AnalysisConfig, TokenCounterKind};
use crate::corpus::ContentStore;
use crate::storage::RunStatus;
use crate::HarvestError;
use std::path::PathBuf;
use std::sync::Arc;

/// Outcome of one analysis run
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    /// Session row in the index; `None` when there was nothing to analyze
    pub session_id: Option<i64>,
    pub files: usize,
    pub batches: usize,
    pub turns: usize,
    pub failed_turns: usize,
    pub cancelled: bool,
}

/// Drives the planner and the session over a content store
pub struct Analyzer {
    config: AnalysisConfig,
    client: Arc<dyn AnalysisClient>,
    counter: Arc<dyn TokenCounter>,
    reports_dir: PathBuf,
    cancel: CancelFlag,
}

impl Analyzer {
    pub fn new(
        config: AnalysisConfig,
        client: Arc<dyn AnalysisClient>,
        counter: Arc<dyn TokenCounter>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            client,
            counter,
            reports_dir: reports_dir.into(),
            cancel: CancelFlag::new(),
        }
    }

    /// Builds an analyzer backed by the Generative Language API
    ///
    /// Token costs come from the service or from the local estimate,
    /// depending on `token-counter`.
    pub fn from_config(
        config: &AnalysisConfig,
        reports_dir: impl Into<PathBuf>,
    ) -> Result<Self, ServiceError> {
        let gemini = Arc::new(GeminiClient::from_config(config)?);
        let counter: Arc<dyn TokenCounter> = match config.token_counter {
            TokenCounterKind::Service => gemini.clone(),
            TokenCounterKind::Estimate => Arc::new(EstimateTokenCounter),
        };
        Ok(Self::new(config.clone(), gemini, counter, reports_dir))
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Analyzes the store's corpus
    ///
    /// # Returns
    ///
    /// * `Ok(AnalysisReport)` - The session ran to completion or was cancelled
    /// * `Err(HarvestError)` - The corpus or the session log could not be read
    ///   or written; service failures are recorded as turns, not returned
    pub async fn run(&self, store: &ContentStore) -> Result<AnalysisReport, HarvestError> {
        let Some(files) = self.load(store).await? else {
            return Ok(AnalysisReport::default());
        };

        let recorder = SessionRecorder::create(store.index(), store.run_id(), &self.reports_dir)?;
        let session = AnalysisSession::new(
            Arc::clone(&self.client),
            SessionSettings::from_config(&self.config),
        )
        .with_recorder(recorder);

        self.complete(session, files).await
    }

    /// Continues an earlier session over the same corpus
    ///
    /// The corpus is planned again and batches the stored log already covers
    /// are not re-sent. A session that already holds its summary turn is
    /// left untouched.
    ///
    /// # Returns
    ///
    /// * `Ok(AnalysisReport)` - The session ran to completion or was cancelled
    /// * `Err(HarvestError::BrokenSessionLog)` - The stored turns have gaps
    pub async fn resume(
        &self,
        store: &ContentStore,
        session_id: i64,
    ) -> Result<AnalysisReport, HarvestError> {
        let (recorder, history) = SessionRecorder::reopen(store.index(), session_id, &self.reports_dir)?;
        let session = AnalysisSession::resume(
            Arc::clone(&self.client),
            SessionSettings::from_config(&self.config),
            history,
        )
        .ok_or(HarvestError::BrokenSessionLog(session_id))?
        .with_recorder(recorder);

        if session.log().has_summary() {
            tracing::info!("Session {} already holds its final report", session_id);
            return Ok(AnalysisReport {
                session_id: Some(session_id),
                turns: session.log().len(),
                failed_turns: session.log().failures(),
                ..AnalysisReport::default()
            });
        }

        tracing::info!(
            "Resuming session {} after {} turns (batch {})",
            session_id,
            session.log().len(),
            session.log().last_batch()
        );

        let Some(files) = self.load(store).await? else {
            return Ok(AnalysisReport {
                session_id: Some(session_id),
                ..AnalysisReport::default()
            });
        };
        self.complete(session, files).await
    }

    /// Loads the corpus; `None` when nothing is analyzable
    async fn load(&self, store: &ContentStore) -> Result<Option<Vec<CorpusFile>>, HarvestError> {
        let files = load_corpus(store, &self.config.skip_extensions).await?;
        if files.is_empty() {
            tracing::warn!("Corpus of run {} has no analyzable files", store.run_id());
            return Ok(None);
        }
        tracing::info!("Analyzing {} files from run {}", files.len(), store.run_id());
        Ok(Some(files))
    }

    /// Drives a session to its end and records the final status
    async fn complete(
        &self,
        session: AnalysisSession,
        files: Vec<CorpusFile>,
    ) -> Result<AnalysisReport, HarvestError> {
        let mut session = session.with_cancel_flag(self.cancel.clone());
        let mut report = AnalysisReport {
            session_id: session.recorder().map(SessionRecorder::session_id),
            files: files.len(),
            ..AnalysisReport::default()
        };

        let result = self.drive(&mut session, files, &mut report).await;

        report.turns = session.log().len();
        report.failed_turns = session.log().failures();
        report.cancelled = session.is_cancelled();

        let status = match (&result, report.cancelled) {
            (Err(_), _) => RunStatus::Failed,
            (Ok(()), true) => RunStatus::Interrupted,
            (Ok(()), false) => RunStatus::Completed,
        };
        if let Some(recorder) = session.recorder() {
            recorder.finish(status)?;
        }
        result?;

        tracing::info!(
            "Session {} finished: {} turns, {} failed",
            report.session_id.unwrap_or_default(),
            report.turns,
            report.failed_turns
        );
        Ok(report)
    }

    async fn drive(
        &self,
        session: &mut AnalysisSession,
        files: Vec<CorpusFile>,
        report: &mut AnalysisReport,
    ) -> Result<(), HarvestError> {
        if session.open().await?.is_none() && session.is_cancelled() {
            return Ok(());
        }

        // Batches up to this number are already in the log
        let already_sent = session.log().last_batch();

        let mut planner = BatchPlanner::new(self.config.token_ceiling);
        for file in files {
            if session.is_cancelled() {
                return Ok(());
            }
            let tokens = count_or_zero(self.counter.as_ref(), &file.label, &file.content).await;
            tracing::debug!("{} costs {} tokens", file.label, tokens);

            if let Some(batch) = planner.push(file, tokens) {
                if batch.number <= already_sent {
                    continue;
                }
                if session.submit(&batch).await?.is_none() {
                    return Ok(());
                }
                report.batches += 1;
            }
        }

        if let Some(batch) = planner.finish() {
            if batch.number > already_sent {
                if session.submit(&batch).await?.is_none() {
                    return Ok(());
                }
                report.batches += 1;
            }
        }

        session.close().await?;
        Ok(())
    }
}
