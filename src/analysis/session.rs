//! Strictly sequential analysis conversation
//!
//! The conversation is an append-only [`SessionLog`]. Every call receives the
//! successful exchanges so far as its context, so a session rebuilt from a
//! stored log continues exactly where it stopped.

use crate::analysis::client::AnalysisClient;
use crate::analysis::corpus::{batch_message, CorpusFile};
use crate::analysis::planner::Batch;
use crate::analysis::reports::write_report;
use crate::config::AnalysisConfig;
use crate::storage::{RunStatus, SqliteStorage, Storage, TurnRecord};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const DEFAULT_FRAMING_PROMPT: &str = "\
You are a security reviewer analyzing the source of a website for vulnerabilities.
Examine the provided files line by line. For each issue you find:
1. Name the file and the exact line(s) affected
2. Describe the type of vulnerability
3. Explain the likely attack vectors
4. Rate the severity as Low, Medium or High

Focus on issues that affect the confidentiality or integrity of user data, such as
cross-site scripting, request forgery, injection of any kind, insecure
deserialization, open redirects, sensitive data exposure, hardcoded credentials,
broken authentication, and missing access controls.

Files arrive in several batches. Keep context across batches and consider how
issues in one file might compound issues in another.";

pub const DEFAULT_FINAL_PROMPT: &str = "\
Based on all the code you have analyzed, write a comprehensive report of every
vulnerability found. For each one include the file name and line numbers, the
type of vulnerability, a description of the issue, possible attack scenarios, a
severity rating (Low, Medium, High) and recommended fixes.

Organize the report by severity with the most critical issues first, and close
with an overall assessment of the site's security posture.";

/// What a turn carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    /// Turn 0: instructions, no files
    Framing,
    /// One planned batch, by 1-based batch number
    Batch(usize),
    /// Closing request to summarize everything seen
    Summary,
}

impl TurnKind {
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Framing => "framing".to_string(),
            Self::Batch(n) => format!("batch_{}", n),
            Self::Summary => "summary".to_string(),
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "framing" => Some(Self::Framing),
            "summary" => Some(Self::Summary),
            _ => s
                .strip_prefix("batch_")
                .and_then(|n| n.parse().ok())
                .map(Self::Batch),
        }
    }
}

/// Response text or the recorded failure text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Failure(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One recorded turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub turn: u32,
    pub kind: TurnKind,
    /// Paths of the files included in the request
    pub manifest: Vec<String>,
    pub request: String,
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

impl Exchange {
    /// Report label: `framing`, `batch_<n>_analysis`, `batch_<n>_error`,
    /// `final_report` or `final_report_error`
    pub fn label(&self) -> String {
        let ok = self.outcome.is_success();
        match self.kind {
            TurnKind::Framing if ok => "framing".to_string(),
            TurnKind::Framing => "framing_error".to_string(),
            TurnKind::Batch(n) if ok => format!("batch_{}_analysis", n),
            TurnKind::Batch(n) => format!("batch_{}_error", n),
            TurnKind::Summary if ok => "final_report".to_string(),
            TurnKind::Summary => "final_report_error".to_string(),
        }
    }

    pub fn to_record(&self) -> TurnRecord {
        TurnRecord {
            turn_index: self.turn,
            kind: self.kind.to_db_string(),
            label: self.label(),
            manifest: self.manifest.clone(),
            request: self.request.clone(),
            succeeded: self.outcome.is_success(),
            response: self.outcome.text().to_string(),
            created_at: self.at.to_rfc3339(),
        }
    }

    /// Rebuilds an exchange from its stored form
    pub fn from_record(record: TurnRecord) -> Option<Self> {
        let kind = TurnKind::from_db_string(&record.kind)?;
        let at = DateTime::parse_from_rfc3339(&record.created_at)
            .ok()?
            .with_timezone(&Utc);
        let outcome = if record.succeeded {
            Outcome::Success(record.response)
        } else {
            Outcome::Failure(record.response)
        };
        Some(Self {
            turn: record.turn_index,
            kind,
            manifest: record.manifest,
            request: record.request,
            outcome,
            at,
        })
    }
}

/// Append-only history of a session
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    exchanges: Vec<Exchange>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a stored history; turns must be numbered 0, 1, 2, ...
    pub fn from_exchanges(exchanges: Vec<Exchange>) -> Option<Self> {
        let in_order = exchanges
            .iter()
            .enumerate()
            .all(|(i, exchange)| exchange.turn as usize == i);
        in_order.then_some(Self { exchanges })
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn entries(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.exchanges.last()
    }

    /// Index the next turn will get
    pub fn next_turn(&self) -> u32 {
        self.exchanges.len() as u32
    }

    /// The context carried into the next call
    pub fn context(&self) -> Vec<Exchange> {
        self.exchanges
            .iter()
            .filter(|e| e.outcome.is_success())
            .cloned()
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.exchanges
            .iter()
            .filter(|e| !e.outcome.is_success())
            .count()
    }

    pub fn has_framing(&self) -> bool {
        self.exchanges
            .first()
            .map_or(false, |e| e.kind == TurnKind::Framing)
    }

    pub fn has_summary(&self) -> bool {
        self.exchanges.iter().any(|e| e.kind == TurnKind::Summary)
    }

    /// Highest batch number already sent
    pub fn last_batch(&self) -> usize {
        self.exchanges
            .iter()
            .filter_map(|e| match e.kind {
                TurnKind::Batch(n) => Some(n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn push(&mut self, exchange: Exchange) {
        debug_assert_eq!(exchange.turn, self.next_turn());
        self.exchanges.push(exchange);
    }
}

/// Shared stop signal; once raised no further turn is issued
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Prompts and pacing of a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub framing_prompt: String,
    pub final_prompt: String,
    pub turn_delay: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            framing_prompt: config
                .framing_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_FRAMING_PROMPT.to_string()),
            final_prompt: config
                .final_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_FINAL_PROMPT.to_string()),
            turn_delay: Duration::from_secs(config.turn_delay_secs),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Persists each turn to the index and the reports directory
pub struct SessionRecorder {
    storage: Arc<Mutex<SqliteStorage>>,
    session_id: i64,
    reports_dir: PathBuf,
}

impl SessionRecorder {
    /// Opens a new session row for `run_id`
    pub fn create(
        storage: Arc<Mutex<SqliteStorage>>,
        run_id: i64,
        reports_dir: impl Into<PathBuf>,
    ) -> Result<Self, HarvestError> {
        let session_id = storage.lock().unwrap().create_session(run_id)?;
        Ok(Self {
            storage,
            session_id,
            reports_dir: reports_dir.into(),
        })
    }

    /// Attaches to an existing session and returns its stored history
    pub fn reopen(
        storage: Arc<Mutex<SqliteStorage>>,
        session_id: i64,
        reports_dir: impl Into<PathBuf>,
    ) -> Result<(Self, Vec<Exchange>), HarvestError> {
        let records = storage.lock().unwrap().list_turns(session_id)?;
        let history = records
            .into_iter()
            .filter_map(|record| {
                let turn = record.turn_index;
                let exchange = Exchange::from_record(record);
                if exchange.is_none() {
                    tracing::warn!("Ignoring unreadable turn {} of session {}", turn, session_id);
                }
                exchange
            })
            .collect();
        let recorder = Self {
            storage,
            session_id,
            reports_dir: reports_dir.into(),
        };
        Ok((recorder, history))
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Appends the turn to the log table, then writes its report file
    pub async fn record(&self, exchange: &Exchange) -> Result<PathBuf, HarvestError> {
        {
            let mut storage = self.storage.lock().unwrap();
            storage.append_turn(self.session_id, &exchange.to_record())?;
        }
        write_report(&self.reports_dir, exchange).await
    }

    pub fn finish(&self, status: RunStatus) -> Result<(), HarvestError> {
        self.storage
            .lock()
            .unwrap()
            .finish_session(self.session_id, status)?;
        Ok(())
    }
}

/// A running conversation with the analysis service
pub struct AnalysisSession {
    client: Arc<dyn AnalysisClient>,
    settings: SessionSettings,
    log: SessionLog,
    recorder: Option<SessionRecorder>,
    cancel: CancelFlag,
}

impl AnalysisSession {
    pub fn new(client: Arc<dyn AnalysisClient>, settings: SessionSettings) -> Self {
        Self {
            client,
            settings,
            log: SessionLog::new(),
            recorder: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Continues a session from its recorded history
    ///
    /// Returns `None` when the history is not a gapless sequence of turns.
    pub fn resume(
        client: Arc<dyn AnalysisClient>,
        settings: SessionSettings,
        history: Vec<Exchange>,
    ) -> Option<Self> {
        let log = SessionLog::from_exchanges(history)?;
        Some(Self {
            client,
            settings,
            log,
            recorder: None,
            cancel: CancelFlag::new(),
        })
    }

    pub fn with_recorder(mut self, recorder: SessionRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn recorder(&self) -> Option<&SessionRecorder> {
        self.recorder.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sends the framing turn
    ///
    /// # Returns
    ///
    /// * `Ok(Some(exchange))` - The recorded turn
    /// * `Ok(None)` - The log already opens with a framing turn, or the
    ///   session was cancelled
    pub async fn open(&mut self) -> Result<Option<Exchange>, HarvestError> {
        if self.log.has_framing() {
            return Ok(None);
        }
        let prompt = self.settings.framing_prompt.clone();
        self.turn(TurnKind::Framing, Vec::new(), prompt).await
    }

    /// Sends one batch as the next turn
    pub async fn submit(&mut self, batch: &Batch<CorpusFile>) -> Result<Option<Exchange>, HarvestError> {
        let manifest = batch.files.iter().map(|f| f.label.clone()).collect();
        let message = batch_message(&batch.files);
        tracing::info!(
            "Analyzing batch {} ({} files, {} tokens)",
            batch.number,
            batch.files.len(),
            batch.token_count
        );
        self.turn(TurnKind::Batch(batch.number), manifest, message).await
    }

    /// Sends the closing summary turn
    pub async fn close(&mut self) -> Result<Option<Exchange>, HarvestError> {
        let prompt = self.settings.final_prompt.clone();
        tracing::info!("Requesting final report");
        self.turn(TurnKind::Summary, Vec::new(), prompt).await
    }

    /// Issues one turn once the previous one is recorded
    ///
    /// A failed call is recorded like a response, with the failure text in
    /// place of the answer. Only persistence errors are returned.
    async fn turn(
        &mut self,
        kind: TurnKind,
        manifest: Vec<String>,
        request: String,
    ) -> Result<Option<Exchange>, HarvestError> {
        if !self.log.is_empty() && !self.settings.turn_delay.is_zero() {
            tracing::debug!("Waiting {:?} before the next turn", self.settings.turn_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.settings.turn_delay) => {}
                _ = self.cancel.cancelled() => {}
            }
        }
        if self.cancel.is_cancelled() {
            tracing::info!("Analysis cancelled; no further turns will be sent");
            return Ok(None);
        }

        let context = self.log.context();
        let outcome = match self.client.send(&context, &request).await {
            Ok(text) => Outcome::Success(text),
            Err(e) => {
                tracing::error!("Turn {} failed: {}", self.log.next_turn(), e);
                Outcome::Failure(format!("Error during analysis: {}", e))
            }
        };

        let exchange = Exchange {
            turn: self.log.next_turn(),
            kind,
            manifest,
            request,
            outcome,
            at: Utc::now(),
        };

        if let Some(recorder) = &self.recorder {
            let path = recorder.record(&exchange).await?;
            tracing::info!("Saved {} to {}", exchange.label(), path.display());
        }

        self.log.push(exchange.clone());
        Ok(Some(exchange))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::client::ServiceError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Replies with the number of context exchanges it was given; fails on
    /// messages containing "FAIL"
    struct CountingClient {
        calls: Mutex<Vec<usize>>,
    }

    impl CountingClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AnalysisClient for CountingClient {
        async fn send(&self, context: &[Exchange], message: &str) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(context.len());
            if message.contains("FAIL") {
                return Err(ServiceError::Quota("exhausted".to_string()));
            }
            Ok(format!("seen {}", context.len()))
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            framing_prompt: "frame".into(),
            final_prompt: "summarize".into(),
            turn_delay: Duration::ZERO,
        }
    }

    fn batch(number: usize, contents: &[&str]) -> Batch<CorpusFile> {
        Batch {
            number,
            files: contents
                .iter()
                .enumerate()
                .map(|(i, c)| CorpusFile {
                    label: format!("f{}_{}.js", number, i),
                    content: c.to_string(),
                })
                .collect(),
            token_count: 1,
        }
    }

    #[tokio::test]
    async fn test_turn_sequence_and_context() {
        let client = CountingClient::new();
        let mut session = AnalysisSession::new(client.clone(), settings());

        session.open().await.unwrap().unwrap();
        let failed = session.submit(&batch(1, &["FAIL"])).await.unwrap().unwrap();
        session.submit(&batch(2, &["ok"])).await.unwrap().unwrap();
        let last = session.close().await.unwrap().unwrap();

        assert_eq!(failed.label(), "batch_1_error");
        assert_eq!(failed.outcome.text(), "Error during analysis: quota exceeded: exhausted");
        assert_eq!(failed.manifest, vec!["f1_0.js".to_string()]);

        // The failed turn is not carried forward
        assert_eq!(*client.calls.lock().unwrap(), vec![0, 1, 1, 2]);
        assert_eq!(last.turn, 3);
        assert_eq!(last.label(), "final_report");
        assert_eq!(session.log().failures(), 1);
        assert!(session.log().has_summary());
    }

    #[tokio::test]
    async fn test_open_is_not_repeated() {
        let mut session = AnalysisSession::new(CountingClient::new(), settings());
        assert!(session.open().await.unwrap().is_some());
        assert!(session.open().await.unwrap().is_none());
        assert_eq!(session.log().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_session_sends_nothing() {
        let client = CountingClient::new();
        let cancel = CancelFlag::new();
        let mut session = AnalysisSession::new(client.clone(), settings()).with_cancel_flag(cancel.clone());

        session.open().await.unwrap();
        cancel.cancel();
        assert!(session.submit(&batch(1, &["x"])).await.unwrap().is_none());
        assert_eq!(client.calls.lock().unwrap().len(), 1);
        assert_eq!(session.log().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_turn_delay() {
        let cancel = CancelFlag::new();
        let mut session = AnalysisSession::new(
            CountingClient::new(),
            SessionSettings {
                turn_delay: Duration::from_secs(3600),
                ..settings()
            },
        )
        .with_cancel_flag(cancel.clone());
        session.open().await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), session.close())
            .await
            .expect("cancel should cut the delay short");
        assert!(outcome.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recorded_session_resumes() {
        let dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", "https://example.com/").unwrap();
        let storage = Arc::new(Mutex::new(storage));
        let reports = dir.path().join("reports");

        let recorder = SessionRecorder::create(storage.clone(), run_id, &reports).unwrap();
        let session_id = recorder.session_id();
        let mut session = AnalysisSession::new(CountingClient::new(), settings()).with_recorder(recorder);
        session.open().await.unwrap();
        session.submit(&batch(1, &["a"])).await.unwrap();

        let (recorder, history) = SessionRecorder::reopen(storage.clone(), session_id, &reports).unwrap();
        assert_eq!(history, session.log().entries().to_vec());

        let client = CountingClient::new();
        let mut resumed = AnalysisSession::resume(client.clone(), settings(), history)
            .unwrap()
            .with_recorder(recorder);
        assert!(resumed.open().await.unwrap().is_none());
        assert_eq!(resumed.log().last_batch(), 1);

        let summary = resumed.close().await.unwrap().unwrap();
        assert_eq!(summary.turn, 2);
        assert_eq!(*client.calls.lock().unwrap(), vec![2]);

        let turns = storage.lock().unwrap().list_turns(session_id).unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(std::fs::read_dir(&reports).unwrap().count(), 3);
    }

    #[test]
    fn test_turn_kind_strings() {
        for kind in [TurnKind::Framing, TurnKind::Batch(12), TurnKind::Summary] {
            assert_eq!(TurnKind::from_db_string(&kind.to_db_string()), Some(kind));
        }
        assert_eq!(TurnKind::from_db_string("batch_x"), None);
    }

    #[test]
    fn test_log_rejects_gaps() {
        let exchange = |turn| Exchange {
            turn,
            kind: TurnKind::Summary,
            manifest: Vec::new(),
            request: String::new(),
            outcome: Outcome::Success(String::new()),
            at: Utc::now(),
        };
        assert!(SessionLog::from_exchanges(vec![exchange(0), exchange(1)]).is_some());
        assert!(SessionLog::from_exchanges(vec![exchange(0), exchange(2)]).is_none());
    }
}
