//! Exercise session state.
//!
//! One session per learner and exercise. It owns the result board the UI
//! reads, the submission state machine and the snapshot store.
//!
//! Passes may overlap. Each `run`/`submit`/`restore` takes a fresh
//! invocation token and only the holder of the latest token may publish;
//! an older pass that finishes later is discarded.

use crate::client::ExecutionClient;
use crate::orchestrator::{Orchestrator, PassReport};
use crate::snapshot::SnapshotStore;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use verdict_common::types::{Language, Mode, Snapshot, TestCaseRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Submitting,
    Submitted,
    Restored,
}

/// What the UI observes. Each slot is replaced wholesale, never edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardView {
    pub run: Option<PassReport>,
    pub submission: Option<PassReport>,
}

#[derive(Debug, Default)]
pub struct ResultBoard {
    latest: AtomicU64,
    slots: RwLock<BoardView>,
}

impl ResultBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an invocation, superseding every earlier one
    pub fn begin(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == token
    }

    /// Publish `report` into its mode's slot. Returns false, leaving the
    /// board untouched, when a newer invocation has started since `token`.
    pub async fn publish(&self, token: u64, report: PassReport) -> bool {
        let mut slots = self.slots.write().await;
        if !self.is_current(token) {
            debug!(token = token, "Discarding superseded results");
            return false;
        }

        match report.mode {
            Mode::Run => slots.run = Some(report),
            Mode::Submit => slots.submission = Some(report),
        }
        true
    }

    pub async fn view(&self) -> BoardView {
        self.slots.read().await.clone()
    }
}

#[derive(Debug)]
struct StateCell {
    state: SubmissionState,
    /// Token of the submission that moved the state to `Submitting`
    owner: Option<u64>,
}

/// A restored submission, as handed back after a reload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestoredPass {
    pub code: String,
    pub language: Language,
    pub report: PassReport,
}

pub struct ExerciseSession {
    orchestrator: Orchestrator,
    snapshots: Arc<dyn SnapshotStore>,
    board: ResultBoard,
    state: Mutex<StateCell>,
}

impl ExerciseSession {
    pub fn new(client: Arc<dyn ExecutionClient>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            orchestrator: Orchestrator::new(client),
            snapshots,
            board: ResultBoard::new(),
            state: Mutex::new(StateCell {
                state: SubmissionState::Idle,
                owner: None,
            }),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
            .lock()
            .map(|cell| cell.state)
            .unwrap_or(SubmissionState::Idle)
    }

    fn set_state(&self, state: SubmissionState, owner: Option<u64>) {
        if let Ok(mut cell) = self.state.lock() {
            cell.state = state;
            cell.owner = owner;
        }
    }

    /// Settle a submission: only the submission that owns `Submitting` may move it on
    fn settle(&self, token: u64, state: SubmissionState) {
        if let Ok(mut cell) = self.state.lock() {
            if cell.owner == Some(token) {
                cell.state = state;
                cell.owner = None;
            }
        }
    }

    pub async fn results(&self) -> BoardView {
        self.board.view().await
    }

    /// Exploratory pass over the visible cases. `None` if superseded.
    pub async fn run(
        &self,
        code: &str,
        language: Language,
        records: &[TestCaseRecord],
    ) -> Option<PassReport> {
        let token = self.board.begin();
        let report = self.orchestrator.run(code, language, records, Mode::Run).await;

        self.board.publish(token, report.clone()).await.then_some(report)
    }

    /// Authoritative pass over the hidden cases. A published submission with
    /// results is snapshotted so it survives a reload.
    pub async fn submit(
        &self,
        code: &str,
        language: Language,
        records: &[TestCaseRecord],
    ) -> Option<PassReport> {
        let token = self.board.begin();
        self.set_state(SubmissionState::Submitting, Some(token));

        let report = self.orchestrator.run(code, language, records, Mode::Submit).await;

        if !self.board.publish(token, report.clone()).await {
            self.settle(token, SubmissionState::Idle);
            return None;
        }

        if report.results.is_empty() {
            self.settle(token, SubmissionState::Idle);
            return Some(report);
        }

        let snapshot = Snapshot::new(code, language, Mode::Submit, report.results.clone());
        match self.snapshots.save(&snapshot).await {
            Ok(()) => {
                info!(results = report.results.len(), "Submission saved for restore");
                self.settle(token, SubmissionState::Submitted);
            }
            Err(e) => {
                warn!(error = %e, "Failed to save submission snapshot");
                self.settle(token, SubmissionState::Idle);
            }
        }

        Some(report)
    }

    /// Take the pending snapshot, if any, and show it as the submission result
    pub async fn restore(&self) -> Option<RestoredPass> {
        let snapshot = self.snapshots.consume().await?;
        let token = self.board.begin();
        let report = PassReport::from_snapshot(&snapshot);

        self.board.publish(token, report.clone()).await;
        self.set_state(SubmissionState::Restored, None);

        info!(results = report.results.len(), "Submission restored");
        Some(RestoredPass {
            code: snapshot.code,
            language: snapshot.language,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::orchestrator::PassOutcome;
    use crate::snapshot::MemorySnapshotStore;
    use async_trait::async_trait;
    use tokio::sync::{oneshot, Notify};
    use verdict_common::types::RawExecutionResult;

    /// Echoes a fixed stdout. The first call can be held until released.
    struct GatedClient {
        stdout: String,
        entered: Arc<Notify>,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl GatedClient {
        fn open(stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                stdout: stdout.to_string(),
                entered: Arc::new(Notify::new()),
                gate: Mutex::new(None),
            })
        }

        fn held(stdout: &str) -> (Arc<Self>, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            let client = Arc::new(Self {
                stdout: stdout.to_string(),
                entered: Arc::new(Notify::new()),
                gate: Mutex::new(Some(rx)),
            });
            (client, tx)
        }
    }

    #[async_trait]
    impl ExecutionClient for GatedClient {
        async fn execute(
            &self,
            _language: Language,
            _code: &str,
            _stdin: &str,
        ) -> Result<RawExecutionResult, ClientError> {
            let gate = self.gate.lock().unwrap().take();
            self.entered.notify_one();
            if let Some(rx) = gate {
                let _ = rx.await;
            }
            Ok(RawExecutionResult {
                stdout: self.stdout.clone(),
                time_ms: Some(5.0),
                memory_kb: Some(512),
                ..Default::default()
            })
        }
    }

    fn records() -> Vec<TestCaseRecord> {
        vec![
            TestCaseRecord {
                id: "visible".to_string(),
                input: "1 2".to_string(),
                output: "ok".to_string(),
                hidden: false,
                explanation: Some("sample".to_string()),
            },
            TestCaseRecord {
                id: "hidden".to_string(),
                input: "3 4".to_string(),
                output: "ok".to_string(),
                hidden: true,
                explanation: None,
            },
        ]
    }

    fn session(client: Arc<dyn ExecutionClient>) -> (Arc<ExerciseSession>, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let session = Arc::new(ExerciseSession::new(client, store.clone()));
        (session, store)
    }

    #[tokio::test]
    async fn test_board_discards_stale_token() {
        let board = ResultBoard::new();
        let first = board.begin();
        let second = board.begin();

        let report = PassReport::from_snapshot(&Snapshot::new("c", Language::C, Mode::Run, Vec::new()));
        assert!(!board.publish(first, report.clone()).await);
        assert!(board.view().await.run.is_none());
        assert!(board.publish(second, report).await);
        assert!(board.view().await.run.is_some());
    }

    #[tokio::test]
    async fn test_newer_run_supersedes_older_one() {
        let (client, release) = GatedClient::held("ok");
        let entered = client.entered.clone();
        let (session, _) = session(client);

        let older = {
            let session = session.clone();
            tokio::spawn(async move { session.run("old", Language::Python, &records()).await })
        };
        entered.notified().await;

        let newer = session.run("new", Language::Python, &records()).await;
        assert!(newer.is_some());

        release.send(()).unwrap();
        assert!(older.await.unwrap().is_none());

        let view = session.results().await;
        assert_eq!(view.run, newer);
    }

    #[tokio::test]
    async fn test_run_never_touches_submission_slot() {
        let (session, _) = session(GatedClient::open("ok"));

        let submitted = session.submit("code", Language::Python, &records()).await.unwrap();
        session.run("code", Language::Python, &records()).await.unwrap();

        let view = session.results().await;
        assert_eq!(view.submission, Some(submitted));
        assert!(view.run.is_some());
        assert_eq!(session.state(), SubmissionState::Submitted);
    }

    #[tokio::test]
    async fn test_submit_then_restore_round_trip() {
        let (session, store) = session(GatedClient::open("ok"));
        assert_eq!(session.state(), SubmissionState::Idle);

        let submitted = session.submit("print('ok')", Language::Python, &records()).await.unwrap();
        assert!(submitted.all_passed());
        assert_eq!(session.state(), SubmissionState::Submitted);

        // A reload builds a fresh session over the same store
        let reloaded = ExerciseSession::new(GatedClient::open("unused"), store.clone());
        let restored = reloaded.restore().await.unwrap();

        assert_eq!(restored.code, "print('ok')");
        assert_eq!(restored.language, Language::Python);
        assert_eq!(restored.report.results, submitted.results);
        assert!(restored.report.results.iter().all(|r| r.is_submission));
        assert_eq!(reloaded.state(), SubmissionState::Restored);
        assert_eq!(reloaded.results().await.submission, Some(restored.report));

        assert!(reloaded.restore().await.is_none());
        assert!(store.retained().is_some());
    }

    #[tokio::test]
    async fn test_submit_without_hidden_cases_saves_nothing() {
        let (session, store) = session(GatedClient::open("ok"));
        let visible_only = vec![records().remove(0)];

        let report = session.submit("code", Language::Python, &visible_only).await.unwrap();

        assert_eq!(report.outcome, PassOutcome::NoApplicableCases);
        assert_eq!(session.state(), SubmissionState::Idle);
        assert!(store.retained().is_none());
    }

    #[tokio::test]
    async fn test_superseded_submission_is_not_saved() {
        let (client, release) = GatedClient::held("ok");
        let entered = client.entered.clone();
        let (session, store) = session(client);

        let submission = {
            let session = session.clone();
            tokio::spawn(async move { session.submit("code", Language::Python, &records()).await })
        };
        entered.notified().await;
        assert_eq!(session.state(), SubmissionState::Submitting);

        session.run("code", Language::Python, &records()).await.unwrap();
        release.send(()).unwrap();

        assert!(submission.await.unwrap().is_none());
        assert_eq!(session.state(), SubmissionState::Idle);
        assert!(store.retained().is_none());
        assert!(session.results().await.submission.is_none());
    }
}
