use lifeline_common::events::Table;
use lifeline_common::models::{Call, TranscriptLine};
use lifeline_common::{Error, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::{dedupe_by_call_time, QuestionSet};
use crate::backend::{Backend, ChangeFilter};
use crate::ticket::{is_current, LoadOutcome, RequestTickets};

/// One caller's calls, newest first, at most one per `call_time`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallHistory {
    calls: Vec<Call>,
    selected: Option<i64>,
}

impl CallHistory {
    /// Build from a descending backend fetch
    ///
    /// `keep_selected` survives if that call is still present, otherwise the
    /// most recent call is selected.
    pub fn from_fetched(calls: Vec<Call>, keep_selected: Option<i64>) -> Self {
        let calls = dedupe_by_call_time(calls);
        let selected = keep_selected
            .filter(|id| calls.iter().any(|c| c.id == *id))
            .or_else(|| calls.first().map(|c| c.id));
        Self { calls, selected }
    }

    /// Merge a newly inserted call
    ///
    /// Returns false, leaving the history untouched, when a call with the
    /// same `call_time` is already present.
    pub fn merge_insert(&mut self, call: Call) -> bool {
        if self.calls.iter().any(|c| c.call_time == call.call_time) {
            return false;
        }

        let pos = self
            .calls
            .iter()
            .position(|c| c.call_time < call.call_time)
            .unwrap_or(self.calls.len());
        if self.selected.is_none() {
            self.selected = Some(call.id);
        }
        self.calls.insert(pos, call);
        true
    }

    pub fn select(&mut self, call_id: i64) -> Result<()> {
        if !self.calls.iter().any(|c| c.id == call_id) {
            return Err(Error::NotFound(format!("call {}", call_id)));
        }
        self.selected = Some(call_id);
        Ok(())
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selected
    }

    pub fn selected_call(&self) -> Option<&Call> {
        let id = self.selected?;
        self.calls.iter().find(|c| c.id == id)
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }
}

/// Load state of a detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetailStatus {
    Loading,
    Ready,
    /// Last load failed; calls from an earlier load may still be shown
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub phone_number: String,
    #[serde(flatten)]
    pub status: DetailStatus,
    pub calls: Vec<Call>,
    pub selected_call_id: Option<i64>,
    /// Key Q&A lines from the selected call's transcript
    pub key_questions: Vec<TranscriptLine>,
}

struct DetailState {
    history: CallHistory,
    status: DetailStatus,
    applied_ticket: u64,
    /// Calls merged from notifications, tagged with the last ticket issued
    /// at merge time. A load whose ticket is not newer may have fetched
    /// before the call existed, so these are replayed onto its result.
    live_inserts: Vec<(u64, Call)>,
}

/// Call history of one caller, kept in step with live inserts
pub struct DetailReconciler {
    backend: Arc<dyn Backend>,
    phone_number: String,
    questions: Arc<QuestionSet>,
    state: Mutex<DetailState>,
    tickets: RequestTickets,
}

impl DetailReconciler {
    pub fn new(backend: Arc<dyn Backend>, phone_number: impl Into<String>, questions: Arc<QuestionSet>) -> Self {
        Self {
            backend,
            phone_number: phone_number.into(),
            questions,
            state: Mutex::new(DetailState {
                history: CallHistory::default(),
                status: DetailStatus::Loading,
                applied_ticket: 0,
                live_inserts: Vec::new(),
            }),
            tickets: RequestTickets::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, DetailState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    /// Inserts on `calls` for this caller only
    pub fn subscription_filter(&self) -> ChangeFilter {
        ChangeFilter::inserts(Table::Calls).where_eq("phone_number", self.phone_number.as_str())
    }

    /// Fetch the full history, replacing what is held
    ///
    /// A failure moves the view to [`DetailStatus::Error`] and is returned.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let ticket = {
            let mut state = self.state();
            if state.status != DetailStatus::Ready {
                state.status = DetailStatus::Loading;
            }
            self.tickets.issue()
        };

        let fetched = self.backend.fetch_calls(&self.phone_number, None).await;

        let mut state = self.state();
        if !is_current(ticket, state.applied_ticket) {
            debug!(
                "Discarding stale call history for {} (ticket {} < applied {})",
                self.phone_number, ticket, state.applied_ticket
            );
            return match fetched {
                Ok(_) => Ok(LoadOutcome::Stale),
                Err(e) => Err(e),
            };
        }
        state.applied_ticket = ticket;
        state.live_inserts.retain(|(seen_at, _)| *seen_at >= ticket);

        match fetched {
            Ok(calls) => {
                let fetched_len = calls.len();
                let mut history = CallHistory::from_fetched(calls, state.history.selected_id());
                for (_, call) in &state.live_inserts {
                    history.merge_insert(call.clone());
                }
                state.history = history;
                state.status = DetailStatus::Ready;
                info!(
                    "Loaded {} calls for {} ({} after dedupe)",
                    fetched_len,
                    self.phone_number,
                    state.history.calls().len()
                );
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                warn!("Call history fetch failed for {}: {}", self.phone_number, e);
                state.status = DetailStatus::Error {
                    message: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Manual retry after a failed load
    pub async fn retry(&self) -> Result<LoadOutcome> {
        info!("Retrying call history load for {}", self.phone_number);
        self.load().await
    }

    /// Merge a call delivered by an insert notification
    pub fn apply_insert(&self, call: Call) -> bool {
        if call.phone_number != self.phone_number {
            return false;
        }
        let id = call.id;
        let mut state = self.state();
        let merged = state.history.merge_insert(call.clone());
        if merged {
            state.live_inserts.push((self.tickets.current(), call));
            debug!("Merged call {} into history of {}", id, self.phone_number);
        } else {
            debug!("Ignoring call {}: call time already present", id);
        }
        merged
    }

    /// Switch the inspected call
    pub fn select(&self, call_id: i64) -> Result<DetailView> {
        self.state().history.select(call_id)?;
        Ok(self.view())
    }

    pub fn view(&self) -> DetailView {
        let state = self.state();
        let key_questions = state
            .history
            .selected_call()
            .and_then(|c| c.transcript.as_ref())
            .map(|t| self.questions.extract(t))
            .unwrap_or_default();

        DetailView {
            phone_number: self.phone_number.clone(),
            status: state.status.clone(),
            calls: state.history.calls().to_vec(),
            selected_call_id: state.history.selected_id(),
            key_questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{call, day, StubBackend};
    use lifeline_common::models::{Speaker, Transcript, UrgencyLevel};
    use std::time::Duration;

    fn ids(calls: &[Call]) -> Vec<i64> {
        calls.iter().map(|c| c.id).collect()
    }

    fn reconciler(backend: Arc<StubBackend>) -> DetailReconciler {
        DetailReconciler::new(backend, "1", Arc::new(QuestionSet::default()))
    }

    #[test]
    fn test_history_dedupes_and_selects_most_recent() {
        let history = CallHistory::from_fetched(
            vec![
                call(3, "1", day(2), None, None),
                call(2, "1", day(2), None, None),
                call(1, "1", day(1), None, None),
            ],
            None,
        );
        assert_eq!(ids(history.calls()), vec![3, 1]);
        assert_eq!(history.selected_id(), Some(3));
    }

    #[test]
    fn test_history_keeps_selection_still_present() {
        let calls = vec![call(2, "1", day(2), None, None), call(1, "1", day(1), None, None)];
        assert_eq!(CallHistory::from_fetched(calls.clone(), Some(1)).selected_id(), Some(1));
        assert_eq!(CallHistory::from_fetched(calls, Some(99)).selected_id(), Some(2));
    }

    #[test]
    fn test_merge_insert_is_idempotent() {
        let mut history = CallHistory::from_fetched(vec![call(1, "1", day(1), None, None)], None);

        assert!(history.merge_insert(call(2, "1", day(3), None, None)));
        let once = history.clone();
        assert!(!history.merge_insert(call(2, "1", day(3), None, None)));
        assert!(!history.merge_insert(call(7, "1", day(3), None, None)));
        assert_eq!(history, once);
        assert_eq!(ids(history.calls()), vec![2, 1]);
    }

    #[test]
    fn test_merge_insert_keeps_time_order() {
        let mut history = CallHistory::from_fetched(
            vec![call(3, "1", day(5), None, None), call(1, "1", day(1), None, None)],
            None,
        );
        history.merge_insert(call(2, "1", day(3), None, None));
        history.merge_insert(call(0, "1", day(1) - chrono::Duration::hours(1), None, None));
        assert_eq!(ids(history.calls()), vec![3, 2, 1, 0]);
    }

    #[test]
    fn test_merge_insert_does_not_override_selection() {
        let mut history = CallHistory::from_fetched(
            vec![call(2, "1", day(2), None, None), call(1, "1", day(1), None, None)],
            None,
        );
        history.select(1).unwrap();
        history.merge_insert(call(3, "1", day(3), None, None));
        assert_eq!(history.selected_id(), Some(1));
        assert_eq!(history.calls()[0].id, 3);
    }

    #[test]
    fn test_merge_into_empty_history_selects_new_call() {
        let mut history = CallHistory::default();
        assert!(history.merge_insert(call(5, "1", day(1), None, None)));
        assert_eq!(history.selected_id(), Some(5));
    }

    #[test]
    fn test_select_unknown_call() {
        let mut history = CallHistory::from_fetched(vec![call(1, "1", day(1), None, None)], None);
        assert!(matches!(history.select(42), Err(Error::NotFound(_))));
        assert_eq!(history.selected_id(), Some(1));
    }

    #[tokio::test]
    async fn test_load_then_live_insert() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), Some(UrgencyLevel::Low), None));
        backend.put_call(call(2, "1", day(2), Some(UrgencyLevel::Medium), None));
        backend.put_call(call(9, "other", day(3), None, None));
        let detail = reconciler(backend);

        assert_eq!(detail.view().status, DetailStatus::Loading);
        assert_eq!(detail.load().await.unwrap(), LoadOutcome::Applied);

        let view = detail.view();
        assert_eq!(view.status, DetailStatus::Ready);
        assert_eq!(ids(&view.calls), vec![2, 1]);
        assert_eq!(view.selected_call_id, Some(2));

        assert!(detail.apply_insert(call(3, "1", day(4), None, None)));
        assert!(!detail.apply_insert(call(3, "1", day(4), None, None)));
        assert!(!detail.apply_insert(call(8, "other", day(5), None, None)));

        let view = detail.view();
        assert_eq!(ids(&view.calls), vec![3, 2, 1]);
        assert_eq!(view.selected_call_id, Some(2));
    }

    #[tokio::test]
    async fn test_empty_history_is_ready_not_error() {
        let detail = reconciler(Arc::new(StubBackend::new()));
        detail.load().await.unwrap();

        let view = detail.view();
        assert_eq!(view.status, DetailStatus::Ready);
        assert!(view.calls.is_empty());
        assert_eq!(view.selected_call_id, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_error_and_retry_recovers() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        backend.set_fail_calls_for("1", true);
        let detail = reconciler(backend.clone());

        assert!(detail.load().await.is_err());
        assert!(matches!(detail.view().status, DetailStatus::Error { .. }));

        backend.set_fail_calls_for("1", false);
        assert_eq!(detail.retry().await.unwrap(), LoadOutcome::Applied);
        let view = detail.view();
        assert_eq!(view.status, DetailStatus::Ready);
        assert_eq!(ids(&view.calls), vec![1]);
    }

    #[tokio::test]
    async fn test_reload_keeps_inspected_call() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        backend.put_call(call(2, "1", day(2), None, None));
        let detail = reconciler(backend.clone());
        detail.load().await.unwrap();
        detail.select(1).unwrap();

        backend.put_call(call(3, "1", day(3), None, None));
        detail.load().await.unwrap();

        let view = detail.view();
        assert_eq!(ids(&view.calls), vec![3, 2, 1]);
        assert_eq!(view.selected_call_id, Some(1));
    }

    #[tokio::test]
    async fn test_stale_history_is_discarded() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        let detail = Arc::new(reconciler(backend.clone()));

        backend.push_call_delay(Duration::from_millis(150));
        let slow = {
            let detail = detail.clone();
            tokio::spawn(async move { detail.load().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        backend.put_call(call(2, "1", day(2), None, None));
        assert_eq!(detail.load().await.unwrap(), LoadOutcome::Applied);
        assert_eq!(slow.await.unwrap().unwrap(), LoadOutcome::Stale);
        assert_eq!(ids(&detail.view().calls), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_live_insert_survives_inflight_reload() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        let detail = Arc::new(reconciler(backend.clone()));
        detail.load().await.unwrap();

        // Reload snapshots the store before the new call lands, then stalls
        backend.push_call_delay(Duration::from_millis(150));
        let reload = {
            let detail = detail.clone();
            tokio::spawn(async move { detail.retry().await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(detail.apply_insert(call(2, "1", day(2), None, None)));
        assert_eq!(ids(&detail.view().calls), vec![2, 1]);

        assert_eq!(reload.await.unwrap().unwrap(), LoadOutcome::Applied);
        let view = detail.view();
        assert_eq!(ids(&view.calls), vec![2, 1]);
        assert_eq!(view.status, DetailStatus::Ready);
    }

    #[tokio::test]
    async fn test_insert_already_fetched_is_not_duplicated_by_replay() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        let detail = reconciler(backend.clone());
        detail.load().await.unwrap();

        backend.put_call(call(2, "1", day(2), None, None));
        assert!(detail.apply_insert(call(2, "1", day(2), None, None)));
        detail.load().await.unwrap();
        detail.load().await.unwrap();

        assert_eq!(ids(&detail.view().calls), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_error_after_ready_keeps_previous_calls() {
        let backend = Arc::new(StubBackend::new());
        backend.put_call(call(1, "1", day(1), None, None));
        backend.put_call(call(2, "1", day(2), None, None));
        let detail = reconciler(backend.clone());
        detail.load().await.unwrap();
        detail.select(1).unwrap();

        backend.set_fail_calls_for("1", true);
        let err = detail.retry().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));

        let view = detail.view();
        match &view.status {
            DetailStatus::Error { message } => assert!(message.contains("calls for 1")),
            other => panic!("expected error status, got {:?}", other),
        }
        assert_eq!(ids(&view.calls), vec![2, 1]);
        assert_eq!(view.selected_call_id, Some(1));
    }

    #[tokio::test]
    async fn test_view_extracts_key_questions_of_selected_call() {
        let backend = Arc::new(StubBackend::new());
        let mut with_transcript = call(1, "1", day(1), None, None);
        with_transcript.transcript = Some(Transcript::parse(
            "AI: How are you feeling?\nUser: Okay I guess\nAI: unrelated",
        ));
        backend.put_call(with_transcript);
        backend.put_call(call(2, "1", day(2), None, None));
        let detail = reconciler(backend);
        detail.load().await.unwrap();

        assert!(detail.view().key_questions.is_empty());

        let view = detail.select(1).unwrap();
        assert_eq!(view.key_questions.len(), 2);
        assert_eq!(view.key_questions[0].speaker, Speaker::Ai);
        assert_eq!(view.key_questions[1].text, "Okay I guess");

        assert!(matches!(detail.select(5), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_subscription_filter_targets_caller_inserts() {
        let detail = reconciler(Arc::new(StubBackend::new()));
        let filter = detail.subscription_filter();
        assert_eq!(filter, ChangeFilter::inserts(Table::Calls).where_eq("phone_number", "1"));
    }
}
