//! Live dashboard sessions
//!
//! A session owns one ranking engine, at most one detail reconciler and the
//! background tasks that hold their change subscriptions. Every task is held
//! by a [`TaskGuard`], so dropping or closing the session unsubscribes.

use lifeline_common::events::{ChangeRow, Table};
use lifeline_common::sse::SseEventName;
use lifeline_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Backend, ChangeFilter, Delivery, Subscription};
use crate::detail::{DetailReconciler, DetailView, QuestionSet};
use crate::ranking::{RankedCaller, RankingEngine, RankingView, SortKey, SourceFilter};

/// Aborts the wrapped task when dropped
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub fn spawn<F>(future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(future))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Updates pushed to a session's SSE clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    CallersUpdated { view: RankingView },
    /// Fresh snapshot of the selected caller; `None` once it is gone
    SelectedCallerUpdated { caller: Option<RankedCaller> },
    CallHistoryUpdated { view: DetailView },
}

impl SseEventName for DashboardEvent {
    fn sse_name(&self) -> &'static str {
        match self {
            DashboardEvent::CallersUpdated { .. } => "CallersUpdated",
            DashboardEvent::SelectedCallerUpdated { .. } => "SelectedCallerUpdated",
            DashboardEvent::CallHistoryUpdated { .. } => "CallHistoryUpdated",
        }
    }
}

struct DetailMount {
    reconciler: Arc<DetailReconciler>,
    _task: TaskGuard,
}

pub struct DashboardSession {
    id: Uuid,
    backend: Arc<dyn Backend>,
    questions: Arc<QuestionSet>,
    ranking: Arc<RankingEngine>,
    events: broadcast::Sender<DashboardEvent>,
    ranking_task: Mutex<Option<TaskGuard>>,
    detail: Mutex<Option<DetailMount>>,
    /// Number of the latest accepted caller selection
    selection: Mutex<u64>,
    last_active: Mutex<Instant>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(events: &broadcast::Sender<DashboardEvent>, event: DashboardEvent) {
    // No receivers just means no SSE client is connected
    let _ = events.send(event);
}

impl DashboardSession {
    /// Subscribe to caller and call changes, run the initial load, and start
    /// the task that reloads on every change
    ///
    /// A failed initial load leaves an empty, unloaded view; the next change
    /// notification or refresh retries it.
    pub async fn mount(
        backend: Arc<dyn Backend>,
        questions: Arc<QuestionSet>,
        event_capacity: usize,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            ranking: Arc::new(RankingEngine::new(backend.clone())),
            backend,
            questions,
            events,
            ranking_task: Mutex::new(None),
            detail: Mutex::new(None),
            selection: Mutex::new(0),
            last_active: Mutex::new(Instant::now()),
        });

        // Subscribe before loading so nothing committed during the load is missed
        let callers = session.backend.subscribe(ChangeFilter::all(Table::Callers));
        let calls = session.backend.subscribe(ChangeFilter::inserts(Table::Calls));

        if let Err(e) = session.ranking.load().await {
            warn!("Session {}: initial caller load failed: {}", session.id, e);
        }

        let task = TaskGuard::spawn(ranking_loop(
            session.id,
            session.ranking.clone(),
            session.events.clone(),
            callers,
            calls,
        ));
        *lock(&session.ranking_task) = Some(task);

        info!("Mounted dashboard session {}", session.id);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ranking(&self) -> &RankingEngine {
        &self.ranking
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    /// Record client activity
    pub fn touch(&self) {
        *lock(&self.last_active) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_active).elapsed()
    }

    /// True while at least one SSE client is streaming this session
    pub fn has_listeners(&self) -> bool {
        self.events.receiver_count() > 0
    }

    pub fn sort_by(&self, key: SortKey) -> RankingView {
        let view = self.ranking.sort_by(key);
        publish(&self.events, DashboardEvent::CallersUpdated { view: view.clone() });
        view
    }

    pub fn set_filter(&self, filter: SourceFilter) -> RankingView {
        let view = self.ranking.set_filter(filter);
        publish(&self.events, DashboardEvent::CallersUpdated { view: view.clone() });
        view
    }

    /// Reload the caller list on demand
    pub async fn refresh(&self) -> Result<RankingView> {
        self.ranking.load().await?;
        Ok(emit_ranking(&self.ranking, &self.events))
    }

    /// Select a caller and mount a detail reconciler for them
    ///
    /// Any previous reconciler and its subscription are released. When a
    /// later selection is accepted while this one is still loading, this one
    /// is dropped and [`Error::Superseded`] is returned, so the mounted
    /// reconciler always belongs to the caller the ranking engine has selected.
    pub async fn select_caller(&self, phone_number: &str) -> Result<DetailView> {
        let (view, ticket) = {
            let mut latest = lock(&self.selection);
            let view = self.ranking.select(phone_number)?;
            *latest += 1;
            (view, *latest)
        };
        publish(
            &self.events,
            DashboardEvent::SelectedCallerUpdated { caller: view.selected },
        );

        let reconciler = Arc::new(DetailReconciler::new(
            self.backend.clone(),
            phone_number,
            self.questions.clone(),
        ));
        let inserts = self.backend.subscribe(reconciler.subscription_filter());

        if let Err(e) = reconciler.load().await {
            warn!("Session {}: call history load failed for {}: {}", self.id, phone_number, e);
        }

        let previous = {
            let latest = lock(&self.selection);
            if *latest != ticket {
                debug!(
                    "Session {}: selection of {} superseded before its history loaded",
                    self.id, phone_number
                );
                return Err(Error::Superseded(format!("selection of caller {}", phone_number)));
            }
            let task = TaskGuard::spawn(detail_loop(reconciler.clone(), self.events.clone(), inserts));
            lock(&self.detail).replace(DetailMount {
                reconciler: reconciler.clone(),
                _task: task,
            })
        };
        if let Some(previous) = previous {
            debug!(
                "Session {}: released detail for {}",
                self.id,
                previous.reconciler.phone_number()
            );
        }

        let detail = reconciler.view();
        publish(&self.events, DashboardEvent::CallHistoryUpdated { view: detail.clone() });
        Ok(detail)
    }

    /// Reconciler of the selected caller, if one is mounted
    pub fn detail(&self) -> Option<Arc<DetailReconciler>> {
        lock(&self.detail).as_ref().map(|m| m.reconciler.clone())
    }

    fn require_detail(&self) -> Result<Arc<DetailReconciler>> {
        self.detail()
            .ok_or_else(|| Error::NotFound("no caller selected".to_string()))
    }

    pub fn select_call(&self, call_id: i64) -> Result<DetailView> {
        let view = self.require_detail()?.select(call_id)?;
        publish(&self.events, DashboardEvent::CallHistoryUpdated { view: view.clone() });
        Ok(view)
    }

    /// Re-run the detail load; a failure is reported through the view status
    pub async fn retry_detail(&self) -> Result<DetailView> {
        let reconciler = self.require_detail()?;
        if let Err(e) = reconciler.retry().await {
            debug!("Session {}: retry failed: {}", self.id, e);
        }
        let view = reconciler.view();
        publish(&self.events, DashboardEvent::CallHistoryUpdated { view: view.clone() });
        Ok(view)
    }

    /// Stop background tasks and release every subscription
    pub fn close(&self) {
        lock(&self.ranking_task).take();
        lock(&self.detail).take();
        info!("Closed dashboard session {}", self.id);
    }
}

fn emit_ranking(ranking: &RankingEngine, events: &broadcast::Sender<DashboardEvent>) -> RankingView {
    let view = ranking.view();
    publish(events, DashboardEvent::CallersUpdated { view: view.clone() });
    if view.selected_phone.is_some() {
        publish(
            events,
            DashboardEvent::SelectedCallerUpdated {
                caller: view.selected.clone(),
            },
        );
    }
    view
}

async fn ranking_loop(
    session_id: Uuid,
    ranking: Arc<RankingEngine>,
    events: broadcast::Sender<DashboardEvent>,
    mut callers: Subscription,
    mut calls: Subscription,
) {
    loop {
        let delivery = tokio::select! {
            d = callers.next() => d,
            d = calls.next() => d,
        };
        match delivery {
            Some(Delivery::Change(event)) => {
                debug!("Session {}: {} triggers reload", session_id, event.event_type());
            }
            Some(Delivery::Missed(n)) => {
                warn!("Session {}: missed {} change events, reloading", session_id, n);
            }
            None => {
                debug!("Session {}: change feed closed", session_id);
                break;
            }
        }

        // Failures are logged by the engine and keep the previous snapshot
        if ranking.load().await.is_ok() {
            emit_ranking(&ranking, &events);
        }
    }
}

async fn detail_loop(
    reconciler: Arc<DetailReconciler>,
    events: broadcast::Sender<DashboardEvent>,
    mut inserts: Subscription,
) {
    while let Some(delivery) = inserts.next().await {
        let changed = match delivery {
            Delivery::Change(event) => match event.row {
                ChangeRow::Call(call) => reconciler.apply_insert(call),
                _ => false,
            },
            Delivery::Missed(n) => {
                warn!(
                    "Missed {} call inserts for {}, reloading history",
                    n,
                    reconciler.phone_number()
                );
                let _ = reconciler.load().await;
                true
            }
        };

        if changed {
            publish(
                &events,
                DashboardEvent::CallHistoryUpdated {
                    view: reconciler.view(),
                },
            );
        }
    }
}

/// Mounted sessions by id
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<DashboardSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<DashboardSession>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    /// Look up a session and mark it active
    pub async fn get(&self, id: Uuid) -> Result<Arc<DashboardSession>> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        session.touch();
        Ok(session)
    }

    /// Remove and close a session
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
        session.close();
        Ok(())
    }

    /// Close sessions with no SSE client that have been idle for `max_idle`
    ///
    /// Returns how many were closed.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| !s.has_listeners() && s.idle_for() >= max_idle)
            .map(|s| s.id())
            .collect();

        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                info!("Session {} idle for {:?} with no listeners", id, session.idle_for());
                session.close();
            }
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Periodically close abandoned sessions
///
/// Every `period`, sessions without an SSE client and idle for at least
/// `max_idle` are closed. Dropping the guard stops the sweep.
pub fn spawn_session_reaper(registry: Arc<SessionRegistry>, max_idle: Duration, period: Duration) -> TaskGuard {
    TaskGuard::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            let closed = registry.reap_idle(max_idle).await;
            if closed > 0 {
                debug!("Reaped {} idle sessions", closed);
            }
        }
    })
}
