//! Ranking engine state and operations

use futures::future::join_all;
use lifeline_common::models::Call;
use lifeline_common::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::{sort_callers, RankedCaller, SortKey, SortState, SourceFilter};
use crate::backend::Backend;
use crate::ticket::{is_current, LoadOutcome, RequestTickets};

/// A sorted, filtered snapshot handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingView {
    pub callers: Vec<RankedCaller>,
    pub sort: SortState,
    pub filter: SourceFilter,
    /// Phone number of the selected caller, if any
    pub selected_phone: Option<String>,
    /// Latest snapshot of the selected caller; `None` if it is no longer listed
    pub selected: Option<RankedCaller>,
    /// Callers known before filtering
    pub total: usize,
    /// False until the first successful load
    pub loaded: bool,
}

#[derive(Default)]
struct RankingState {
    /// Callers in backend order (most recent call first)
    callers: Vec<RankedCaller>,
    loaded: bool,
    sort: SortState,
    filter: SourceFilter,
    selected: Option<String>,
    applied_ticket: u64,
}

pub struct RankingEngine {
    backend: Arc<dyn Backend>,
    state: Mutex<RankingState>,
    tickets: RequestTickets,
}

impl RankingEngine {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(RankingState::default()),
            tickets: RequestTickets::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, RankingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch every caller and join each with its most recent call
    ///
    /// On a caller-list failure the previous snapshot stays in place and the
    /// error is returned. A failed per-caller lookup only blanks that caller's
    /// urgency and source.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let ticket = self.tickets.issue();

        let callers = match self.backend.fetch_callers().await {
            Ok(callers) => callers,
            Err(e) => {
                warn!("Caller list fetch failed, keeping previous snapshot: {}", e);
                return Err(e);
            }
        };

        let mut seen = HashSet::new();
        let callers: Vec<_> = callers
            .into_iter()
            .filter(|c| seen.insert(c.phone_number.clone()))
            .collect();

        let latest = join_all(callers.iter().map(|c| self.latest_call(&c.phone_number))).await;

        let ranked: Vec<RankedCaller> = callers
            .into_iter()
            .zip(latest)
            .map(|(caller, call)| RankedCaller::new(caller, call.as_ref()))
            .collect();

        let mut state = self.state();
        if !is_current(ticket, state.applied_ticket) {
            debug!(
                "Discarding stale caller list (ticket {} < applied {})",
                ticket, state.applied_ticket
            );
            return Ok(LoadOutcome::Stale);
        }

        info!("Loaded {} callers", ranked.len());
        state.callers = ranked;
        state.loaded = true;
        state.applied_ticket = ticket;
        Ok(LoadOutcome::Applied)
    }

    async fn latest_call(&self, phone_number: &str) -> Option<Call> {
        match self.backend.fetch_calls(phone_number, Some(1)).await {
            Ok(calls) => calls.into_iter().next(),
            Err(e) => {
                warn!("Most recent call lookup failed for {}: {}", phone_number, e);
                None
            }
        }
    }

    /// Click on a sort key
    pub fn sort_by(&self, key: SortKey) -> RankingView {
        {
            let mut state = self.state();
            state.sort = state.sort.toggle(key);
        }
        self.view()
    }

    pub fn set_filter(&self, filter: SourceFilter) -> RankingView {
        self.state().filter = filter;
        self.view()
    }

    /// Mark a listed caller as selected
    pub fn select(&self, phone_number: &str) -> Result<RankingView> {
        {
            let mut state = self.state();
            if !state.callers.iter().any(|c| c.phone_number() == phone_number) {
                return Err(Error::NotFound(format!("caller {}", phone_number)));
            }
            state.selected = Some(phone_number.to_string());
        }
        Ok(self.view())
    }

    /// Current snapshot of the selected caller
    pub fn selected(&self) -> Option<RankedCaller> {
        let state = self.state();
        selected_in(&state)
    }

    pub fn view(&self) -> RankingView {
        let state = self.state();

        let mut callers = state.callers.clone();
        sort_callers(&mut callers, state.sort);
        let callers = state.filter.apply(callers);

        RankingView {
            callers,
            sort: state.sort,
            filter: state.filter,
            selected_phone: state.selected.clone(),
            selected: selected_in(&state),
            total: state.callers.len(),
            loaded: state.loaded,
        }
    }
}

fn selected_in(state: &RankingState) -> Option<RankedCaller> {
    let phone = state.selected.as_deref()?;
    state
        .callers
        .iter()
        .find(|c| c.phone_number() == phone)
        .cloned()
}
