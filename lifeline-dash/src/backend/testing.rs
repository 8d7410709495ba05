//! In-memory backend for unit tests
//!
//! Supports injected failures and per-request delays so tests can exercise
//! partial failures and out-of-order responses.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use lifeline_common::events::{ChangeEvent, ChangeKind, ChangeRow, EventBus, Table};
use lifeline_common::models::{Call, Caller, SourceChannel, UrgencyLevel};
use lifeline_common::{Error, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{Backend, ChangeFilter, Subscription};

pub(crate) fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
}

pub(crate) fn caller(phone: &str, last_call: DateTime<Utc>) -> Caller {
    Caller {
        phone_number: phone.to_string(),
        name: None,
        previous_history: None,
        sexual_orientation: None,
        last_call,
    }
}

pub(crate) fn call(
    id: i64,
    phone: &str,
    call_time: DateTime<Utc>,
    urgency: Option<UrgencyLevel>,
    source: Option<SourceChannel>,
) -> Call {
    Call {
        id,
        phone_number: phone.to_string(),
        call_time,
        duration_secs: None,
        source,
        urgency,
        transcript: None,
        summary: None,
        emotions: None,
        sentiment: None,
        flags: Vec::new(),
    }
}

#[derive(Default)]
struct Store {
    callers: Vec<Caller>,
    calls: HashMap<String, Vec<Call>>,
}

pub(crate) struct StubBackend {
    store: Mutex<Store>,
    bus: EventBus,
    fail_callers: AtomicBool,
    fail_calls_for: Mutex<HashSet<String>>,
    caller_delays: Mutex<VecDeque<Duration>>,
    call_delays: Mutex<VecDeque<Duration>>,
    caller_fetches: AtomicUsize,
}

impl StubBackend {
    pub(crate) fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            bus: EventBus::new(64),
            fail_callers: AtomicBool::new(false),
            fail_calls_for: Mutex::new(HashSet::new()),
            caller_delays: Mutex::new(VecDeque::new()),
            call_delays: Mutex::new(VecDeque::new()),
            caller_fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Add or replace a caller without publishing
    pub(crate) fn put_caller(&self, caller: Caller) {
        let mut store = self.store.lock().unwrap();
        store.callers.retain(|c| c.phone_number != caller.phone_number);
        store.callers.push(caller);
    }

    /// Store a call without publishing
    pub(crate) fn put_call(&self, call: Call) {
        let mut store = self.store.lock().unwrap();
        store.calls.entry(call.phone_number.clone()).or_default().push(call);
    }

    /// Store a call and publish its insert
    pub(crate) fn publish_call(&self, call: Call) {
        self.put_call(call.clone());
        self.bus
            .emit_lossy(ChangeEvent::new(Table::Calls, ChangeKind::Insert, ChangeRow::Call(call)));
    }

    pub(crate) fn publish_caller(&self, caller: Caller, kind: ChangeKind) {
        self.put_caller(caller.clone());
        self.bus
            .emit_lossy(ChangeEvent::new(Table::Callers, kind, ChangeRow::Caller(caller)));
    }

    pub(crate) fn set_fail_callers(&self, fail: bool) {
        self.fail_callers.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_calls_for(&self, phone: &str, fail: bool) {
        let mut set = self.fail_calls_for.lock().unwrap();
        if fail {
            set.insert(phone.to_string());
        } else {
            set.remove(phone);
        }
    }

    /// Delay the next caller-list fetch after it has taken its snapshot
    pub(crate) fn push_caller_delay(&self, delay: Duration) {
        self.caller_delays.lock().unwrap().push_back(delay);
    }

    /// Delay the next call fetch after it has taken its snapshot
    pub(crate) fn push_call_delay(&self, delay: Duration) {
        self.call_delays.lock().unwrap().push_back(delay);
    }

    pub(crate) fn caller_fetches(&self) -> usize {
        self.caller_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn fetch_callers(&self) -> Result<Vec<Caller>> {
        self.caller_fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self.fail_callers.load(Ordering::SeqCst);
        let snapshot = {
            let store = self.store.lock().unwrap();
            let mut callers = store.callers.clone();
            callers.sort_by(|a, b| b.last_call.cmp(&a.last_call));
            callers
        };
        let delay = self.caller_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(Error::Fetch("callers".to_string()));
        }
        Ok(snapshot)
    }

    async fn fetch_calls(&self, phone_number: &str, limit: Option<u32>) -> Result<Vec<Call>> {
        let failing = self.fail_calls_for.lock().unwrap().contains(phone_number);
        let snapshot = {
            let store = self.store.lock().unwrap();
            let mut calls = store.calls.get(phone_number).cloned().unwrap_or_default();
            calls.sort_by(|a, b| b.call_time.cmp(&a.call_time));
            if let Some(limit) = limit {
                calls.truncate(limit as usize);
            }
            calls
        };
        let delay = self.call_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(Error::Fetch(format!("calls for {}", phone_number)));
        }
        Ok(snapshot)
    }

    fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription::new(self.bus.subscribe(), filter)
    }
}
