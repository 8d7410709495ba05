//! Change notifications for backend tables
//!
//! Every write to `callers` or `calls` is published as a [`ChangeEvent`] on the
//! [`EventBus`]. Subscribers filter on table, event kind and row columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{Call, Caller};

/// Backend table a change happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Callers,
    Calls,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Callers => "callers",
            Table::Calls => "calls",
        }
    }
}

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// The changed row, in its explicit schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeRow {
    Caller(Caller),
    Call(Call),
    /// Only the key survives a caller deletion
    CallerRemoved { phone_number: String },
}

impl ChangeRow {
    /// Column value used by equality predicates
    ///
    /// Returns `None` when the row has no such column.
    pub fn column(&self, name: &str) -> Option<String> {
        match (self, name) {
            (ChangeRow::Caller(caller), "phone_number") => Some(caller.phone_number.clone()),
            (ChangeRow::CallerRemoved { phone_number }, "phone_number") => {
                Some(phone_number.clone())
            }
            (ChangeRow::Call(call), "phone_number") => Some(call.phone_number.clone()),
            (ChangeRow::Call(call), "id") => Some(call.id.to_string()),
            (ChangeRow::Call(call), "source") => call.source.map(|s| s.as_str().to_string()),
            (ChangeRow::Call(call), "urgency") => call.urgency.map(|u| u.as_str().to_string()),
            _ => None,
        }
    }
}

/// A single published row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row: ChangeRow,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, row: ChangeRow) -> Self {
        Self {
            table,
            kind,
            row,
            timestamp: Utc::now(),
        }
    }

    /// Short name for logging, e.g. `calls.insert`
    pub fn event_type(&self) -> String {
        let kind = match self.kind {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        format!("{}.{}", self.table.as_str(), kind)
    }
}

/// Central distribution bus for change events
///
/// Uses `tokio::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block writers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lag detection for slow subscribers
///
/// # Examples
///
/// ```
/// use lifeline_common::events::{ChangeEvent, ChangeKind, ChangeRow, EventBus, Table};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(ChangeEvent::new(
///     Table::Callers,
///     ChangeKind::Delete,
///     ChangeRow::CallerRemoved { phone_number: "555".to_string() },
/// ));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.event_type(), "callers.delete");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChangeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ChangeEvent,
    ) -> Result<usize, broadcast::error::SendError<ChangeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
