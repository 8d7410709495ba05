//! Backend collaborator contract
//!
//! The dashboard only reads through this trait: row queries over `callers` and
//! `calls`, plus change-notification subscriptions filtered by table, event
//! kind and an optional column equality predicate.

use async_trait::async_trait;
use lifeline_common::events::{ChangeEvent, ChangeKind, Table};
use lifeline_common::models::{Call, Caller};
use lifeline_common::Result;
use tokio::sync::broadcast::{self, error::RecvError};

mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

pub use sqlite::SqliteBackend;

/// Which change kinds a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    InsertOnly,
}

/// Equality predicate on a changed row's column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEq {
    pub column: String,
    pub value: String,
}

/// Subscription parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub events: EventFilter,
    pub predicate: Option<ColumnEq>,
}

impl ChangeFilter {
    /// Every insert, update and delete on `table`
    pub fn all(table: Table) -> Self {
        Self {
            table,
            events: EventFilter::All,
            predicate: None,
        }
    }

    /// Inserts on `table` only
    pub fn inserts(table: Table) -> Self {
        Self {
            table,
            events: EventFilter::InsertOnly,
            predicate: None,
        }
    }

    /// Restrict to rows whose `column` equals `value`
    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicate = Some(ColumnEq {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        if self.events == EventFilter::InsertOnly && event.kind != ChangeKind::Insert {
            return false;
        }
        match &self.predicate {
            Some(eq) => event.row.column(&eq.column).as_deref() == Some(eq.value.as_str()),
            None => true,
        }
    }
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A change matching the filter
    Change(ChangeEvent),
    /// The subscriber fell behind and this many events were dropped unseen
    Missed(u64),
}

/// A live change-notification registration
///
/// Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>, filter: ChangeFilter) -> Self {
        Self { rx, filter }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Wait for the next matching delivery
    ///
    /// Returns `None` once the backend has shut down. Cancel-safe, so it can be
    /// raced in `tokio::select!`.
    pub async fn next(&mut self) -> Option<Delivery> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(Delivery::Change(event)),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => return Some(Delivery::Missed(missed)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Read side of the hosted data store
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// All callers, most recent `last_call` first
    async fn fetch_callers(&self) -> Result<Vec<Caller>>;

    /// Calls for one phone number, most recent first, optionally limited
    async fn fetch_calls(&self, phone_number: &str, limit: Option<u32>) -> Result<Vec<Call>>;

    /// Register for change notifications
    fn subscribe(&self, filter: ChangeFilter) -> Subscription;
}
