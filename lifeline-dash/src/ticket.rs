//! Request tickets for discarding out-of-order load responses
//!
//! Every load takes a ticket before it suspends on the backend. When the
//! response comes back it is applied only if no newer ticket has been applied
//! in the meantime.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic ticket issuer
#[derive(Debug, Default)]
pub struct RequestTickets {
    issued: AtomicU64,
}

impl RequestTickets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next ticket; the first one is 1
    pub fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Most recently issued ticket, 0 before the first
    pub fn current(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

/// Result of a load that reached the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The response replaced local state
    Applied,
    /// A newer load had already been applied; the response was dropped
    Stale,
}

/// Decide whether a response for `ticket` may replace state last written by `applied`
pub fn is_current(ticket: u64, applied: u64) -> bool {
    ticket > applied
}
