//! Caller Ranking Engine
//!
//! Keeps every known caller joined with the urgency and source of their most
//! recent call, and produces sorted, filtered views of that list.

mod engine;
mod filter;
mod sort;

pub use engine::{RankingEngine, RankingView};
pub use filter::SourceFilter;
pub use sort::{sort_callers, urgency_rank, SortKey, SortOrder, SortState};

use lifeline_common::models::{Call, Caller, SourceChannel, UrgencyLevel};
use serde::{Deserialize, Serialize};

/// A caller annotated with fields joined from their most recent call
///
/// `urgency` and `source` are `None` when the caller has no calls, the latest
/// call lacks the field, or the lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCaller {
    #[serde(flatten)]
    pub caller: Caller,
    pub urgency: Option<UrgencyLevel>,
    pub source: Option<SourceChannel>,
}

impl RankedCaller {
    pub fn new(caller: Caller, latest_call: Option<&Call>) -> Self {
        Self {
            caller,
            urgency: latest_call.and_then(|c| c.urgency),
            source: latest_call.and_then(|c| c.source),
        }
    }

    pub fn phone_number(&self) -> &str {
        &self.caller.phone_number
    }
}
