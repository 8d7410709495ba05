//! Sort keys and the toggle rules between them

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use lifeline_common::models::UrgencyLevel;

use super::RankedCaller;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Urgency,
    LastCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// Active sort key and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::LastCall,
            order: SortOrder::Descending,
        }
    }
}

impl SortState {
    /// Apply a click on `key`: the active key flips direction, a new key
    /// starts descending
    pub fn toggle(self, key: SortKey) -> Self {
        if key == self.key {
            Self {
                key,
                order: self.order.flipped(),
            }
        } else {
            Self {
                key,
                order: SortOrder::Descending,
            }
        }
    }
}

/// Urgency as a sort rank; absent urgency ranks as LOW
pub fn urgency_rank(urgency: Option<UrgencyLevel>) -> u8 {
    urgency.unwrap_or(UrgencyLevel::Low).rank()
}

/// Stable sort by the active key; equal keys keep their incoming order
pub fn sort_callers(callers: &mut [RankedCaller], state: SortState) {
    callers.sort_by(|a, b| {
        let ordering = compare(state.key, a, b);
        match state.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

fn compare(key: SortKey, a: &RankedCaller, b: &RankedCaller) -> Ordering {
    match key {
        SortKey::Urgency => urgency_rank(a.urgency).cmp(&urgency_rank(b.urgency)),
        SortKey::LastCall => a.caller.last_call.cmp(&b.caller.last_call),
    }
}
