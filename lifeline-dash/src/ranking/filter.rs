//! Source-channel category filter

use serde::{Deserialize, Serialize};

use lifeline_common::models::SourceChannel;

use super::RankedCaller;

/// Single-select filter over a caller's derived source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFilter {
    #[default]
    All,
    Phone,
    Chat,
}

impl SourceFilter {
    /// Callers with an unknown source only pass `All`
    pub fn matches(self, caller: &RankedCaller) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Phone => caller.source == Some(SourceChannel::Phone),
            SourceFilter::Chat => caller.source == Some(SourceChannel::Chat),
        }
    }

    /// Keep matching callers, preserving order
    pub fn apply(self, callers: Vec<RankedCaller>) -> Vec<RankedCaller> {
        if self == SourceFilter::All {
            return callers;
        }
        callers.into_iter().filter(|c| self.matches(c)).collect()
    }
}
