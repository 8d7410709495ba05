//! Row schemas for the `callers` and `calls` tables
//!
//! Rows are decoded with loose types and then converted into the domain
//! models. Conversion never fails the whole row: an unreadable optional field
//! is logged and becomes `None`.

use serde::de::DeserializeOwned;
use sqlx::FromRow;
use tracing::warn;

use crate::models::{Call, CallFlag, Caller, Transcript};
use crate::time::from_millis;
use crate::{Error, Result};

/// Column list matching [`CallerRow`]
pub const CALLER_COLUMNS: &str =
    "phone_number, name, previous_history, sexual_orientation, last_call_ms";

/// Column list matching [`CallRow`]
pub const CALL_COLUMNS: &str = "id, phone_number, call_time_ms, duration_secs, source, urgency, \
     transcript, summary, emotions, sentiment, flags";

#[derive(Debug, Clone, FromRow)]
pub struct CallerRow {
    pub phone_number: String,
    pub name: Option<String>,
    pub previous_history: Option<String>,
    pub sexual_orientation: Option<String>,
    pub last_call_ms: i64,
}

impl TryFrom<CallerRow> for Caller {
    type Error = Error;

    fn try_from(row: CallerRow) -> Result<Self> {
        let last_call = from_millis(row.last_call_ms).ok_or_else(|| {
            Error::Internal(format!(
                "caller {} has out-of-range last_call_ms {}",
                row.phone_number, row.last_call_ms
            ))
        })?;

        Ok(Caller {
            phone_number: row.phone_number,
            name: non_blank(row.name),
            previous_history: non_blank(row.previous_history),
            sexual_orientation: non_blank(row.sexual_orientation),
            last_call,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CallRow {
    pub id: i64,
    pub phone_number: String,
    pub call_time_ms: i64,
    pub duration_secs: Option<i64>,
    pub source: Option<String>,
    pub urgency: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub emotions: Option<String>,
    pub sentiment: Option<String>,
    pub flags: Option<String>,
}

impl TryFrom<CallRow> for Call {
    type Error = Error;

    fn try_from(row: CallRow) -> Result<Self> {
        let call_time = from_millis(row.call_time_ms).ok_or_else(|| {
            Error::Internal(format!(
                "call {} has out-of-range call_time_ms {}",
                row.id, row.call_time_ms
            ))
        })?;

        let id = row.id;
        let source = non_blank(row.source).and_then(|raw| match raw.parse() {
            Ok(source) => Some(source),
            Err(e) => {
                warn!("call {}: {}", id, e);
                None
            }
        });
        let urgency = non_blank(row.urgency).and_then(|raw| match raw.parse() {
            Ok(urgency) => Some(urgency),
            Err(e) => {
                warn!("call {}: {}", id, e);
                None
            }
        });

        let flags = parse_json::<Vec<String>>(id, "flags", row.flags)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match raw.parse::<CallFlag>() {
                Ok(flag) => Some(flag),
                Err(e) => {
                    warn!("call {}: dropping flag: {}", id, e);
                    None
                }
            })
            .collect();

        Ok(Call {
            id,
            phone_number: row.phone_number,
            call_time,
            duration_secs: row.duration_secs.filter(|secs| *secs >= 0),
            source,
            urgency,
            transcript: non_blank(row.transcript)
                .map(|raw| Transcript::parse(&raw))
                .filter(|t| !t.is_empty()),
            summary: non_blank(row.summary),
            emotions: parse_json(id, "emotions", row.emotions),
            sentiment: parse_json(id, "sentiment", row.sentiment),
            flags,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_json<T: DeserializeOwned>(id: i64, column: &str, raw: Option<String>) -> Option<T> {
    let raw = non_blank(raw)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("call {}: unreadable {} column: {}", id, column, e);
            None
        }
    }
}
