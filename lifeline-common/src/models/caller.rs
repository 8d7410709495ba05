//! Caller entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person who has contacted the service, keyed by phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Unique, stable identity
    pub phone_number: String,
    /// Display name, if the caller gave one
    pub name: Option<String>,
    /// Free-text note about earlier contact history
    pub previous_history: Option<String>,
    /// Free-text note, only present when disclosed
    pub sexual_orientation: Option<String>,
    /// Time of the caller's most recent contact
    pub last_call: DateTime<Utc>,
}

/// Mutable caller attributes accepted by the ingest endpoint
///
/// `last_call` defaults to "now" when the caller is first created and is left
/// untouched on updates when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallerProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub previous_history: Option<String>,
    #[serde(default)]
    pub sexual_orientation: Option<String>,
    #[serde(default)]
    pub last_call: Option<DateTime<Utc>>,
}
