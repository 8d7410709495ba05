//! Call entity and its fixed vocabularies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::Transcript;
use crate::Error;

/// Ordered risk classification of a call: LOW < MEDIUM < IMMINENT
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Low,
    Medium,
    Imminent,
}

impl UrgencyLevel {
    /// Numeric rank used for ordering (LOW=1, MEDIUM=2, IMMINENT=3)
    pub fn rank(self) -> u8 {
        match self {
            UrgencyLevel::Low => 1,
            UrgencyLevel::Medium => 2,
            UrgencyLevel::Imminent => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UrgencyLevel::Low => "LOW",
            UrgencyLevel::Medium => "MEDIUM",
            UrgencyLevel::Imminent => "IMMINENT",
        }
    }
}

impl fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrgencyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(UrgencyLevel::Low),
            "MEDIUM" => Ok(UrgencyLevel::Medium),
            "IMMINENT" => Ok(UrgencyLevel::Imminent),
            other => Err(Error::InvalidInput(format!("unknown urgency level: {}", other))),
        }
    }
}

/// Medium a call arrived through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceChannel {
    Phone,
    Chat,
}

impl SourceChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceChannel::Phone => "phone",
            SourceChannel::Chat => "chat",
        }
    }
}

impl fmt::Display for SourceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceChannel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phone" => Ok(SourceChannel::Phone),
            "chat" => Ok(SourceChannel::Chat),
            other => Err(Error::InvalidInput(format!("unknown source channel: {}", other))),
        }
    }
}

/// Categorical tag attached to a call, rendered as a badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFlag {
    SuicidalIdeation,
    SelfHarm,
    SubstanceUse,
    Violence,
    Abuse,
    Isolation,
    Medical,
}

impl CallFlag {
    pub const ALL: [CallFlag; 7] = [
        CallFlag::SuicidalIdeation,
        CallFlag::SelfHarm,
        CallFlag::SubstanceUse,
        CallFlag::Violence,
        CallFlag::Abuse,
        CallFlag::Isolation,
        CallFlag::Medical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CallFlag::SuicidalIdeation => "suicidal_ideation",
            CallFlag::SelfHarm => "self_harm",
            CallFlag::SubstanceUse => "substance_use",
            CallFlag::Violence => "violence",
            CallFlag::Abuse => "abuse",
            CallFlag::Isolation => "isolation",
            CallFlag::Medical => "medical",
        }
    }
}

impl FromStr for CallFlag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        CallFlag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown call flag: {}", s)))
    }
}

/// Emotion name to score, as produced by call analysis
pub type EmotionScores = BTreeMap<String, f64>;

/// One sample of the sentiment-over-time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    /// Seconds from the start of the call
    pub offset_secs: f64,
    /// Sentiment score, negative to positive
    pub score: f64,
}

/// A single analysed contact, belonging to one caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: i64,
    pub phone_number: String,
    pub call_time: DateTime<Utc>,
    pub duration_secs: Option<i64>,
    pub source: Option<SourceChannel>,
    pub urgency: Option<UrgencyLevel>,
    pub transcript: Option<Transcript>,
    pub summary: Option<String>,
    pub emotions: Option<EmotionScores>,
    pub sentiment: Option<Vec<SentimentPoint>>,
    pub flags: Vec<CallFlag>,
}

/// Payload for recording a new call
///
/// The transcript is accepted in its raw `"AI: ..."` / `"User: ..."` text form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCall {
    pub phone_number: String,
    pub call_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub source: Option<SourceChannel>,
    #[serde(default)]
    pub urgency: Option<UrgencyLevel>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub emotions: Option<EmotionScores>,
    #[serde(default)]
    pub sentiment: Option<Vec<SentimentPoint>>,
    #[serde(default)]
    pub flags: Vec<CallFlag>,
}
