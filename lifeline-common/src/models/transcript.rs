//! Speaker-tagged call transcripts

use serde::{Deserialize, Serialize};

/// Who spoke a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The automated agent handling the contact
    Ai,
    /// The caller
    User,
    /// Untagged or unrecognised line
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    /// Line text without the speaker tag
    pub text: String,
}

impl TranscriptLine {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

/// Ordered dialogue turns of one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new(lines: Vec<TranscriptLine>) -> Self {
        Self { lines }
    }

    /// Parse the raw `"AI: ..."` / `"User: ..."` form, one turn per line
    ///
    /// Speaker tags are matched case-insensitively. Blank lines are skipped and
    /// lines without a known tag are kept verbatim as [`Speaker::Other`].
    pub fn parse(raw: &str) -> Self {
        let lines = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(':') {
                Some((tag, rest)) => match tag.trim().to_ascii_lowercase().as_str() {
                    "ai" => TranscriptLine::new(Speaker::Ai, rest.trim()),
                    "user" => TranscriptLine::new(Speaker::User, rest.trim()),
                    _ => TranscriptLine::new(Speaker::Other, line),
                },
                None => TranscriptLine::new(Speaker::Other, line),
            })
            .collect();

        Self { lines }
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
