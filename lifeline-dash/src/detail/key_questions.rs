//! Key Q&A extraction from call transcripts

use lifeline_common::models::{Speaker, Transcript, TranscriptLine};

/// Scripted prompts the agent asks on most calls
pub const DEFAULT_CANONICAL_QUESTIONS: &[&str] = &[
    "How are you feeling?",
    "Are you safe right now?",
    "Are you thinking about hurting yourself?",
    "Do you have someone you can talk to?",
    "Have you taken anything today?",
];

/// Ordered set of canonical questions to look for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: Vec<String>,
}

impl Default for QuestionSet {
    fn default() -> Self {
        Self::new(DEFAULT_CANONICAL_QUESTIONS.iter().map(|q| q.to_string()))
    }
}

impl QuestionSet {
    /// Blank questions are dropped since they would match every line
    pub fn new(questions: impl IntoIterator<Item = String>) -> Self {
        Self {
            questions: questions
                .into_iter()
                .filter(|q| !q.trim().is_empty())
                .collect(),
        }
    }

    /// Configured list, or the built-in one when none is configured
    pub fn from_config(questions: Option<Vec<String>>) -> Self {
        match questions {
            Some(questions) => Self::new(questions),
            None => Self::default(),
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Extract the first Q&A pair for every canonical question
    ///
    /// Each AI line containing a not-yet-found question is emitted, followed
    /// by the next line when the caller answered it. Output keeps transcript
    /// order. Repeat questions and everything else are dropped.
    pub fn extract(&self, transcript: &Transcript) -> Vec<TranscriptLine> {
        let lines = transcript.lines();
        let mut found = vec![false; self.questions.len()];
        let mut out = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if line.speaker != Speaker::Ai {
                continue;
            }

            let mut matched = false;
            for (q, question) in self.questions.iter().enumerate() {
                if !found[q] && line.text.contains(question.as_str()) {
                    found[q] = true;
                    matched = true;
                }
            }
            if !matched {
                continue;
            }

            out.push(line.clone());
            if let Some(next) = lines.get(idx + 1) {
                if next.speaker == Speaker::User {
                    out.push(next.clone());
                }
            }

            if found.iter().all(|f| *f) {
                break;
            }
        }

        out
    }
}
