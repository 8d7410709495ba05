//! Call Detail Reconciler
//!
//! Holds one caller's deduplicated call history, keeps the inspected call
//! stable across live inserts, and extracts key questions from transcripts.

mod dedupe;
mod key_questions;
mod reconciler;

pub use dedupe::dedupe_by_call_time;
pub use key_questions::{QuestionSet, DEFAULT_CANONICAL_QUESTIONS};
pub use reconciler::{CallHistory, DetailReconciler, DetailStatus, DetailView};
