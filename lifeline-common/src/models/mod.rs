//! Domain models for callers and calls
//!
//! These are the explicit contracts the dashboard works with. Backend rows are
//! decoded into them by [`crate::db::rows`], which applies the defaulting rules:
//! anything absent or unrecognised becomes `None` (or an empty list), never a
//! guessed value.

mod call;
mod caller;
mod transcript;

pub use call::{Call, CallFlag, EmotionScores, NewCall, SentimentPoint, SourceChannel, UrgencyLevel};
pub use caller::{Caller, CallerProfile};
pub use transcript::{Speaker, Transcript, TranscriptLine};
