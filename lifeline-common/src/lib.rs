//! # Lifeline Common Library
//!
//! Shared code for the Lifeline dashboard crates including:
//! - Caller and call models, plus the row schemas they are decoded from
//! - Database initialization and migrations
//! - Change-notification bus (ChangeEvent + EventBus)
//! - Configuration loading and root folder resolution
//! - SSE stream helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod time;

pub use error::{Error, Result};
