//! Database initialization, migrations and row schemas

pub mod init;
pub mod migrations;
pub mod rows;

pub use init::*;
pub use migrations::run_migrations;
pub use rows::{CallRow, CallerRow};
