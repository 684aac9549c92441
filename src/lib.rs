//! Core library surface for the Library Manager TUI application.
//!
//! The binary only wires these pieces together; everything it needs is
//! re-exported here.
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod ui;
pub mod validation;
pub mod worker;

pub use config::AppConfig;
pub use db::{seed_default_admin, Database, DbTarget};
pub use error::{LibraryError, Result};

/// Records manipulated by the panels.
pub use models::{Admin, Book, Staff, Stats};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
