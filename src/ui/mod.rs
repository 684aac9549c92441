//! Ratatui front end: the login screen plus the dashboard, books and staff
//! panels. All database work goes through [`crate::worker`].

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
