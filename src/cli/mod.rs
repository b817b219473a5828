//! Terminal front end: tables, spinners and the command handlers.

pub mod history;
pub mod lookup;
pub mod setup;
pub mod summary;
pub mod ui;
