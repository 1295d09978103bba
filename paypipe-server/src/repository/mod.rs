//! Repository Module
//!
//! In-memory storage for the server.
//! Each repository owns the state of one kind of record.

pub mod history;
pub mod run;

pub use history::HistoryLog;
pub use run::RunStore;
