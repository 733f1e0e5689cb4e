//! # scheduler-events
//!
//! Durable event log (SQLite-backed materialized view, write-behind writer,
//! snapshot/recovery) and bounded undo/redo history over the events
//! `scheduler-core`'s `TaskModel` produces.

pub mod config;
pub mod error;
pub mod event_log;
pub mod history;

pub use config::SchedulerConfig;
pub use error::EventLogError;
pub use event_log::EventLog;
pub use history::{HistoryManager, UndoableAction};
