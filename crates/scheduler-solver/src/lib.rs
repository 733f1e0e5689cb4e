//! # scheduler-solver
//!
//! Critical Path Method engine: forward pass, backward pass, float, and
//! critical-path marking over `scheduler-core`'s `Task`/`Calendar` types.
//!
//! ```
//! use chrono::NaiveDate;
//! use scheduler_core::Task;
//! use scheduler_solver::cpm;
//!
//! let tasks = vec![Task::new("a", "A").duration(5)];
//! let today = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
//! let output = cpm::calculate(&tasks, &scheduler_core::Calendar::default(), today);
//! assert!(output.schedules["a"].is_critical);
//! ```

pub mod cpm;
pub mod dag;

pub use cpm::{calculate, CalcStats, CpmOutput, MAX_CPM_ITERATIONS};
