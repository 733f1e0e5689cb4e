//! # scheduler-core
//!
//! Domain model for the CPM scheduling engine: tasks, dependencies, the
//! working-day calendar, fractional-index ordering keys, the event/undo
//! vocabulary, and the in-memory `TaskModel` store that enforces the
//! mutation contract (field whitelisting, cycle rejection, forward/backward
//! event pairs) on top of them.
//!
//! `scheduler-solver` consumes this crate's types to compute schedules;
//! `scheduler-events` persists the events this crate produces; neither
//! dependency runs the other way.

pub mod calendar;
pub mod dependency;
pub mod error;
pub mod event;
pub mod model;
pub mod ordering_key;
pub mod task;
pub mod trade_partner;

pub use calendar::{Calendar, CalendarException};
pub use dependency::{Dependency, LinkType};
pub use error::CoreError;
pub use event::{Event, EventKind, EventPair, FieldChange, Snapshot};
pub use model::{MutationOutcome, TaskModel};
pub use task::{ConstraintType, DerivedSchedule, Health, RowType, SchedulingMode, Task, TaskPatch};
pub use trade_partner::TradePartner;

pub type CoreResult<T> = Result<T, CoreError>;
