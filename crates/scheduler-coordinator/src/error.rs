use thiserror::Error;

use scheduler_core::CoreError;
use scheduler_events::EventLogError;

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Model(#[from] CoreError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),

    #[error("no action to undo")]
    NothingToUndo,

    #[error("no action to redo")]
    NothingToRedo,

    #[error("{0} has no previous sibling to indent under")]
    NoPreviousSibling(String),

    #[error("{0} is already top-level, nothing to outdent to")]
    AlreadyTopLevel(String),
}
