use thiserror::Error;

/// Errors surfaced by the domain model.
///
/// Per the error-handling design, these are values returned from fallible
/// operations, never panics. Conditions that the spec says to *silently*
/// handle (derived-field writes, unknown replay events) are not represented
/// here at all — they are logged and swallowed at the call site instead of
/// being modeled as an `Err` variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("task {0} does not exist")]
    InvalidRef(String),

    #[error("operation on {0} would create a cycle: {1}")]
    CycleRejected(String, String),
}
