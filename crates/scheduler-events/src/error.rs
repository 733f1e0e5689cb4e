use thiserror::Error;

/// Errors surfaced by the event log.
///
/// `PersistenceBusy` is not an error in the sense of aborting anything —
/// the caller already got their synchronous `append` back — it is logged
/// and the batch stays queued for the next writer tick.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to (de)serialize event payload: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database busy after retry budget exhausted")]
    PersistenceBusy,

    #[error("database unusable: {0}")]
    PersistenceFatal(String),
}
