use std::time::Duration;

/// Tunables for the event log writer, snapshot cadence, and undo depth.
///
/// Pulled out into its own struct (rather than constants) so tests can
/// shrink the thresholds without touching engine code, the way
/// `AnalysisConfig` parameterizes solver behavior in the teacher repo.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Snapshot once this many events have persisted since the last one.
    pub snapshot_event_threshold: u64,
    /// Snapshot on this timer regardless of event count.
    pub snapshot_interval: Duration,
    /// Max events the writer picks up per `BEGIN IMMEDIATE` transaction.
    pub writer_batch_size: usize,
    /// How often the writer wakes to drain the queue.
    pub writer_interval: Duration,
    /// Retries on `SQLITE_BUSY`/`SQLITE_LOCKED` before leaving the batch queued.
    pub busy_retry_attempts: u32,
    /// Backoff between busy retries.
    pub busy_retry_backoff: Duration,
    /// Bounded undo/redo stack depth.
    pub undo_stack_depth: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            snapshot_event_threshold: 1000,
            snapshot_interval: Duration::from_secs(5 * 60),
            writer_batch_size: 50,
            writer_interval: Duration::from_millis(200),
            busy_retry_attempts: 3,
            busy_retry_backoff: Duration::from_millis(50),
            undo_stack_depth: 50,
        }
    }
}
