//! Append-only event log with a write-behind SQLite materialized view.
//!
//! `append` only ever touches an in-RAM queue and returns immediately; a
//! background writer task drains it in batches under `BEGIN IMMEDIATE`
//! transactions. No teacher analogue exists for this (utf8proj is a
//! file-in/file-out CLI with no persistence layer) — the bundled-sqlite
//! style is grounded on the Cargo.toml dependency choices of
//! `jackhale98-tessera` and `preedep-jobweaver-rs`, both of which carry
//! `rusqlite` for local materialized state.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use scheduler_core::{
    Calendar, ConstraintType, Dependency, Event, EventKind, RowType, SchedulingMode, Snapshot, Task, TaskModel,
    TradePartner,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::SchedulerConfig;
use crate::error::EventLogError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY,
    target_id TEXT,
    timestamp TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
CREATE INDEX IF NOT EXISTS idx_events_target_id ON events(target_id);

CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    last_event_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    parent_id TEXT,
    sort_key TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_parent_sort ON tasks(parent_id, sort_key);

CREATE TABLE IF NOT EXISTS calendar (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS trade_partners (
    id TEXT PRIMARY KEY,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS task_trade_partners (
    task_id TEXT NOT NULL,
    partner_id TEXT NOT NULL,
    PRIMARY KEY (task_id, partner_id)
);
";

/// Fields a `TASK_UPDATED` event is allowed to touch in the materialized
/// view, named the way the event carries them (camelCase, matching `Task`'s
/// wire serialization). Anything else (a derived field, or an unrecognized
/// one) is dropped with a debug log rather than bound into the `UPDATE`.
const TASK_UPDATE_FIELDS: &[&str] = &[
    "name",
    "notes",
    "duration",
    "constraintType",
    "constraintDate",
    "schedulingMode",
    "progress",
    "tradePartnerIds",
    "baselineStart",
    "baselineFinish",
    "baselineDuration",
    "actualStart",
    "actualFinish",
    "remainingDuration",
    "dependencies",
];

/// `TASK_UPDATE_FIELDS` plus the two structural fields `TaskMoved` touches,
/// paired with the snake_case key the materialized `tasks.payload` uses for
/// the same field (see `TaskRow`). Events and the wire format stay camelCase;
/// only the persisted row is snake_case, so every field written into it via
/// a merge has to cross this table first.
const TASK_FIELD_CAMEL_TO_SNAKE: &[(&str, &str)] = &[
    ("parentId", "parent_id"),
    ("sortKey", "sort_key"),
    ("name", "name"),
    ("notes", "notes"),
    ("duration", "duration"),
    ("constraintType", "constraint_type"),
    ("constraintDate", "constraint_date"),
    ("schedulingMode", "scheduling_mode"),
    ("progress", "progress"),
    ("tradePartnerIds", "trade_partner_ids"),
    ("baselineStart", "baseline_start"),
    ("baselineFinish", "baseline_finish"),
    ("baselineDuration", "baseline_duration"),
    ("actualStart", "actual_start"),
    ("actualFinish", "actual_finish"),
    ("remainingDuration", "remaining_duration"),
    ("dependencies", "dependencies"),
];

fn task_field_snake_case(field: &str) -> Option<&'static str> {
    TASK_FIELD_CAMEL_TO_SNAKE.iter().find(|(camel, _)| *camel == field).map(|(_, snake)| *snake)
}

/// Snake_case projection of `Task`, used only for the `tasks.payload` column
/// in the materialized view. `Task` itself stays camelCase (events, the
/// snapshot blob, and the CLI's wire format all read/write it directly) —
/// this type exists solely so the persisted row doesn't inherit that casing.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct TaskRow {
    id: String,
    name: String,
    parent_id: Option<String>,
    sort_key: String,
    row_type: RowType,
    notes: String,
    duration: u32,
    constraint_type: ConstraintType,
    constraint_date: Option<NaiveDate>,
    dependencies: Vec<Dependency>,
    scheduling_mode: SchedulingMode,
    progress: u8,
    trade_partner_ids: Vec<String>,
    baseline_start: Option<NaiveDate>,
    baseline_finish: Option<NaiveDate>,
    baseline_duration: Option<u32>,
    actual_start: Option<NaiveDate>,
    actual_finish: Option<NaiveDate>,
    remaining_duration: Option<u32>,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            parent_id: task.parent_id.clone(),
            sort_key: task.sort_key.clone(),
            row_type: task.row_type,
            notes: task.notes.clone(),
            duration: task.duration,
            constraint_type: task.constraint_type,
            constraint_date: task.constraint_date,
            dependencies: task.dependencies.clone(),
            scheduling_mode: task.scheduling_mode,
            progress: task.progress,
            trade_partner_ids: task.trade_partner_ids.clone(),
            baseline_start: task.baseline_start,
            baseline_finish: task.baseline_finish,
            baseline_duration: task.baseline_duration,
            actual_start: task.actual_start,
            actual_finish: task.actual_finish,
            remaining_duration: task.remaining_duration,
        }
    }
}

struct Inner {
    conn: StdMutex<Connection>,
    queue: StdMutex<VecDeque<Event>>,
    next_id: AtomicU64,
    events_since_snapshot: AtomicU64,
    config: SchedulerConfig,
}

#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl EventLog {
    pub fn open(path: &Path, config: SchedulerConfig) -> Result<Self, EventLogError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;

        let next_id: u64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM events", [], |row| row.get(0))
            .map(|max_id: i64| max_id as u64 + 1)?;

        let last_snapshot_id: u64 = conn
            .query_row("SELECT COALESCE(MAX(last_event_id), 0) FROM snapshots", [], |row| row.get(0))
            .map(|id: i64| id as u64)?;
        let events_since_snapshot = next_id.saturating_sub(1).saturating_sub(last_snapshot_id);

        Ok(Self {
            inner: Arc::new(Inner {
                conn: StdMutex::new(conn),
                queue: StdMutex::new(VecDeque::new()),
                next_id: AtomicU64::new(next_id),
                events_since_snapshot: AtomicU64::new(events_since_snapshot),
                config,
            }),
        })
    }

    /// Append to the in-RAM queue. Synchronous, returns immediately; the
    /// event is not durable until a later writer commit or `flush_now`.
    pub fn append(&self, target_id: Option<String>, kind: EventKind) -> Event {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event::new(id, target_id, Utc::now(), kind);
        self.inner.queue.lock().unwrap().push_back(event.clone());
        event
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// The id of the most recently appended event, or 0 if none yet.
    pub fn last_event_id(&self) -> u64 {
        self.inner.next_id.load(Ordering::SeqCst).saturating_sub(1)
    }

    pub fn should_snapshot(&self) -> bool {
        self.inner.events_since_snapshot.load(Ordering::SeqCst) >= self.inner.config.snapshot_event_threshold
    }

    /// Persist a caller-supplied projection (the coordinator materializes
    /// its live `TaskModel` into a `Snapshot`; the log has no model of its
    /// own to snapshot from).
    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), EventLogError> {
        let payload = serde_json::to_string(snapshot)?;
        let conn = self.inner.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (last_event_id, timestamp, payload) VALUES (?1, ?2, ?3)",
            params![snapshot.last_event_id as i64, snapshot.timestamp.to_rfc3339(), payload],
        )?;
        self.inner.events_since_snapshot.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Spawn the background writer. The returned handle is aborted when
    /// dropped by the caller if it owns the only reference.
    pub fn spawn_writer(&self) -> tokio::task::JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.writer_interval);
            loop {
                ticker.tick().await;
                match Self::flush_batch(&inner).await {
                    Ok(()) => {}
                    Err(EventLogError::PersistenceFatal(reason)) => {
                        error!(reason, "event log writer stopping: database unusable");
                        return;
                    }
                    Err(err) => warn!(?err, "event log writer tick failed, batch remains queued"),
                }
            }
        })
    }

    /// Drain the whole queue synchronously (shutdown path).
    pub async fn flush_now(&self) -> Result<(), EventLogError> {
        loop {
            let before = self.pending_count();
            if before == 0 {
                return Ok(());
            }
            Self::flush_batch(&self.inner).await?;
            if self.pending_count() == before {
                // Writer made no progress (e.g. exhausted busy retries); stop
                // rather than spin.
                return Ok(());
            }
        }
    }

    async fn flush_batch(inner: &Arc<Inner>) -> Result<(), EventLogError> {
        let batch: Vec<Event> = {
            let queue = inner.queue.lock().unwrap();
            queue.iter().take(inner.config.writer_batch_size).cloned().collect()
        };
        if batch.is_empty() {
            return Ok(());
        }

        let blocking_inner = inner.clone();
        let blocking_batch = batch.clone();
        let result = tokio::task::spawn_blocking(move || write_batch_with_retry(&blocking_inner, &blocking_batch))
            .await
            .expect("event log writer task panicked");

        match result {
            Ok(()) => {
                let mut queue = inner.queue.lock().unwrap();
                for _ in 0..batch.len() {
                    queue.pop_front();
                }
                inner.events_since_snapshot.fetch_add(batch.len() as u64, Ordering::SeqCst);
                Ok(())
            }
            Err(EventLogError::PersistenceBusy) => {
                debug!(batch_len = batch.len(), "event log busy, batch stays queued for next tick");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Load the newest snapshot (if any) plus every event after it, and
    /// replay them onto a fresh `TaskModel` through the replay path.
    pub fn recover(&self) -> Result<(TaskModel, u64), EventLogError> {
        let conn = self.inner.conn.lock().unwrap();

        let snapshot_row: Option<(i64, String)> = conn
            .query_row(
                "SELECT last_event_id, payload FROM snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let mut model = TaskModel::new();
        let mut last_applied_id = 0u64;

        if let Some((last_event_id, payload)) = snapshot_row {
            let snapshot: Snapshot = serde_json::from_str(&payload)?;
            model.set_all(snapshot.tasks);
            model.set_calendar(snapshot.calendar);
            model.set_trade_partners(snapshot.trade_partners);
            last_applied_id = last_event_id as u64;
        }

        let mut stmt = conn.prepare("SELECT id, payload FROM events WHERE id > ?1 ORDER BY id ASC")?;
        let rows = stmt.query_map(params![last_applied_id as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id, payload) = row?;
            match serde_json::from_str::<EventKind>(&payload) {
                Ok(kind) => model.apply_replayed(&kind),
                Err(err) => warn!(%err, event_id = id, "skipping unparseable event during recovery"),
            }
            last_applied_id = id as u64;
        }

        Ok((model, last_applied_id))
    }
}

fn write_batch_with_retry(inner: &Inner, batch: &[Event]) -> Result<(), EventLogError> {
    let mut attempts = 0;
    loop {
        let mut conn = inner.conn.lock().unwrap();
        match try_write_batch(&mut conn, batch) {
            Ok(()) => return Ok(()),
            Err(EventLogError::Sqlite(e)) if is_busy(&e) => {
                if attempts >= inner.config.busy_retry_attempts {
                    return Err(EventLogError::PersistenceBusy);
                }
                attempts += 1;
                let backoff = inner.config.busy_retry_backoff;
                drop(conn);
                std::thread::sleep(backoff);
            }
            // Any other sqlite failure (corruption, read-only filesystem, a
            // closed connection) isn't something a retry can fix.
            Err(EventLogError::Sqlite(e)) => return Err(EventLogError::PersistenceFatal(e.to_string())),
            Err(other) => return Err(other),
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

fn try_write_batch(conn: &mut Connection, batch: &[Event]) -> Result<(), EventLogError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for event in batch {
        persist_event(&tx, event)?;
        apply_to_materialized_view(&tx, &event.kind)?;
    }
    tx.commit()?;
    Ok(())
}

fn persist_event(tx: &Transaction<'_>, event: &Event) -> Result<(), EventLogError> {
    let payload = serde_json::to_string(&event.kind)?;
    tx.execute(
        "INSERT INTO events (id, target_id, timestamp, payload) VALUES (?1, ?2, ?3, ?4)",
        params![event.id as i64, event.target_id, event.timestamp.to_rfc3339(), payload],
    )?;
    Ok(())
}

fn apply_to_materialized_view(tx: &Transaction<'_>, kind: &EventKind) -> Result<(), EventLogError> {
    match kind {
        EventKind::TaskCreated { task } => upsert_task(tx, task),
        EventKind::TaskUpdated { task_id, change } => merge_task_field(tx, task_id, &change.field, &change.new_value),
        EventKind::TaskDeleted { task_id } => {
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.execute("DELETE FROM task_trade_partners WHERE task_id = ?1", params![task_id])?;
            Ok(())
        }
        EventKind::TaskMoved { task_id, new_parent_id, new_sort_key } => {
            merge_task_field(tx, task_id, "parentId", &serde_json::json!(new_parent_id))?;
            merge_task_field(tx, task_id, "sortKey", &serde_json::json!(new_sort_key))?;
            tx.execute(
                "UPDATE tasks SET parent_id = ?1, sort_key = ?2 WHERE id = ?3",
                params![new_parent_id, new_sort_key, task_id],
            )?;
            Ok(())
        }
        EventKind::CalendarUpdated { calendar } => upsert_calendar(tx, calendar),
        EventKind::TradePartnerCreated { partner } => upsert_partner(tx, partner),
        EventKind::TradePartnerUpdated { partner_id, change } => {
            merge_partner_field(tx, partner_id, &change.field, &change.new_value)
        }
        EventKind::TradePartnerDeleted { partner_id } => {
            tx.execute("DELETE FROM trade_partners WHERE id = ?1", params![partner_id])?;
            tx.execute("DELETE FROM task_trade_partners WHERE partner_id = ?1", params![partner_id])?;
            Ok(())
        }
        EventKind::TaskTradePartnerAssigned { task_id, partner_id } => {
            tx.execute(
                "INSERT OR IGNORE INTO task_trade_partners (task_id, partner_id) VALUES (?1, ?2)",
                params![task_id, partner_id],
            )?;
            Ok(())
        }
        EventKind::TaskTradePartnerUnassigned { task_id, partner_id } => {
            tx.execute(
                "DELETE FROM task_trade_partners WHERE task_id = ?1 AND partner_id = ?2",
                params![task_id, partner_id],
            )?;
            Ok(())
        }
        EventKind::BaselineSet { task_id, start, finish, duration } => {
            merge_task_field(tx, task_id, "baselineStart", start)?;
            merge_task_field(tx, task_id, "baselineFinish", finish)?;
            merge_task_field(tx, task_id, "baselineDuration", duration)
        }
        EventKind::BaselineCleared { task_id } => {
            merge_task_field(tx, task_id, "baselineStart", &serde_json::Value::Null)?;
            merge_task_field(tx, task_id, "baselineFinish", &serde_json::Value::Null)?;
            merge_task_field(tx, task_id, "baselineDuration", &serde_json::Value::Null)
        }
        EventKind::BulkUpdate { changes } => {
            for (task_id, change) in changes {
                merge_task_field(tx, task_id, &change.field, &change.new_value)?;
            }
            Ok(())
        }
        EventKind::BulkDelete { task_ids } => {
            for task_id in task_ids {
                tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
                tx.execute("DELETE FROM task_trade_partners WHERE task_id = ?1", params![task_id])?;
            }
            Ok(())
        }
        EventKind::ProjectImported { tasks, calendar, trade_partners } => {
            tx.execute("DELETE FROM tasks", [])?;
            tx.execute("DELETE FROM trade_partners", [])?;
            tx.execute("DELETE FROM task_trade_partners", [])?;
            for task in tasks {
                upsert_task(tx, task)?;
            }
            for partner in trade_partners {
                upsert_partner(tx, partner)?;
            }
            upsert_calendar(tx, calendar)
        }
        EventKind::ProjectCleared => {
            tx.execute("DELETE FROM tasks", [])?;
            tx.execute("DELETE FROM trade_partners", [])?;
            tx.execute("DELETE FROM task_trade_partners", [])?;
            Ok(())
        }
    }
}

fn upsert_task(tx: &Transaction<'_>, task: &Task) -> Result<(), EventLogError> {
    let payload = serde_json::to_string(&TaskRow::from(task))?;
    tx.execute(
        "INSERT OR REPLACE INTO tasks (id, parent_id, sort_key, payload) VALUES (?1, ?2, ?3, ?4)",
        params![task.id, task.parent_id, task.sort_key, payload],
    )?;
    Ok(())
}

fn upsert_calendar(tx: &Transaction<'_>, calendar: &Calendar) -> Result<(), EventLogError> {
    let payload = serde_json::to_string(calendar)?;
    tx.execute("INSERT OR REPLACE INTO calendar (id, payload) VALUES (1, ?1)", params![payload])?;
    Ok(())
}

fn upsert_partner(tx: &Transaction<'_>, partner: &TradePartner) -> Result<(), EventLogError> {
    let payload = serde_json::to_string(partner)?;
    tx.execute("INSERT OR REPLACE INTO trade_partners (id, payload) VALUES (?1, ?2)", params![partner.id, payload])?;
    Ok(())
}

fn merge_task_field(
    tx: &Transaction<'_>,
    task_id: &str,
    field: &str,
    new_value: &serde_json::Value,
) -> Result<(), EventLogError> {
    if field != "parentId" && field != "sortKey" && !TASK_UPDATE_FIELDS.contains(&field) {
        debug!(field, task_id, "rejecting derived/unknown field in materialized TASK_UPDATED");
        return Ok(());
    }
    let Some(snake_field) = task_field_snake_case(field) else {
        debug!(field, task_id, "no snake_case mapping for field, ignoring");
        return Ok(());
    };

    let existing: Option<String> =
        tx.query_row("SELECT payload FROM tasks WHERE id = ?1", params![task_id], |row| row.get(0)).optional()?;
    let Some(existing) = existing else {
        debug!(task_id, "TASK_UPDATED for a task not present in the materialized view, ignoring");
        return Ok(());
    };

    let mut payload: serde_json::Value = serde_json::from_str(&existing)?;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(snake_field.to_string(), new_value.clone());
    }
    tx.execute("UPDATE tasks SET payload = ?1 WHERE id = ?2", params![payload.to_string(), task_id])?;
    Ok(())
}

fn merge_partner_field(
    tx: &Transaction<'_>,
    partner_id: &str,
    field: &str,
    new_value: &serde_json::Value,
) -> Result<(), EventLogError> {
    let existing: Option<String> = tx
        .query_row("SELECT payload FROM trade_partners WHERE id = ?1", params![partner_id], |row| row.get(0))
        .optional()?;
    let Some(existing) = existing else { return Ok(()) };
    let mut payload: serde_json::Value = serde_json::from_str(&existing)?;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(field.to_string(), new_value.clone());
    }
    tx.execute("UPDATE trade_partners SET payload = ?1 WHERE id = ?2", params![payload.to_string(), partner_id])?;
    Ok(())
}
