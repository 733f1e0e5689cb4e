//! Mediates every mutation between callers, the task model, the event log,
//! and the CPM engine, and publishes the resulting read model.
//!
//! Grounded on `utf8proj-cli`'s composition-root wiring (construct concrete
//! components by hand, no process-wide singletons) and the calculate-then-
//! publish flow of `utf8proj-core`'s top-level `Project`/`Scheduler` glue.
//! Mutations are serialized through a `tokio::sync::Mutex` guarding the live
//! state rather than a literal mpsc actor loop: tokio's mutex already queues
//! waiters in arrival order, which is the FIFO linearization callers need,
//! without a dedicated worker task and channel plumbing on top of it.

pub mod error;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use scheduler_core::{
    Calendar, Dependency, DerivedSchedule, EventKind, EventPair, MutationOutcome, Snapshot, Task, TaskModel, TaskPatch,
    TradePartner,
};
use scheduler_events::{EventLog, HistoryManager, SchedulerConfig};
use tokio::sync::{watch, Mutex};
use tracing::debug;

pub use error::CoordinatorError;

/// Where a newly added task lands among its siblings.
#[derive(Debug, Clone)]
pub enum Position {
    Append { parent_id: Option<String> },
    Prepend { parent_id: Option<String> },
    After(String),
    ChildOf(String),
}

/// Where a moved task lands relative to another task.
#[derive(Debug, Clone)]
pub enum Anchor {
    Before(String),
    After(String),
    ChildEnd(String),
}

/// Everything needed to create a task, minus the id and sort key the
/// coordinator assigns.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub notes: String,
    pub duration: u32,
    pub dependencies: Vec<Dependency>,
    pub trade_partner_ids: Vec<String>,
}

/// The published, read-only result of the last completed CPM run.
#[derive(Debug, Clone, Default)]
pub struct ReadModel {
    pub tasks: Vec<Task>,
    pub schedules: HashMap<String, DerivedSchedule>,
    pub stats: scheduler_solver::CalcStats,
}

struct State {
    model: TaskModel,
    history: HistoryManager,
    next_task_seq: u64,
}

pub struct SchedulingCoordinator {
    state: Mutex<State>,
    event_log: EventLog,
    publisher: watch::Sender<Arc<ReadModel>>,
    writer: tokio::task::JoinHandle<()>,
}

impl SchedulingCoordinator {
    /// Open (or create) the backing SQLite file, start the background
    /// write-behind writer, and wire up an empty coordinator. Call
    /// `initialize` before issuing any mutation, so the in-memory model
    /// reflects whatever was durable on disk.
    ///
    /// Returned as `Arc` (rather than bare `Self`) because the coordinator
    /// also spawns its own snapshot timer, which needs a weak handle back
    /// into live state the same way `EventLog::spawn_writer`'s task holds
    /// its `Arc<Inner>`.
    pub fn open(db_path: &Path, config: SchedulerConfig) -> Result<Arc<Self>, CoordinatorError> {
        let event_log = EventLog::open(db_path, config)?;
        let writer = event_log.spawn_writer();
        let history = HistoryManager::new(&config);
        let (publisher, _receiver) = watch::channel(Arc::new(ReadModel::default()));
        let coordinator = Arc::new(Self {
            state: Mutex::new(State { model: TaskModel::new(), history, next_task_seq: 0 }),
            event_log,
            publisher,
            writer,
        });
        coordinator.spawn_snapshot_timer(config.snapshot_interval);
        Ok(coordinator)
    }

    /// Background timer satisfying the "or on a 5-minute timer" snapshot
    /// trigger, independent of `should_snapshot`'s event-count threshold.
    /// Holds only a weak reference so it exits once the coordinator itself
    /// is dropped, rather than keeping it alive.
    fn spawn_snapshot_timer(self: &Arc<Self>, interval: std::time::Duration) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(coordinator) = weak.upgrade() else { return };
                if let Err(err) = coordinator.snapshot_now().await {
                    tracing::warn!(?err, "timer-driven snapshot failed");
                }
            }
        });
    }

    /// Explicit-request snapshot trigger: force a durable checkpoint of the
    /// current state right now, independent of both the event-count and
    /// timer triggers.
    pub async fn snapshot_now(&self) -> Result<(), CoordinatorError> {
        let (tasks, calendar, trade_partners) = {
            let state = self.state.lock().await;
            (
                state.model.all_tasks().into_iter().cloned().collect::<Vec<_>>(),
                state.model.calendar().clone(),
                state.model.all_trade_partners().into_iter().cloned().collect::<Vec<_>>(),
            )
        };
        self.write_snapshot(tasks, calendar, trade_partners).await
    }

    /// Drain any events still sitting in the writer's in-RAM queue. Callers
    /// that need every mutation durable before exiting (tests spanning a
    /// simulated restart, a CLI about to terminate) should await this
    /// before dropping the coordinator — `Drop` can't await, so nothing
    /// does this implicitly.
    pub async fn flush(&self) -> Result<(), CoordinatorError> {
        self.event_log.flush_now().await?;
        Ok(())
    }
}

impl Drop for SchedulingCoordinator {
    fn drop(&mut self) {
        self.writer.abort();
    }
}

impl SchedulingCoordinator {

    /// Subscribe to the published read model. The initial value is the
    /// empty `ReadModel` until `initialize` or the first mutation completes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ReadModel>> {
        self.publisher.subscribe()
    }

    pub fn current(&self) -> Arc<ReadModel> {
        self.publisher.borrow().clone()
    }

    /// Load snapshot + replay (the coordinator's only suspension point
    /// besides the event log's own background writer), run CPM, publish.
    pub async fn initialize(&self) -> Result<(), CoordinatorError> {
        let event_log = self.event_log.clone();
        let (model, _last_event_id) = tokio::task::spawn_blocking(move || event_log.recover())
            .await
            .expect("recovery task panicked")?;
        {
            let mut state = self.state.lock().await;
            state.model = model;
        }
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn add_task(&self, new_task: NewTask, position: Position) -> Result<String, CoordinatorError> {
        let mut state = self.state.lock().await;
        let id = format!("task-{}", state.next_task_seq);
        state.next_task_seq += 1;

        let (parent_id, sort_key) = match &position {
            Position::Append { parent_id } => (parent_id.clone(), state.model.next_append_sort_key(parent_id.as_deref())),
            Position::Prepend { parent_id } => (parent_id.clone(), state.model.next_prepend_sort_key(parent_id.as_deref())),
            Position::After(sibling_id) => sort_key_after(&state.model, sibling_id)?,
            Position::ChildOf(parent_id) => {
                (Some(parent_id.clone()), state.model.next_append_sort_key(Some(parent_id.as_str())))
            }
        };

        let mut task = Task::new(id.clone(), sort_key);
        task.parent_id = parent_id;
        task.name = new_task.name;
        task.notes = new_task.notes;
        task.duration = new_task.duration;
        task.dependencies = new_task.dependencies;
        task.trade_partner_ids = new_task.trade_partner_ids;

        let outcome = state.model.add(task);
        self.commit(&mut state, outcome, "add task");
        drop(state);
        self.recompute_and_publish().await;
        Ok(id)
    }

    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let outcome = state.model.update(id, &patch)?;
        self.commit(&mut state, outcome, "update task");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn delete_task(&self, id: &str, cascade: bool) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let outcome = state.model.delete(id, cascade)?;
        self.commit(&mut state, outcome, "delete task");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn move_task(&self, id: &str, new_parent: Option<&str>, anchor: Anchor) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let sort_key = match &anchor {
            Anchor::Before(sibling_id) => sort_key_before(&state.model, sibling_id)?.1,
            Anchor::After(sibling_id) => sort_key_after(&state.model, sibling_id)?.1,
            Anchor::ChildEnd(parent_id) => state.model.next_append_sort_key(Some(parent_id.as_str())),
        };
        let outcome = state.model.move_task(id, new_parent, &sort_key)?;
        self.commit(&mut state, outcome, "move task");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    /// Reparent under the previous sibling, appended as its last child.
    pub async fn indent(&self, id: &str) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let task = state.model.get_by_id(id).ok_or_else(|| CoordinatorError::Model(scheduler_core::CoreError::InvalidRef(id.to_string())))?;
        let parent_id = task.parent_id.clone();
        let siblings = state.model.get_children(parent_id.as_deref());
        let own_index = siblings.iter().position(|t| t.id == id).expect("task present in its own sibling list");
        let Some(new_parent) = own_index.checked_sub(1).map(|i| siblings[i].id.clone()) else {
            return Err(CoordinatorError::NoPreviousSibling(id.to_string()));
        };

        let sort_key = state.model.next_append_sort_key(Some(new_parent.as_str()));
        let outcome = state.model.move_task(id, Some(new_parent.as_str()), &sort_key)?;
        self.commit(&mut state, outcome, "indent");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    /// Reparent to the grandparent, positioned immediately after the
    /// current parent.
    pub async fn outdent(&self, id: &str) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let task = state.model.get_by_id(id).ok_or_else(|| CoordinatorError::Model(scheduler_core::CoreError::InvalidRef(id.to_string())))?;
        let Some(parent_id) = task.parent_id.clone() else {
            return Err(CoordinatorError::AlreadyTopLevel(id.to_string()));
        };
        let (grandparent, sort_key) = sort_key_after(&state.model, &parent_id)?;
        let outcome = state.model.move_task(id, grandparent.as_deref(), &sort_key)?;
        self.commit(&mut state, outcome, "outdent");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn update_dependencies(&self, id: &str, deps: Vec<Dependency>) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let outcome = state.model.update_dependencies(id, deps)?;
        self.commit(&mut state, outcome, "update dependencies");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn update_calendar(&self, calendar: Calendar) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let old_calendar = state.model.calendar().clone();
        if old_calendar == calendar {
            drop(state);
            return Ok(());
        }
        let forward = EventKind::CalendarUpdated { calendar: calendar.clone() };
        let backward = EventKind::CalendarUpdated { calendar: old_calendar };
        state.model.set_calendar(calendar);
        let outcome = MutationOutcome { changed: true, events: vec![EventPair { forward, backward }] };
        self.commit(&mut state, outcome, "update calendar");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn undo(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let Some(events) = state.history.undo() else {
            return Err(CoordinatorError::NothingToUndo);
        };
        self.apply_replayed_events(&mut state, events);
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn redo(&self) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        let Some(events) = state.history.redo() else {
            return Err(CoordinatorError::NothingToRedo);
        };
        self.apply_replayed_events(&mut state, events);
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    pub async fn load_project(
        &self,
        tasks: Vec<Task>,
        calendar: Calendar,
        trade_partners: Vec<TradePartner>,
    ) -> Result<(), CoordinatorError> {
        let mut state = self.state.lock().await;
        state.model.set_all(tasks.clone());
        state.model.set_calendar(calendar.clone());
        state.model.set_trade_partners(trade_partners.clone());
        let event = self.event_log.append(None, EventKind::ProjectImported { tasks, calendar, trade_partners });
        debug!(event_id = event.id, "project imported");
        drop(state);
        self.recompute_and_publish().await;
        Ok(())
    }

    fn commit(&self, state: &mut State, outcome: MutationOutcome, label: &str) {
        if !outcome.changed {
            return;
        }
        for pair in &outcome.events {
            let target_id = target_id_of(&pair.forward);
            self.event_log.append(target_id, pair.forward.clone());
        }
        state.history.record_action(outcome.events, label);
    }

    /// Undo/redo events are applied through the model's replay path (no new
    /// history is recorded) but are still forwarded to the event log so the
    /// materialized view and durable log reflect the reversal.
    fn apply_replayed_events(&self, state: &mut State, events: Vec<EventKind>) {
        for kind in events {
            state.model.apply_replayed(&kind);
            let target_id = target_id_of(&kind);
            self.event_log.append(target_id, kind);
        }
    }

    async fn recompute_and_publish(&self) {
        let (tasks, calendar_snapshot, trade_partners, output) = {
            let state = self.state.lock().await;
            let tasks: Vec<Task> = state.model.all_tasks().into_iter().cloned().collect();
            let calendar = state.model.calendar().clone();
            let today = chrono::Utc::now().date_naive();
            let output = scheduler_solver::calculate(&tasks, &calendar, today);
            let trade_partners: Vec<TradePartner> = state.model.all_trade_partners().into_iter().cloned().collect();
            (tasks, calendar, trade_partners, output)
        };

        let read_model =
            Arc::new(ReadModel { tasks: tasks.clone(), schedules: output.schedules, stats: output.stats });
        let _ = self.publisher.send(read_model);

        if self.event_log.should_snapshot() {
            if let Err(err) = self.write_snapshot(tasks, calendar_snapshot, trade_partners).await {
                tracing::warn!(?err, "failed to write snapshot");
            }
        }
    }

    async fn write_snapshot(
        &self,
        tasks: Vec<Task>,
        calendar: Calendar,
        trade_partners: Vec<TradePartner>,
    ) -> Result<(), CoordinatorError> {
        let last_event_id = self.event_log.last_event_id();
        let snapshot =
            Snapshot { tasks, calendar, trade_partners, last_event_id, timestamp: chrono::Utc::now() };
        let event_log = self.event_log.clone();
        tokio::task::spawn_blocking(move || event_log.write_snapshot(&snapshot))
            .await
            .expect("snapshot task panicked")?;
        Ok(())
    }
}

fn target_id_of(kind: &EventKind) -> Option<String> {
    match kind {
        EventKind::TaskCreated { task } => Some(task.id.clone()),
        EventKind::TaskUpdated { task_id, .. }
        | EventKind::TaskDeleted { task_id }
        | EventKind::TaskMoved { task_id, .. } => Some(task_id.clone()),
        EventKind::TradePartnerCreated { partner } => Some(partner.id.clone()),
        EventKind::TradePartnerUpdated { partner_id, .. } | EventKind::TradePartnerDeleted { partner_id } => {
            Some(partner_id.clone())
        }
        EventKind::TaskTradePartnerAssigned { task_id, .. } | EventKind::TaskTradePartnerUnassigned { task_id, .. } => {
            Some(task_id.clone())
        }
        EventKind::BaselineSet { task_id, .. } | EventKind::BaselineCleared { task_id } => Some(task_id.clone()),
        EventKind::CalendarUpdated { .. }
        | EventKind::BulkUpdate { .. }
        | EventKind::BulkDelete { .. }
        | EventKind::ProjectImported { .. }
        | EventKind::ProjectCleared => None,
    }
}

fn sort_key_after(model: &TaskModel, sibling_id: &str) -> Result<(Option<String>, String), CoordinatorError> {
    let sibling = model
        .get_by_id(sibling_id)
        .ok_or_else(|| CoordinatorError::Model(scheduler_core::CoreError::InvalidRef(sibling_id.to_string())))?;
    let parent_id = sibling.parent_id.clone();
    let siblings = model.get_children(parent_id.as_deref());
    let index = siblings.iter().position(|t| t.id == sibling_id).expect("sibling found via get_by_id");
    let next = siblings.get(index + 1).map(|t| t.sort_key.as_str());
    let key = scheduler_core::ordering_key::between(Some(sibling.sort_key.as_str()), next);
    Ok((parent_id, key))
}

fn sort_key_before(model: &TaskModel, sibling_id: &str) -> Result<(Option<String>, String), CoordinatorError> {
    let sibling = model
        .get_by_id(sibling_id)
        .ok_or_else(|| CoordinatorError::Model(scheduler_core::CoreError::InvalidRef(sibling_id.to_string())))?;
    let parent_id = sibling.parent_id.clone();
    let siblings = model.get_children(parent_id.as_deref());
    let index = siblings.iter().position(|t| t.id == sibling_id).expect("sibling found via get_by_id");
    let prev = index.checked_sub(1).and_then(|i| siblings.get(i)).map(|t| t.sort_key.as_str());
    let key = scheduler_core::ordering_key::between(prev, Some(sibling.sort_key.as_str()));
    Ok((parent_id, key))
}
