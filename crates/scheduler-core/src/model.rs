//! In-memory entity store over tasks, calendar, and trade partners.
//!
//! Grounded on `ProjectState::update_task`'s per-field match (unknown
//! field ignored, camelCase-named fields), generalized from an untyped
//! `serde_json::Value` patch to the typed `TaskPatch` so field coverage is
//! compiler-checked rather than a runtime string match.

use std::collections::HashMap;

use serde_json::json;
use tracing::debug;

use crate::calendar::Calendar;
use crate::dependency::Dependency;
use crate::error::CoreError;
use crate::event::{EventKind, EventPair, FieldChange};
use crate::ordering_key;
use crate::task::{RowType, Task, TaskPatch};
use crate::trade_partner::TradePartner;

/// Outcome of a mutating call: whether anything changed, and the forward/
/// backward event pairs produced (empty during replay, since replay sets
/// the reentrancy flag and suppresses new history recording).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationOutcome {
    pub changed: bool,
    pub events: Vec<EventPair>,
}

impl MutationOutcome {
    fn unchanged() -> Self {
        Self::default()
    }
}

pub struct TaskModel {
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    calendar: Calendar,
    trade_partners: HashMap<String, TradePartner>,
    /// Set while applying replayed (undo/redo/recovery) events; suppresses
    /// event-pair generation so replay never recurses into new history.
    replaying: bool,
}

impl Default for TaskModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskModel {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            order: Vec::new(),
            calendar: Calendar::default(),
            trade_partners: HashMap::new(),
            replaying: false,
        }
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    /// Run `f` with the reentrancy flag set, so any mutations it performs
    /// are treated as replay (no event pairs produced). Used by undo/redo
    /// and recovery.
    pub fn with_replay<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.replaying;
        self.replaying = true;
        let result = f(self);
        self.replaying = previous;
        result
    }

    // --- queries -----------------------------------------------------

    pub fn get_by_id(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_children(&self, parent_id: Option<&str>) -> Vec<&Task> {
        let mut children: Vec<&Task> =
            self.tasks.values().filter(|t| t.parent_id.as_deref() == parent_id).collect();
        children.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.id.cmp(&b.id)));
        children
    }

    pub fn is_parent(&self, id: &str) -> bool {
        self.tasks.values().any(|t| t.parent_id.as_deref() == Some(id))
    }

    pub fn get_depth(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.tasks.get(id);
        while let Some(task) = current {
            match &task.parent_id {
                Some(parent_id) => {
                    depth += 1;
                    current = self.tasks.get(parent_id);
                }
                None => break,
            }
        }
        depth
    }

    /// Pre-order traversal pruning subtrees for which `is_collapsed` is true.
    pub fn get_visible_tasks(&self, is_collapsed: impl Fn(&str) -> bool) -> Vec<&Task> {
        fn walk<'a>(
            model: &'a TaskModel,
            parent_id: Option<&str>,
            is_collapsed: &impl Fn(&str) -> bool,
            out: &mut Vec<&'a Task>,
        ) {
            for child in model.get_children(parent_id) {
                out.push(child);
                if !is_collapsed(&child.id) {
                    walk(model, Some(child.id.as_str()), is_collapsed, out);
                }
            }
        }
        let mut result = Vec::new();
        walk(self, None, &is_collapsed, &mut result);
        result
    }

    pub fn get_first_sort_key(&self, parent_id: Option<&str>) -> Option<String> {
        self.get_children(parent_id).first().map(|t| t.sort_key.clone())
    }

    pub fn get_last_sort_key(&self, parent_id: Option<&str>) -> Option<String> {
        self.get_children(parent_id).last().map(|t| t.sort_key.clone())
    }

    pub fn get_schedulable_tasks(&self) -> Vec<&Task> {
        self.tasks.values().filter(|t| t.is_schedulable()).collect()
    }

    pub fn all_tasks(&self) -> Vec<&Task> {
        self.tasks.values().collect()
    }

    pub fn trade_partner(&self, id: &str) -> Option<&TradePartner> {
        self.trade_partners.get(id)
    }

    pub fn all_trade_partners(&self) -> Vec<&TradePartner> {
        self.trade_partners.values().collect()
    }

    // --- mutations -----------------------------------------------------

    /// Add a task. Duplicate id replaces in place (idempotent replay).
    pub fn add(&mut self, task: Task) -> MutationOutcome {
        let forward = EventKind::TaskCreated { task: task.clone() };
        let backward = EventKind::TaskDeleted { task_id: task.id.clone() };

        if !self.order.contains(&task.id) {
            self.order.push(task.id.clone());
        }
        self.tasks.insert(task.id.clone(), task);

        self.emit(MutationOutcome { changed: true, events: vec![] }, forward, backward)
    }

    /// Apply a typed partial update. Unknown/derived fields simply don't
    /// exist on `TaskPatch`, so the whitelist is enforced by the type
    /// system; only fields actually present (`Some`) in the patch and
    /// that differ from the current value produce a change.
    pub fn update(&mut self, id: &str, patch: &TaskPatch) -> Result<MutationOutcome, CoreError> {
        if !self.tasks.contains_key(id) {
            return Err(CoreError::InvalidRef(id.to_string()));
        }

        let mut pairs = Vec::new();
        {
            let task = self.tasks.get_mut(id).expect("checked above");
            macro_rules! apply_field {
                ($field:ident, $name:literal) => {
                    if let Some(new_value) = &patch.$field {
                        if &task.$field != new_value {
                            let old = json!(task.$field);
                            let new = json!(new_value);
                            task.$field = new_value.clone();
                            pairs.push(($name, old, new));
                        }
                    }
                };
            }
            apply_field!(name, "name");
            apply_field!(notes, "notes");
            apply_field!(duration, "duration");
            apply_field!(constraint_type, "constraintType");
            apply_field!(constraint_date, "constraintDate");
            apply_field!(scheduling_mode, "schedulingMode");
            apply_field!(progress, "progress");
            apply_field!(trade_partner_ids, "tradePartnerIds");
            apply_field!(baseline_start, "baselineStart");
            apply_field!(baseline_finish, "baselineFinish");
            apply_field!(baseline_duration, "baselineDuration");
            apply_field!(actual_start, "actualStart");
            apply_field!(actual_finish, "actualFinish");
            apply_field!(remaining_duration, "remainingDuration");
        }

        if pairs.is_empty() {
            debug!(task_id = id, "update produced no field changes");
            return Ok(MutationOutcome::unchanged());
        }

        let mut outcome = MutationOutcome { changed: true, events: vec![] };
        for (field, old_value, new_value) in pairs {
            let forward = EventKind::TaskUpdated {
                task_id: id.to_string(),
                change: FieldChange { field: field.to_string(), old_value: old_value.clone(), new_value: new_value.clone() },
            };
            let backward = EventKind::TaskUpdated {
                task_id: id.to_string(),
                change: FieldChange { field: field.to_string(), old_value: new_value, new_value: old_value },
            };
            outcome = self.emit(outcome, forward, backward);
        }
        Ok(outcome)
    }

    /// Delete `id`. With `cascade`, all descendants are removed too. Every
    /// remaining task whose dependency list references a deleted task gets
    /// that dependency pruned first, as a `TASK_UPDATED(field=dependencies)`
    /// event, so a single undo restores both the tasks and the links
    /// pointing at them.
    pub fn delete(&mut self, id: &str, cascade: bool) -> Result<MutationOutcome, CoreError> {
        if !self.tasks.contains_key(id) {
            return Err(CoreError::InvalidRef(id.to_string()));
        }

        let mut to_delete = vec![id.to_string()];
        if cascade {
            let mut frontier = vec![id.to_string()];
            while let Some(parent) = frontier.pop() {
                for child in self.get_children(Some(&parent)) {
                    to_delete.push(child.id.clone());
                    frontier.push(child.id.clone());
                }
            }
        }
        let deleted: std::collections::HashSet<&str> = to_delete.iter().map(String::as_str).collect();

        let mut outcome = MutationOutcome { changed: true, events: vec![] };

        // Ghost-link cleanup before the deletes themselves.
        let affected: Vec<String> = self
            .tasks
            .values()
            .filter(|t| !deleted.contains(t.id.as_str()))
            .filter(|t| t.dependencies.iter().any(|d| deleted.contains(d.predecessor_id.as_str())))
            .map(|t| t.id.clone())
            .collect();

        for task_id in affected {
            let task = self.tasks.get_mut(&task_id).expect("found above");
            let old_deps = task.dependencies.clone();
            task.dependencies.retain(|d| !deleted.contains(d.predecessor_id.as_str()));
            let new_deps = task.dependencies.clone();
            let forward = EventKind::TaskUpdated {
                task_id: task_id.clone(),
                change: FieldChange {
                    field: "dependencies".to_string(),
                    old_value: json!(old_deps),
                    new_value: json!(new_deps),
                },
            };
            let backward = EventKind::TaskUpdated {
                task_id,
                change: FieldChange {
                    field: "dependencies".to_string(),
                    old_value: json!(new_deps),
                    new_value: json!(old_deps),
                },
            };
            outcome = self.emit(outcome, forward, backward);
        }

        // Deepest first so cascading children are removed before parents.
        to_delete.sort_by_key(|tid| std::cmp::Reverse(self.get_depth(tid)));
        for task_id in &to_delete {
            if let Some(task) = self.tasks.remove(task_id) {
                self.order.retain(|t| t != task_id);
                let forward = EventKind::TaskDeleted { task_id: task_id.clone() };
                let backward = EventKind::TaskCreated { task };
                outcome = self.emit(outcome, forward, backward);
            }
        }

        Ok(outcome)
    }

    /// Reparent/reorder `id`. Rejects if the move would create a hierarchy
    /// cycle (no mutation, no events in that case).
    pub fn move_task(
        &mut self,
        id: &str,
        new_parent: Option<&str>,
        new_sort_key: &str,
    ) -> Result<MutationOutcome, CoreError> {
        if !self.tasks.contains_key(id) {
            return Err(CoreError::InvalidRef(id.to_string()));
        }
        if let Some(parent) = new_parent {
            if !self.tasks.contains_key(parent) {
                return Err(CoreError::InvalidRef(parent.to_string()));
            }
            if parent == id || self.is_descendant(parent, id) {
                return Err(CoreError::CycleRejected(
                    id.to_string(),
                    format!("{new_parent:?} is {id} or a descendant of it"),
                ));
            }
        }

        let task = self.tasks.get(id).expect("checked above");
        let old_parent = task.parent_id.clone();
        let old_sort_key = task.sort_key.clone();
        if old_parent.as_deref() == new_parent && old_sort_key == new_sort_key {
            return Ok(MutationOutcome::unchanged());
        }

        let forward = EventKind::TaskMoved {
            task_id: id.to_string(),
            new_parent_id: new_parent.map(str::to_string),
            new_sort_key: new_sort_key.to_string(),
        };
        let backward = EventKind::TaskMoved {
            task_id: id.to_string(),
            new_parent_id: old_parent.clone(),
            new_sort_key: old_sort_key,
        };

        let task = self.tasks.get_mut(id).expect("checked above");
        task.parent_id = new_parent.map(str::to_string);
        task.sort_key = new_sort_key.to_string();

        Ok(self.emit(MutationOutcome { changed: true, events: vec![] }, forward, backward))
    }

    /// `true` if `candidate` is a descendant of `ancestor`.
    fn is_descendant(&self, candidate: &str, ancestor: &str) -> bool {
        let mut current = self.tasks.get(candidate).and_then(|t| t.parent_id.clone());
        while let Some(parent_id) = current {
            if parent_id == ancestor {
                return true;
            }
            current = self.tasks.get(&parent_id).and_then(|t| t.parent_id.clone());
        }
        false
    }

    /// Replace `id`'s dependency list wholesale. Rejects self-dependency,
    /// dependency on a missing task, or dependency on a descendant.
    pub fn update_dependencies(
        &mut self,
        id: &str,
        deps: Vec<Dependency>,
    ) -> Result<MutationOutcome, CoreError> {
        if !self.tasks.contains_key(id) {
            return Err(CoreError::InvalidRef(id.to_string()));
        }
        for dep in &deps {
            if dep.predecessor_id == id {
                return Err(CoreError::CycleRejected(id.to_string(), "self-dependency".to_string()));
            }
            if !self.tasks.contains_key(&dep.predecessor_id) {
                return Err(CoreError::InvalidRef(dep.predecessor_id.clone()));
            }
            if self.is_descendant(&dep.predecessor_id, id) {
                return Err(CoreError::CycleRejected(
                    id.to_string(),
                    format!("{} is a descendant of {id}", dep.predecessor_id),
                ));
            }
        }

        let task = self.tasks.get(id).expect("checked above");
        let old_deps = task.dependencies.clone();
        if old_deps == deps {
            return Ok(MutationOutcome::unchanged());
        }

        let forward = EventKind::TaskUpdated {
            task_id: id.to_string(),
            change: FieldChange {
                field: "dependencies".to_string(),
                old_value: json!(old_deps),
                new_value: json!(deps),
            },
        };
        let backward = EventKind::TaskUpdated {
            task_id: id.to_string(),
            change: FieldChange {
                field: "dependencies".to_string(),
                old_value: json!(deps),
                new_value: json!(old_deps),
            },
        };

        self.tasks.get_mut(id).expect("checked above").dependencies = deps;
        Ok(self.emit(MutationOutcome { changed: true, events: vec![] }, forward, backward))
    }

    /// Bulk load. Emits no events (matches `setAll`'s contract — used for
    /// project import and recovery, which emit their own coarser events).
    pub fn set_all(&mut self, tasks: Vec<Task>) {
        self.order = tasks.iter().map(|t| t.id.clone()).collect();
        self.tasks = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
    }

    pub fn set_calendar(&mut self, calendar: Calendar) {
        self.calendar = calendar;
    }

    pub fn set_trade_partners(&mut self, partners: Vec<TradePartner>) {
        self.trade_partners = partners.into_iter().map(|p| (p.id.clone(), p)).collect();
    }

    pub fn create_blank_row(&mut self, sort_key: impl Into<String>, parent: Option<String>, id: impl Into<String>) -> MutationOutcome {
        let mut task = Task::new(id, sort_key);
        task.parent_id = parent;
        task.row_type = RowType::Blank;
        self.add(task)
    }

    pub fn wake_up_blank_row(&mut self, id: &str, name: impl Into<String>) -> Result<MutationOutcome, CoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| CoreError::InvalidRef(id.to_string()))?;
        task.row_type = RowType::Task;
        task.name = name.into();
        Ok(MutationOutcome { changed: true, events: vec![] })
    }

    pub fn revert_to_blank_row(&mut self, id: &str) -> Result<MutationOutcome, CoreError> {
        let task = self.tasks.get_mut(id).ok_or_else(|| CoreError::InvalidRef(id.to_string()))?;
        task.row_type = RowType::Blank;
        task.name.clear();
        task.dependencies.clear();
        Ok(MutationOutcome { changed: true, events: vec![] })
    }

    pub fn apply_replayed(&mut self, kind: &EventKind) {
        self.with_replay(|model| model.apply(kind));
    }

    fn apply(&mut self, kind: &EventKind) {
        match kind {
            EventKind::TaskCreated { task } => {
                let _ = self.add(task.clone());
            }
            EventKind::TaskUpdated { task_id, change } => {
                self.apply_field_change(task_id, change);
            }
            EventKind::TaskDeleted { task_id } => {
                let _ = self.delete(task_id, false);
            }
            EventKind::TaskMoved { task_id, new_parent_id, new_sort_key } => {
                let _ = self.move_task(task_id, new_parent_id.as_deref(), new_sort_key);
            }
            EventKind::CalendarUpdated { calendar } => {
                self.calendar = calendar.clone();
            }
            EventKind::TradePartnerCreated { partner } => {
                self.trade_partners.insert(partner.id.clone(), partner.clone());
            }
            EventKind::TradePartnerUpdated { partner_id, change } => {
                self.apply_partner_field_change(partner_id, change);
            }
            EventKind::TradePartnerDeleted { partner_id } => {
                self.trade_partners.remove(partner_id);
            }
            EventKind::TaskTradePartnerAssigned { task_id, partner_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    if !task.trade_partner_ids.contains(partner_id) {
                        task.trade_partner_ids.push(partner_id.clone());
                    }
                }
            }
            EventKind::TaskTradePartnerUnassigned { task_id, partner_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.trade_partner_ids.retain(|id| id != partner_id);
                }
            }
            EventKind::BaselineSet { task_id, start, finish, duration } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    if let Ok(v) = serde_json::from_value(start.clone()) {
                        task.baseline_start = v;
                    }
                    if let Ok(v) = serde_json::from_value(finish.clone()) {
                        task.baseline_finish = v;
                    }
                    if let Ok(v) = serde_json::from_value(duration.clone()) {
                        task.baseline_duration = v;
                    }
                }
            }
            EventKind::BaselineCleared { task_id } => {
                if let Some(task) = self.tasks.get_mut(task_id) {
                    task.baseline_start = None;
                    task.baseline_finish = None;
                    task.baseline_duration = None;
                }
            }
            EventKind::BulkUpdate { changes } => {
                for (task_id, change) in changes {
                    self.apply_field_change(task_id, change);
                }
            }
            EventKind::BulkDelete { task_ids } => {
                for task_id in task_ids {
                    let _ = self.delete(task_id, false);
                }
            }
            EventKind::ProjectImported { tasks, calendar, trade_partners } => {
                self.set_all(tasks.clone());
                self.set_calendar(calendar.clone());
                self.set_trade_partners(trade_partners.clone());
            }
            EventKind::ProjectCleared => {
                self.tasks.clear();
                self.order.clear();
                self.trade_partners.clear();
            }
        }
    }

    fn apply_field_change(&mut self, task_id: &str, change: &FieldChange) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            debug!(task_id, "TASK_UPDATED for missing task during replay, ignoring");
            return;
        };
        macro_rules! set_from_json {
            ($field:ident) => {
                if let Ok(v) = serde_json::from_value(change.new_value.clone()) {
                    task.$field = v;
                }
            };
        }
        match change.field.as_str() {
            "name" => set_from_json!(name),
            "notes" => set_from_json!(notes),
            "duration" => set_from_json!(duration),
            "constraintType" => set_from_json!(constraint_type),
            "constraintDate" => set_from_json!(constraint_date),
            "schedulingMode" => set_from_json!(scheduling_mode),
            "progress" => set_from_json!(progress),
            "tradePartnerIds" => set_from_json!(trade_partner_ids),
            "baselineStart" => set_from_json!(baseline_start),
            "baselineFinish" => set_from_json!(baseline_finish),
            "baselineDuration" => set_from_json!(baseline_duration),
            "actualStart" => set_from_json!(actual_start),
            "actualFinish" => set_from_json!(actual_finish),
            "remainingDuration" => set_from_json!(remaining_duration),
            "dependencies" => set_from_json!(dependencies),
            other => debug!(field = other, "unknown field in TASK_UPDATED, ignoring"),
        }
    }

    fn apply_partner_field_change(&mut self, partner_id: &str, change: &FieldChange) {
        let Some(partner) = self.trade_partners.get_mut(partner_id) else {
            debug!(partner_id, "TRADE_PARTNER_UPDATED for missing partner during replay, ignoring");
            return;
        };
        macro_rules! set_from_json {
            ($field:ident) => {
                if let Ok(v) = serde_json::from_value(change.new_value.clone()) {
                    partner.$field = v;
                }
            };
        }
        match change.field.as_str() {
            "name" => set_from_json!(name),
            "contact" => set_from_json!(contact),
            "phone" => set_from_json!(phone),
            "email" => set_from_json!(email),
            "color" => set_from_json!(color),
            "notes" => set_from_json!(notes),
            other => debug!(field = other, "unknown field in TRADE_PARTNER_UPDATED, ignoring"),
        }
    }

    fn emit(&mut self, mut outcome: MutationOutcome, forward: EventKind, backward: EventKind) -> MutationOutcome {
        if !self.replaying {
            outcome.events.push(EventPair { forward, backward });
        }
        outcome
    }

    /// Helper used by the coordinator to pick a sort key when appending a
    /// new sibling under `parent_id`.
    pub fn next_append_sort_key(&self, parent_id: Option<&str>) -> String {
        ordering_key::append(self.get_last_sort_key(parent_id).as_deref())
    }

    /// Helper used by the coordinator to pick a sort key when prepending a
    /// new sibling under `parent_id`.
    pub fn next_prepend_sort_key(&self, parent_id: Option<&str>) -> String {
        ordering_key::prepend(self.get_first_sort_key(parent_id).as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::LinkType;
    use pretty_assertions::assert_eq;

    fn model_with(tasks: Vec<Task>) -> TaskModel {
        let mut model = TaskModel::new();
        model.set_all(tasks);
        model
    }

    #[test]
    fn add_then_get_by_id() {
        let mut model = TaskModel::new();
        let outcome = model.add(Task::new("a", "A").name("Task A"));
        assert!(outcome.changed);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(model.get_by_id("a").unwrap().name, "Task A");
    }

    #[test]
    fn duplicate_add_replaces_in_place() {
        let mut model = TaskModel::new();
        model.add(Task::new("a", "A").name("first"));
        model.add(Task::new("a", "A").name("second"));
        assert_eq!(model.all_tasks().len(), 1);
        assert_eq!(model.get_by_id("a").unwrap().name, "second");
    }

    #[test]
    fn update_unknown_field_produces_no_change_for_typed_patch() {
        let mut model = model_with(vec![Task::new("a", "A").name("A")]);
        let patch = TaskPatch::default();
        let outcome = model.update("a", &patch).unwrap();
        assert!(!outcome.changed);
    }

    #[test]
    fn update_missing_task_is_invalid_ref() {
        let mut model = TaskModel::new();
        let patch = TaskPatch { name: Some("x".to_string()), ..Default::default() };
        assert_eq!(model.update("missing", &patch), Err(CoreError::InvalidRef("missing".to_string())));
    }

    #[test]
    fn update_changed_field_emits_inverse_pair() {
        let mut model = model_with(vec![Task::new("a", "A").duration(3)]);
        let patch = TaskPatch { duration: Some(5), ..Default::default() };
        let outcome = model.update("a", &patch).unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(model.get_by_id("a").unwrap().duration, 5);
    }

    #[test]
    fn move_rejects_cycle_into_own_descendant() {
        let mut model = model_with(vec![
            Task::new("a", "A"),
            Task::new("b", "B").parent("a"),
        ]);
        let result = model.move_task("a", Some("b"), "Z");
        assert!(matches!(result, Err(CoreError::CycleRejected(_, _))));
        assert_eq!(model.get_by_id("a").unwrap().parent_id, None);
    }

    #[test]
    fn delete_cleans_up_ghost_links() {
        let mut model = model_with(vec![
            Task::new("a", "A"),
            Task::new("b", "B").depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
            Task::new("c", "C").depends_on(Dependency::new("b", LinkType::FinishToStart, 0)),
        ]);
        let outcome = model.delete("b", false).unwrap();
        assert!(outcome.changed);
        // one dependency-cleanup pair + one delete pair
        assert_eq!(outcome.events.len(), 2);
        assert!(model.get_by_id("c").unwrap().dependencies.is_empty());
        assert!(model.get_by_id("b").is_none());
    }

    #[test]
    fn delete_cascade_removes_descendants() {
        let mut model = model_with(vec![
            Task::new("a", "A"),
            Task::new("b", "B").parent("a"),
            Task::new("c", "C").parent("b"),
        ]);
        model.delete("a", true).unwrap();
        assert!(model.get_by_id("a").is_none());
        assert!(model.get_by_id("b").is_none());
        assert!(model.get_by_id("c").is_none());
    }

    #[test]
    fn update_dependencies_rejects_self_reference() {
        let mut model = model_with(vec![Task::new("a", "A")]);
        let result = model.update_dependencies("a", vec![Dependency::new("a", LinkType::FinishToStart, 0)]);
        assert!(matches!(result, Err(CoreError::CycleRejected(_, _))));
    }

    #[test]
    fn get_children_sorted_by_sort_key_then_id() {
        let model = model_with(vec![
            Task::new("b", "M"),
            Task::new("a", "M"),
            Task::new("c", "A"),
        ]);
        let children: Vec<&str> = model.get_children(None).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(children, vec!["c", "a", "b"]);
    }
}
