//! Bounded undo/redo stacks over recorded event pairs.
//!
//! No teacher or pack analogue exists for this directly; the bounded
//! `VecDeque` stack and cap-driven construction follow the same shape as
//! `SchedulerConfig`'s other tunables.

use std::collections::VecDeque;

use scheduler_core::{EventKind, EventPair};

use crate::config::SchedulerConfig;

/// One undo-able unit of work: a label plus the event pairs it produced,
/// in the order they were recorded.
#[derive(Debug, Clone)]
pub struct UndoableAction {
    pub label: String,
    pub pairs: Vec<EventPair>,
}

struct CompositeFrame {
    label: String,
    pairs: Vec<EventPair>,
    depth: u32,
}

pub struct HistoryManager {
    undo_stack: VecDeque<UndoableAction>,
    redo_stack: VecDeque<UndoableAction>,
    cap: usize,
    composite: Option<CompositeFrame>,
}

impl HistoryManager {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            cap: config.undo_stack_depth,
            composite: None,
        }
    }

    /// Begin (or nest into) a composite action. Intervening `record_action`
    /// calls are collected into one undo step until the matching
    /// `end_composite`; nested composites flatten into the outermost.
    pub fn begin_composite(&mut self, label: impl Into<String>) {
        match &mut self.composite {
            Some(frame) => frame.depth += 1,
            None => self.composite = Some(CompositeFrame { label: label.into(), pairs: Vec::new(), depth: 1 }),
        }
    }

    pub fn end_composite(&mut self) {
        let Some(frame) = &mut self.composite else { return };
        frame.depth -= 1;
        if frame.depth == 0 {
            let frame = self.composite.take().expect("checked above");
            if !frame.pairs.is_empty() {
                self.push_undo(UndoableAction { label: frame.label, pairs: frame.pairs });
            }
        }
    }

    /// Record one action's event pairs. Inside an open composite, the pairs
    /// are folded into it instead of becoming their own undo step. Always
    /// clears the redo stack.
    pub fn record_action(&mut self, pairs: Vec<EventPair>, label: impl Into<String>) {
        self.redo_stack.clear();
        if pairs.is_empty() {
            return;
        }
        if let Some(frame) = &mut self.composite {
            frame.pairs.extend(pairs);
            return;
        }
        self.push_undo(UndoableAction { label: label.into(), pairs });
    }

    fn push_undo(&mut self, action: UndoableAction) {
        if self.undo_stack.len() >= self.cap {
            self.undo_stack.pop_front();
        }
        self.undo_stack.push_back(action);
    }

    /// Pop the most recent action and return its backward events in
    /// reverse recording order (last-applied-undone-first).
    pub fn undo(&mut self) -> Option<Vec<EventKind>> {
        let action = self.undo_stack.pop_back()?;
        let events = action.pairs.iter().rev().map(|p| p.backward.clone()).collect();
        self.redo_stack.push_back(action);
        Some(events)
    }

    /// Pop the most recently undone action and return its forward events
    /// in original recording order.
    pub fn redo(&mut self) -> Option<Vec<EventKind>> {
        let action = self.redo_stack.pop_back()?;
        let events = action.pairs.iter().map(|p| p.forward.clone()).collect();
        self.undo_stack.push_back(action);
        Some(events)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scheduler_core::EventKind;

    fn pair(n: u32) -> EventPair {
        EventPair {
            forward: EventKind::TaskDeleted { task_id: format!("fwd-{n}") },
            backward: EventKind::TaskDeleted { task_id: format!("bwd-{n}") },
        }
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut history = HistoryManager::new(&SchedulerConfig::default());
        history.record_action(vec![pair(1)], "create task");
        let undone = history.undo().unwrap();
        assert_eq!(undone, vec![EventKind::TaskDeleted { task_id: "bwd-1".to_string() }]);
        let redone = history.redo().unwrap();
        assert_eq!(redone, vec![EventKind::TaskDeleted { task_id: "fwd-1".to_string() }]);
    }

    #[test]
    fn recording_clears_redo_stack() {
        let mut history = HistoryManager::new(&SchedulerConfig::default());
        history.record_action(vec![pair(1)], "a");
        history.undo();
        assert!(history.can_redo());
        history.record_action(vec![pair(2)], "b");
        assert!(!history.can_redo());
    }

    #[test]
    fn composite_collects_into_single_action() {
        let mut history = HistoryManager::new(&SchedulerConfig::default());
        history.begin_composite("delete with cleanup");
        history.record_action(vec![pair(1)], "ignored inside composite");
        history.record_action(vec![pair(2)], "ignored inside composite");
        history.end_composite();
        assert_eq!(history.undo_stack.len(), 1);
        let undone = history.undo().unwrap();
        assert_eq!(undone.len(), 2);
    }

    #[test]
    fn nested_composites_flatten_into_outermost() {
        let mut history = HistoryManager::new(&SchedulerConfig::default());
        history.begin_composite("outer");
        history.begin_composite("inner");
        history.record_action(vec![pair(1)], "x");
        history.end_composite();
        assert!(history.undo_stack.is_empty(), "inner end_composite must not close the outer frame");
        history.end_composite();
        assert_eq!(history.undo_stack.len(), 1);
    }

    #[test]
    fn stack_is_bounded_by_cap() {
        let config = SchedulerConfig { undo_stack_depth: 2, ..SchedulerConfig::default() };
        let mut history = HistoryManager::new(&config);
        history.record_action(vec![pair(1)], "a");
        history.record_action(vec![pair(2)], "b");
        history.record_action(vec![pair(3)], "c");
        assert_eq!(history.undo_stack.len(), 2);
    }
}
