//! Successor index and hierarchy helpers feeding the CPM passes.
//!
//! The WBS (parent/child, for presentation) and the dependency graph (for
//! scheduling) are kept separate: this module only concerns itself with the
//! latter, plus the handful of hierarchy queries (depth, children) the
//! rollup phases need.

use std::collections::HashMap;

use scheduler_core::{LinkType, Task};

/// One outgoing edge from a predecessor, as seen from the successor side.
#[derive(Debug, Clone, Copy)]
pub struct SuccessorLink<'a> {
    pub successor_id: &'a str,
    pub link_type: LinkType,
    pub lag: i32,
}

/// predecessorId -> successors depending on it, built once per `calculate`.
pub struct SuccessorIndex<'a>(HashMap<&'a str, Vec<SuccessorLink<'a>>>);

impl<'a> SuccessorIndex<'a> {
    pub fn build(tasks: &'a [Task]) -> Self {
        let mut map: HashMap<&'a str, Vec<SuccessorLink<'a>>> = HashMap::new();
        for task in tasks {
            for dep in &task.dependencies {
                map.entry(dep.predecessor_id.as_str()).or_default().push(SuccessorLink {
                    successor_id: task.id.as_str(),
                    link_type: dep.link_type,
                    lag: dep.lag,
                });
            }
        }
        Self(map)
    }

    pub fn successors_of(&self, id: &str) -> &[SuccessorLink<'a>] {
        self.0.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Task ids that declare `predecessor_id` as their parent.
pub fn children_of<'a>(tasks: &'a [Task], parent_id: Option<&str>) -> Vec<&'a Task> {
    let mut children: Vec<&Task> =
        tasks.iter().filter(|t| t.parent_id.as_deref() == parent_id).collect();
    children.sort_by(|a, b| a.sort_key.cmp(&b.sort_key).then_with(|| a.id.cmp(&b.id)));
    children
}

pub fn is_parent(tasks: &[Task], id: &str) -> bool {
    tasks.iter().any(|t| t.parent_id.as_deref() == Some(id))
}

pub fn depth(by_id: &HashMap<&str, &Task>, id: &str) -> usize {
    let mut depth = 0;
    let mut current = by_id.get(id).and_then(|t| t.parent_id.as_deref());
    while let Some(parent_id) = current {
        depth += 1;
        current = by_id.get(parent_id).and_then(|t| t.parent_id.as_deref());
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::Dependency;
    use pretty_assertions::assert_eq;

    #[test]
    fn successor_index_groups_by_predecessor() {
        let tasks = vec![
            Task::new("a", "A"),
            Task::new("b", "B").depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
            Task::new("c", "C").depends_on(Dependency::new("a", LinkType::FinishToStart, 1)),
        ];
        let index = SuccessorIndex::build(&tasks);
        let succ: Vec<&str> = index.successors_of("a").iter().map(|s| s.successor_id).collect();
        assert_eq!(succ, vec!["b", "c"]);
        assert!(index.successors_of("b").is_empty());
    }

    #[test]
    fn depth_counts_ancestors() {
        let tasks = vec![Task::new("a", "A"), Task::new("b", "B").parent("a"), Task::new("c", "C").parent("b")];
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        assert_eq!(depth(&by_id, "a"), 0);
        assert_eq!(depth(&by_id, "b"), 1);
        assert_eq!(depth(&by_id, "c"), 2);
    }
}
