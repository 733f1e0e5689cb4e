//! Critical Path Method engine.
//!
//! Five phases, run as a pure function over a working copy of the input
//! tasks: successor index, forward pass (ES/EF), summary rollup, backward
//! pass (LS/LF), float + critical-path marking.
//!
//! References:
//!   - Kelley & Walker (1959) "Critical-Path Planning and Scheduling"
//!   - PMI PMBOK Guide, Chapter 6

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use scheduler_core::calendar::{add_work_days, calc_work_days_difference};
use scheduler_core::{Calendar, ConstraintType, DerivedSchedule, Health, LinkType, SchedulingMode, Task};
use tracing::warn;

use crate::dag::{children_of, depth, is_parent, SuccessorIndex};

/// Forward/backward passes each iterate at most this many times looking for
/// a fixed point, guarding against accidental dependency cycles that
/// slipped past `TaskModel::update_dependencies`'s validation.
pub const MAX_CPM_ITERATIONS: u32 = 50;

#[derive(Debug, Clone, Default)]
pub struct CalcStats {
    pub duration_micros: u64,
    pub task_count: usize,
    pub critical_count: usize,
    /// Set if either pass hit `MAX_CPM_ITERATIONS` without converging.
    pub diverged: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CpmOutput {
    pub schedules: HashMap<String, DerivedSchedule>,
    pub stats: CalcStats,
}

#[derive(Debug, Clone)]
struct Working {
    start: NaiveDate,
    end: NaiveDate,
    late_start: NaiveDate,
    late_finish: NaiveDate,
}

/// Run CPM over `tasks` against `calendar`. Never mutates `tasks`; `today`
/// is the fallback start for unconstrained root tasks, passed in rather
/// than read from the clock so the function stays pure and reproducible.
pub fn calculate(tasks: &[Task], calendar: &Calendar, today: NaiveDate) -> CpmOutput {
    if tasks.is_empty() {
        return CpmOutput::default();
    }

    let started = std::time::Instant::now();
    let successors = SuccessorIndex::build(tasks);
    let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let leaves: Vec<&Task> =
        tasks.iter().filter(|t| t.is_schedulable() && !is_parent(tasks, &t.id)).collect();
    let parents: Vec<&Task> =
        tasks.iter().filter(|t| t.is_schedulable() && is_parent(tasks, &t.id)).collect();

    let mut working: HashMap<&str, Working> = HashMap::new();
    let mut diverged = false;
    let mut blocked: HashSet<String> = HashSet::new();

    let (fwd_diverged, fwd_blocked) = forward_pass(&leaves, &by_id, calendar, today, &mut working);
    diverged |= fwd_diverged;
    blocked.extend(fwd_blocked);
    rollup_forward(&parents, tasks, &mut working);
    let (bwd_diverged, bwd_blocked) = backward_pass(&leaves, &successors, calendar, &mut working);
    diverged |= bwd_diverged;
    blocked.extend(bwd_blocked);
    rollup_backward(&parents, tasks, &mut working);

    let schedules = float_and_critical(tasks, &successors, calendar, &working, &blocked);
    let critical_count = schedules.values().filter(|s| s.is_critical).count();

    if diverged {
        warn!(task_count = tasks.len(), ?blocked, "CPM did not converge within the iteration cap");
    }

    CpmOutput {
        schedules,
        stats: CalcStats {
            duration_micros: started.elapsed().as_micros() as u64,
            task_count: tasks.len(),
            critical_count,
            diverged,
        },
    }
}

fn candidate_start(
    calendar: &Calendar,
    link_type: LinkType,
    lag: i32,
    pred_start: NaiveDate,
    pred_end: NaiveDate,
    duration: i32,
) -> NaiveDate {
    match link_type {
        LinkType::FinishToStart => add_work_days(calendar, pred_end, 1 + lag),
        LinkType::StartToStart => add_work_days(calendar, pred_start, lag),
        LinkType::FinishToFinish => add_work_days(calendar, pred_end, lag - duration + 1),
        LinkType::StartToFinish => add_work_days(calendar, pred_start, lag - duration + 1),
    }
}

/// Returns whether the pass hit the iteration cap without converging, and
/// the set of task ids still changing in that final iteration.
fn forward_pass(
    leaves: &[&Task],
    by_id: &HashMap<&str, &Task>,
    calendar: &Calendar,
    today: NaiveDate,
    working: &mut HashMap<&str, Working>,
) -> (bool, HashSet<String>) {
    for task in leaves {
        let duration = task.duration.max(1) as i32;
        let end = add_work_days(calendar, today, duration - 1);
        working.insert(task.id.as_str(), Working { start: today, end, late_start: today, late_finish: end });
    }

    for iteration in 0..MAX_CPM_ITERATIONS {
        let mut changed_ids: HashSet<String> = HashSet::new();

        for task in leaves {
            if task.scheduling_mode == SchedulingMode::Manual {
                continue;
            }

            let duration = task.duration.max(1) as i32;

            let candidate = task
                .dependencies
                .iter()
                .filter(|dep| by_id.contains_key(dep.predecessor_id.as_str()))
                .filter_map(|dep| {
                    let pred_work = working.get(dep.predecessor_id.as_str())?;
                    Some(candidate_start(calendar, dep.link_type, dep.lag, pred_work.start, pred_work.end, duration))
                })
                .max();

            let current = working.get(task.id.as_str()).map(|w| w.start).unwrap_or(today);
            let mut final_start = candidate.unwrap_or(current);

            match (task.constraint_type, task.constraint_date) {
                (ConstraintType::Asap, _) => {}
                (ConstraintType::Snet, Some(date)) if date > final_start => final_start = date,
                (ConstraintType::Snlt, Some(date)) if final_start > date => final_start = date,
                (ConstraintType::Fnet, Some(date)) => {
                    let floor = add_work_days(calendar, date, -(duration - 1));
                    if floor > final_start {
                        final_start = floor;
                    }
                }
                (ConstraintType::Fnlt, Some(date)) => {
                    let projected_end = add_work_days(calendar, final_start, duration - 1);
                    if projected_end > date {
                        final_start = add_work_days(calendar, date, -(duration - 1));
                    }
                }
                (ConstraintType::Mfo, Some(date)) => {
                    let end = date;
                    let start = add_work_days(calendar, date, -(duration - 1));
                    let entry = working.entry(task.id.as_str()).or_insert(Working {
                        start,
                        end,
                        late_start: start,
                        late_finish: end,
                    });
                    if entry.start != start || entry.end != end {
                        entry.start = start;
                        entry.end = end;
                        changed_ids.insert(task.id.clone());
                    }
                    continue;
                }
                _ => {}
            }

            let final_end = add_work_days(calendar, final_start, duration - 1);
            let entry = working.entry(task.id.as_str()).or_insert(Working {
                start: final_start,
                end: final_end,
                late_start: final_start,
                late_finish: final_end,
            });
            if entry.start != final_start || entry.end != final_end {
                entry.start = final_start;
                entry.end = final_end;
                changed_ids.insert(task.id.clone());
            }
        }

        if changed_ids.is_empty() {
            return (false, HashSet::new());
        }
        if iteration == MAX_CPM_ITERATIONS - 1 {
            return (true, changed_ids);
        }
    }
    (false, HashSet::new())
}

fn bottom_up<'a>(parents: &[&'a Task], all_tasks: &'a [Task]) -> Vec<&'a Task> {
    let by_id: HashMap<&str, &Task> = all_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut ordered: Vec<&Task> = parents.to_vec();
    ordered.sort_by_key(|t| std::cmp::Reverse(depth(&by_id, &t.id)));
    ordered
}

fn rollup_forward(parents: &[&Task], all_tasks: &[Task], working: &mut HashMap<&str, Working>) {
    for parent in bottom_up(parents, all_tasks) {
        let children = children_of(all_tasks, Some(&parent.id));
        let starts: Vec<NaiveDate> = children.iter().filter_map(|c| working.get(c.id.as_str())).map(|w| w.start).collect();
        let ends: Vec<NaiveDate> = children.iter().filter_map(|c| working.get(c.id.as_str())).map(|w| w.end).collect();
        let (Some(&start), Some(&end)) = (starts.iter().min(), ends.iter().max()) else { continue };
        working.insert(parent.id.as_str(), Working { start, end, late_start: start, late_finish: end });
    }
}

/// Returns whether the pass hit the iteration cap without converging, and
/// the set of task ids still changing in that final iteration.
fn backward_pass(
    leaves: &[&Task],
    successors: &SuccessorIndex,
    calendar: &Calendar,
    working: &mut HashMap<&str, Working>,
) -> (bool, HashSet<String>) {
    let project_late_finish = working.values().map(|w| w.end).max();
    let Some(project_late_finish) = project_late_finish else { return (false, HashSet::new()) };

    for task in leaves {
        if let Some(entry) = working.get_mut(task.id.as_str()) {
            if successors.successors_of(&task.id).is_empty() {
                let duration = task.duration.max(1) as i32;
                entry.late_finish = project_late_finish;
                entry.late_start = add_work_days(calendar, project_late_finish, -(duration - 1));
            }
        }
    }

    for iteration in 0..MAX_CPM_ITERATIONS {
        let mut changed_ids: HashSet<String> = HashSet::new();

        for task in leaves {
            let duration = task.duration.max(1) as i32;
            let succ_links = successors.successors_of(&task.id);
            if succ_links.is_empty() {
                continue;
            }

            let constrained_finish = succ_links
                .iter()
                .filter_map(|link| {
                    let succ = working.get(link.successor_id)?;
                    Some(match link.link_type {
                        LinkType::FinishToStart => add_work_days(calendar, succ.late_start, -1 - link.lag),
                        LinkType::StartToStart => add_work_days(calendar, succ.late_start, duration - 1 - link.lag),
                        LinkType::FinishToFinish => add_work_days(calendar, succ.late_finish, -link.lag),
                        LinkType::StartToFinish => add_work_days(calendar, succ.late_finish, duration - 1 - link.lag),
                    })
                })
                .min();

            let Some(new_finish) = constrained_finish else { continue };
            let new_start = add_work_days(calendar, new_finish, -(duration - 1));

            if let Some(entry) = working.get_mut(task.id.as_str()) {
                if new_finish < entry.late_finish {
                    entry.late_finish = new_finish;
                    entry.late_start = new_start;
                    changed_ids.insert(task.id.clone());
                }
            }
        }

        if changed_ids.is_empty() {
            return (false, HashSet::new());
        }
        if iteration == MAX_CPM_ITERATIONS - 1 {
            return (true, changed_ids);
        }
    }
    (false, HashSet::new())
}

fn rollup_backward(parents: &[&Task], all_tasks: &[Task], working: &mut HashMap<&str, Working>) {
    for parent in bottom_up(parents, all_tasks) {
        let children = children_of(all_tasks, Some(&parent.id));
        let ls: Vec<NaiveDate> = children.iter().filter_map(|c| working.get(c.id.as_str())).map(|w| w.late_start).collect();
        let lf: Vec<NaiveDate> = children.iter().filter_map(|c| working.get(c.id.as_str())).map(|w| w.late_finish).collect();
        let (Some(&late_start), Some(&late_finish)) = (ls.iter().min(), lf.iter().max()) else { continue };
        if let Some(entry) = working.get_mut(parent.id.as_str()) {
            entry.late_start = late_start;
            entry.late_finish = late_finish;
        }
    }
}

fn free_float_for(
    task: &Task,
    successors: &SuccessorIndex,
    calendar: &Calendar,
    own: &Working,
    working: &HashMap<&str, Working>,
    total_float: i32,
) -> i32 {
    let links = successors.successors_of(&task.id);
    if links.is_empty() {
        return total_float;
    }

    let gap = links
        .iter()
        .filter_map(|link| {
            let succ = working.get(link.successor_id)?;
            Some(match link.link_type {
                LinkType::FinishToStart => calc_work_days_difference(calendar, own.end, succ.start) - 1 - link.lag,
                LinkType::StartToStart => calc_work_days_difference(calendar, own.start, succ.start) - link.lag,
                LinkType::FinishToFinish => calc_work_days_difference(calendar, own.end, succ.end) - link.lag,
                LinkType::StartToFinish => calc_work_days_difference(calendar, own.start, succ.end) - link.lag,
            })
        })
        .min();

    gap.unwrap_or(total_float).clamp(0, total_float.max(0))
}

fn visual_row_numbers(tasks: &[Task]) -> HashMap<&str, u32> {
    fn walk<'a>(tasks: &'a [Task], parent_id: Option<&str>, counter: &mut u32, out: &mut HashMap<&'a str, u32>) {
        for child in children_of(tasks, parent_id) {
            *counter += 1;
            out.insert(child.id.as_str(), *counter);
            walk(tasks, Some(child.id.as_str()), counter, out);
        }
    }
    let mut out = HashMap::new();
    let mut counter = 0;
    walk(tasks, None, &mut counter, &mut out);
    out
}

fn float_and_critical(
    tasks: &[Task],
    successors: &SuccessorIndex,
    calendar: &Calendar,
    working: &HashMap<&str, Working>,
    blocked: &HashSet<String>,
) -> HashMap<String, DerivedSchedule> {
    let row_numbers = visual_row_numbers(tasks);
    let mut schedules = HashMap::new();

    for task in tasks.iter().filter(|t| t.is_schedulable()) {
        let Some(own) = working.get(task.id.as_str()) else { continue };
        let total_float = calc_work_days_difference(calendar, own.start, own.late_start);

        let is_critical = if is_parent(tasks, &task.id) {
            children_of(tasks, Some(&task.id))
                .iter()
                .filter_map(|c| schedules.get(&c.id))
                .any(|s: &DerivedSchedule| s.is_critical)
        } else {
            total_float <= 0
        };

        let free_float = if is_parent(tasks, &task.id) {
            total_float
        } else {
            free_float_for(task, successors, calendar, own, working, total_float)
        };

        let health = if blocked.contains(&task.id) {
            Health::Blocked
        } else if total_float < 0 {
            Health::AtRisk
        } else {
            Health::OnTrack
        };

        schedules.insert(
            task.id.clone(),
            DerivedSchedule {
                start: own.start,
                end: own.end,
                late_start: own.late_start,
                late_finish: own.late_finish,
                total_float,
                free_float,
                is_critical,
                health,
                visual_row_number: row_numbers.get(task.id.as_str()).copied().unwrap_or(0),
            },
        );
    }

    // Parents depend on children's `is_critical` already being computed;
    // since `bottom_up` fed the forward/backward rollups in depth order but
    // `schedules` here is built leaf-first-by-iteration-order, re-derive
    // parent criticality in a second pass once every leaf is present.
    let parent_ids: Vec<String> =
        tasks.iter().filter(|t| t.is_schedulable() && is_parent(tasks, &t.id)).map(|t| t.id.clone()).collect();
    for parent_id in bottom_up_ids(&parent_ids, tasks) {
        let critical = children_of(tasks, Some(&parent_id))
            .iter()
            .filter_map(|c| schedules.get(&c.id))
            .any(|s| s.is_critical);
        if let Some(entry) = schedules.get_mut(&parent_id) {
            entry.is_critical = critical;
        }
    }

    schedules
}

fn bottom_up_ids(ids: &[String], all_tasks: &[Task]) -> Vec<String> {
    let by_id: HashMap<&str, &Task> = all_tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut ordered = ids.to_vec();
    ordered.sort_by_key(|id| std::cmp::Reverse(depth(&by_id, id)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scheduler_core::{Dependency, Task};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_task_list_returns_immediately() {
        let output = calculate(&[], &Calendar::default(), date(2025, 1, 6));
        assert!(output.schedules.is_empty());
        assert_eq!(output.stats.task_count, 0);
    }

    #[test]
    fn single_task_is_critical_with_zero_float() {
        let tasks = vec![Task::new("a", "A").duration(5)];
        let output = calculate(&tasks, &Calendar::default(), date(2025, 1, 6));
        let a = &output.schedules["a"];
        assert!(a.is_critical);
        assert_eq!(a.total_float, 0);
    }

    #[test]
    fn fs_chain_start_is_day_after_predecessor_end() {
        let cal = Calendar::default();
        let tasks = vec![
            Task::new("a", "A").duration(3),
            Task::new("b", "B").duration(2).depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
        ];
        let output = calculate(&tasks, &cal, date(2025, 1, 6));
        let a = &output.schedules["a"];
        let b = &output.schedules["b"];
        assert_eq!(calc_work_days_difference(&cal, a.end, b.start), 1);
        assert!(a.is_critical);
        assert!(b.is_critical);
    }

    #[test]
    fn milestone_start_equals_end() {
        let tasks = vec![Task::new("m", "A").duration(0)];
        let output = calculate(&tasks, &Calendar::default(), date(2025, 1, 6));
        let m = &output.schedules["m"];
        assert_eq!(m.start, m.end);
    }

    #[test]
    fn parent_spans_children() {
        let tasks = vec![
            Task::new("p", "A"),
            Task::new("a", "A").parent("p").duration(2),
            Task::new("b", "B").parent("p").duration(3).depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
        ];
        let output = calculate(&tasks, &Calendar::default(), date(2025, 1, 6));
        let p = &output.schedules["p"];
        let a = &output.schedules["a"];
        let b = &output.schedules["b"];
        assert_eq!(p.start, a.start);
        assert_eq!(p.end, b.end);
        assert!(p.is_critical);
    }

    #[test]
    fn mfo_overrides_predecessor_pressure() {
        let cal = Calendar::default();
        let constraint_date = date(2025, 1, 8);
        let tasks = vec![
            Task::new("a", "A").duration(10),
            Task::new("b", "B")
                .duration(2)
                .depends_on(Dependency::new("a", LinkType::FinishToStart, 0))
                .constraint(ConstraintType::Mfo, Some(constraint_date)),
        ];
        let output = calculate(&tasks, &cal, date(2025, 1, 6));
        let b = &output.schedules["b"];
        assert_eq!(b.end, constraint_date);
        assert!(b.total_float < 0, "predecessor finishes after the MFO date, float must go negative");
    }

    #[test]
    fn a_dependency_cycle_diverges_and_blocks_both_tasks() {
        // Not rejected upstream here since `calculate` is a pure function
        // over whatever tasks it's handed; a real cycle pushes each task's
        // start further out every iteration and never settles.
        let tasks = vec![
            Task::new("a", "A").duration(1).depends_on(Dependency::new("b", LinkType::FinishToStart, 0)),
            Task::new("b", "B").duration(1).depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
        ];
        let output = calculate(&tasks, &Calendar::default(), date(2025, 1, 6));
        assert!(output.stats.diverged);
        assert_eq!(output.schedules["a"].health, Health::Blocked);
        assert_eq!(output.schedules["b"].health, Health::Blocked);
    }

    #[test]
    fn non_critical_task_has_positive_float() {
        let tasks = vec![
            Task::new("a", "A").duration(2),
            Task::new("b", "B").duration(10).depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
            Task::new("c", "C").duration(1).depends_on(Dependency::new("a", LinkType::FinishToStart, 0)),
        ];
        let output = calculate(&tasks, &Calendar::default(), date(2025, 1, 6));
        assert!(output.schedules["b"].is_critical);
        assert!(!output.schedules["c"].is_critical);
        assert!(output.schedules["c"].total_float > 0);
    }
}
