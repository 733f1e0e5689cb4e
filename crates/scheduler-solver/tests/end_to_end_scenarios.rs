//! End-to-end CPM scenarios, covering a Mon-Fri calendar unless noted.

use chrono::NaiveDate;
use scheduler_core::{Calendar, ConstraintType, Dependency, LinkType, Task};

fn mon_fri() -> Calendar {
    Calendar::default()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn linear_fs_chain() {
    let a = Task::new("a", "a0").name("A").duration(3);
    let b = Task::new("b", "a1")
        .name("B")
        .duration(2)
        .depends_on(Dependency::new("a", LinkType::FinishToStart, 0));
    let c = Task::new("c", "a2")
        .name("C")
        .duration(1)
        .depends_on(Dependency::new("b", LinkType::FinishToStart, 0));

    let today = date(2025, 1, 6);
    let output = scheduler_solver::calculate(&[a, b, c], &mon_fri(), today);

    let sa = &output.schedules["a"];
    let sb = &output.schedules["b"];
    let sc = &output.schedules["c"];

    assert_eq!(sa.start, date(2025, 1, 6));
    assert_eq!(sa.end, date(2025, 1, 8));
    assert_eq!(sb.start, date(2025, 1, 9));
    assert_eq!(sb.end, date(2025, 1, 10));
    // C skips the weekend between B's Friday finish and Monday start.
    assert_eq!(sc.start, date(2025, 1, 13));
    assert_eq!(sc.end, date(2025, 1, 13));

    for s in [sa, sb, sc] {
        assert!(s.is_critical);
        assert_eq!(s.total_float, 0);
    }
}

#[test]
fn weekend_spanning_task() {
    let mut x = Task::new("x", "a0").name("X").duration(5);
    x.constraint_type = ConstraintType::Snet;
    x.constraint_date = Some(date(2025, 1, 3));

    let calendar = mon_fri();
    let output = scheduler_solver::calculate(&[x], &calendar, date(2025, 1, 3));
    let sx = &output.schedules["x"];

    assert_eq!(sx.start, date(2025, 1, 3));
    assert_eq!(sx.end, date(2025, 1, 9));
    assert_eq!(scheduler_core::calendar::calc_work_days(&calendar, sx.start, sx.end), 5);
}

#[test]
fn lag_and_start_to_start() {
    let mut a = Task::new("a", "a0").name("A").duration(4);
    a.constraint_type = ConstraintType::Snet;
    a.constraint_date = Some(date(2025, 1, 6));
    let b = Task::new("b", "a1")
        .name("B")
        .duration(2)
        .depends_on(Dependency::new("a", LinkType::StartToStart, 2));

    let output = scheduler_solver::calculate(&[a.clone(), b.clone()], &mon_fri(), date(2025, 1, 6));
    assert_eq!(output.schedules["b"].start, date(2025, 1, 8));

    let mut a_later = a;
    a_later.constraint_date = Some(date(2025, 1, 7));
    let output = scheduler_solver::calculate(&[a_later, b], &mon_fri(), date(2025, 1, 6));
    assert_eq!(output.schedules["b"].start, date(2025, 1, 9));
}

#[test]
fn fnlt_conflict_exposes_negative_float() {
    let mut p = Task::new("p", "a0").name("P").duration(1);
    p.constraint_type = ConstraintType::Snet;
    p.constraint_date = Some(date(2025, 1, 8));
    let mut t = Task::new("t", "a1").name("T").duration(5);
    t.constraint_type = ConstraintType::Fnlt;
    t.constraint_date = Some(date(2025, 1, 10));
    t.dependencies = vec![Dependency::new("p", LinkType::FinishToStart, 0)];

    let output = scheduler_solver::calculate(&[p, t], &mon_fri(), date(2025, 1, 6));
    let st = &output.schedules["t"];
    assert_eq!(st.start, date(2025, 1, 6));
    assert_eq!(st.end, date(2025, 1, 10));
    assert!(st.total_float <= 0);
}

#[test]
fn milestone_has_equal_start_and_end() {
    let milestone = Task::new("m", "a0").name("Kickoff").duration(0);
    let output = scheduler_solver::calculate(&[milestone], &mon_fri(), date(2025, 1, 6));
    let s = &output.schedules["m"];
    assert_eq!(s.start, s.end);
}

#[test]
fn mfo_pins_the_finish_date_regardless_of_predecessor_pressure() {
    let mut p = Task::new("p", "a0").name("P").duration(10);
    p.constraint_type = ConstraintType::Snet;
    p.constraint_date = Some(date(2025, 1, 6));
    let mut t = Task::new("t", "a1").name("T").duration(2);
    t.constraint_type = ConstraintType::Mfo;
    t.constraint_date = Some(date(2025, 1, 8));
    t.dependencies = vec![Dependency::new("p", LinkType::FinishToStart, 0)];

    let output = scheduler_solver::calculate(&[p, t], &mon_fri(), date(2025, 1, 6));
    assert_eq!(output.schedules["t"].end, date(2025, 1, 8));
}

#[test]
fn empty_task_list_returns_immediately() {
    let output = scheduler_solver::calculate(&[], &mon_fri(), date(2025, 1, 6));
    assert!(output.schedules.is_empty());
    assert_eq!(output.stats.task_count, 0);
    assert!(!output.stats.diverged);
}

#[test]
fn parent_dates_roll_up_from_children() {
    let mut parent = Task::new("parent", "a0").name("Parent");
    let child_a = Task::new("child-a", "a0a0").name("Child A").duration(2).parent("parent");
    let child_b = Task::new("child-b", "a0a1")
        .name("Child B")
        .duration(3)
        .parent("parent")
        .depends_on(Dependency::new("child-a", LinkType::FinishToStart, 0));
    parent.parent_id = None;

    let output = scheduler_solver::calculate(&[parent, child_a, child_b], &mon_fri(), date(2025, 1, 6));
    let sa = output.schedules["child-a"].clone();
    let sb = output.schedules["child-b"].clone();
    let sp = &output.schedules["parent"];

    assert_eq!(sp.start, sa.start);
    assert_eq!(sp.end, sb.end);
}

#[test]
fn calculate_is_a_fixed_point() {
    let a = Task::new("a", "a0").name("A").duration(3);
    let b = Task::new("b", "a1")
        .name("B")
        .duration(2)
        .depends_on(Dependency::new("a", LinkType::FinishToStart, 0));

    let today = date(2025, 1, 6);
    let first = scheduler_solver::calculate(&[a.clone(), b.clone()], &mon_fri(), today);
    let second = scheduler_solver::calculate(&[a, b], &mon_fri(), today);

    assert_eq!(first.schedules["a"].start, second.schedules["a"].start);
    assert_eq!(first.schedules["b"].end, second.schedules["b"].end);
}
