use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dependency::Dependency;

/// A user-imposed date rule modifying the CPM engine's candidate start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    /// As soon as possible — the default, unconstrained candidate start.
    Asap,
    /// Start no earlier than.
    Snet,
    /// Start no later than.
    Snlt,
    /// Finish no earlier than.
    Fnet,
    /// Finish no later than.
    Fnlt,
    /// Must finish on — hard pin.
    Mfo,
}

impl Default for ConstraintType {
    fn default() -> Self {
        Self::Asap
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    Auto,
    Manual,
}

impl Default for SchedulingMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Blank rows are spacers, skipped by the CPM engine. Phantom rows are
/// placeholders (e.g. rolled-up milestones) that also carry no schedule of
/// their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowType {
    Task,
    Blank,
    Phantom,
}

impl Default for RowType {
    fn default() -> Self {
        Self::Task
    }
}

/// Health indicator surfaced alongside float once CPM has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    OnTrack,
    AtRisk,
    /// Mid-pass when the engine hit its iteration cap; float and dates for
    /// this task were not settled by the time the pass gave up.
    Blocked,
}

/// Derived schedule fields. Never persisted, never replayed as an event —
/// a pure function of inputs plus the calendar, published as a parallel
/// "computed" record after each CPM run (see `scheduler-solver`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSchedule {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub late_start: NaiveDate,
    pub late_finish: NaiveDate,
    pub total_float: i32,
    pub free_float: i32,
    pub is_critical: bool,
    pub health: Health,
    pub visual_row_number: u32,
}

/// The atomic unit of scheduling.
///
/// Only the input fields live here; derived fields are published separately
/// by the solver (see `DerivedSchedule`) so that every write path is
/// guaranteed to strip them rather than relying on field-by-field discipline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub sort_key: String,
    #[serde(default)]
    pub row_type: RowType,

    pub notes: String,
    /// Non-negative working days; 0 denotes a milestone.
    pub duration: u32,
    #[serde(default)]
    pub constraint_type: ConstraintType,
    pub constraint_date: Option<NaiveDate>,
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub scheduling_mode: SchedulingMode,
    /// 0-100.
    pub progress: u8,
    #[serde(default)]
    pub trade_partner_ids: Vec<String>,

    pub baseline_start: Option<NaiveDate>,
    pub baseline_finish: Option<NaiveDate>,
    pub baseline_duration: Option<u32>,

    pub actual_start: Option<NaiveDate>,
    pub actual_finish: Option<NaiveDate>,
    pub remaining_duration: Option<u32>,
}

impl Task {
    pub fn new(id: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            parent_id: None,
            sort_key: sort_key.into(),
            row_type: RowType::Task,
            notes: String::new(),
            duration: 0,
            constraint_type: ConstraintType::Asap,
            constraint_date: None,
            dependencies: Vec::new(),
            scheduling_mode: SchedulingMode::Auto,
            progress: 0,
            trade_partner_ids: Vec::new(),
            baseline_start: None,
            baseline_finish: None,
            baseline_duration: None,
            actual_start: None,
            actual_finish: None,
            remaining_duration: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint_type: ConstraintType, date: Option<NaiveDate>) -> Self {
        self.constraint_type = constraint_type;
        self.constraint_date = date;
        self
    }

    #[must_use]
    pub fn manual(mut self) -> Self {
        self.scheduling_mode = SchedulingMode::Manual;
        self
    }

    pub fn is_milestone(&self) -> bool {
        self.duration == 0
    }

    pub fn is_schedulable(&self) -> bool {
        !matches!(self.row_type, RowType::Blank | RowType::Phantom)
    }
}

/// A typed partial update. Unlisted / unrecognized wire fields are rejected
/// at deserialization rather than silently accepted, and any field not
/// present here cannot be mutated through `TaskModel::update` — this is the
/// compiler-enforced version of the field whitelist the mutation contract
/// requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub duration: Option<u32>,
    pub constraint_type: Option<ConstraintType>,
    pub constraint_date: Option<Option<NaiveDate>>,
    pub scheduling_mode: Option<SchedulingMode>,
    pub progress: Option<u8>,
    pub trade_partner_ids: Option<Vec<String>>,
    pub baseline_start: Option<Option<NaiveDate>>,
    pub baseline_finish: Option<Option<NaiveDate>>,
    pub baseline_duration: Option<Option<u32>>,
    pub actual_start: Option<Option<NaiveDate>>,
    pub actual_finish: Option<Option<NaiveDate>>,
    pub remaining_duration: Option<Option<u32>>,
}
