use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calendar::Calendar;
use crate::task::Task;
use crate::trade_partner::TradePartner;

/// Before/after value pair for a single-field `TASK_UPDATED` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// A tagged union of every event type the log can hold. Representing
/// events this way (rather than a heterogeneous property bag) makes the
/// materialized-view applier an exhaustive match and removes the need for
/// a separate field whitelist — only persistable variants exist at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "TASK_CREATED")]
    TaskCreated { task: Task },
    #[serde(rename = "TASK_UPDATED")]
    TaskUpdated { task_id: String, change: FieldChange },
    #[serde(rename = "TASK_DELETED")]
    TaskDeleted { task_id: String },
    #[serde(rename = "TASK_MOVED")]
    TaskMoved { task_id: String, new_parent_id: Option<String>, new_sort_key: String },
    #[serde(rename = "CALENDAR_UPDATED")]
    CalendarUpdated { calendar: Calendar },
    #[serde(rename = "TRADE_PARTNER_CREATED")]
    TradePartnerCreated { partner: TradePartner },
    #[serde(rename = "TRADE_PARTNER_UPDATED")]
    TradePartnerUpdated { partner_id: String, change: FieldChange },
    #[serde(rename = "TRADE_PARTNER_DELETED")]
    TradePartnerDeleted { partner_id: String },
    #[serde(rename = "TASK_TRADE_PARTNER_ASSIGNED")]
    TaskTradePartnerAssigned { task_id: String, partner_id: String },
    #[serde(rename = "TASK_TRADE_PARTNER_UNASSIGNED")]
    TaskTradePartnerUnassigned { task_id: String, partner_id: String },
    #[serde(rename = "BASELINE_SET")]
    BaselineSet { task_id: String, start: Value, finish: Value, duration: Value },
    #[serde(rename = "BASELINE_CLEARED")]
    BaselineCleared { task_id: String },
    #[serde(rename = "BULK_UPDATE")]
    BulkUpdate { changes: Vec<(String, FieldChange)> },
    #[serde(rename = "BULK_DELETE")]
    BulkDelete { task_ids: Vec<String> },
    #[serde(rename = "PROJECT_IMPORTED")]
    ProjectImported { tasks: Vec<Task>, calendar: Calendar, trade_partners: Vec<TradePartner> },
    #[serde(rename = "PROJECT_CLEARED")]
    ProjectCleared,
}

/// A single entry in the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub target_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(id: u64, target_id: Option<String>, timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self { id, target_id, timestamp, kind }
    }
}

/// A forward event paired with its inverse, produced by every mutating
/// `TaskModel` call that is not itself a replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPair {
    pub forward: EventKind,
    pub backward: EventKind,
}

/// A periodic materialization of current state, bounding replay cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tasks: Vec<Task>,
    pub calendar: Calendar,
    pub trade_partners: Vec<TradePartner>,
    pub last_event_id: u64,
    pub timestamp: DateTime<Utc>,
}
