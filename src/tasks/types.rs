// src/tasks/types.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dated portion of a single task. A task carrying segments is childless
/// by invariant: segmentation and subdivision are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A dated marker rendered on the task bar (milestone flag, warning, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub label: String,
    pub mark_date: NaiveDate,
    pub color: Option<String>,
}

/// A named grouping of resources shown against the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub resource_ids: Vec<String>,
}

/// One resource assignment supplied on a task write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResourceInput {
    pub resource_id: String,
    /// Allocation percentage, >= 0.
    pub units: f64,
}

/// A persisted task-resource join row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResourceRow {
    pub task_id: Uuid,
    pub resource_id: String,
    pub units: f64,
    pub created_by: String,
    pub updated_by: Option<String>,
}

/// Flat persisted task record. Tree position and sibling order live entirely
/// in `outline_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub display_id: i64,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub baseline_start: Option<NaiveDate>,
    pub baseline_end: Option<NaiveDate>,
    /// Working days.
    pub duration: Option<i64>,
    /// 0..=100.
    pub progress: Option<f64>,
    pub cost: Option<f64>,
    /// Free-text predecessor reference.
    pub predecessor: Option<String>,
    pub outline_number: String,
    pub segments: Vec<Segment>,
    pub indicators: Vec<Indicator>,
    pub resource_groups: Vec<ResourceGroup>,
    pub is_subtask: bool,
    pub deleted: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nested task payload for create/update requests. Subtasks nest to
/// arbitrary depth; the flattener assigns outline numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    /// Present on update, absent on create.
    pub id: Option<Uuid>,
    /// Attach point for a single create; ignored for nested subtasks.
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub baseline_start: Option<NaiveDate>,
    pub baseline_end: Option<NaiveDate>,
    pub duration: Option<i64>,
    pub progress: Option<f64>,
    pub cost: Option<f64>,
    pub predecessor: Option<String>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub indicators: Vec<Indicator>,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
    #[serde(default)]
    pub resources: Vec<TaskResourceInput>,
    #[serde(default)]
    pub subtasks: Vec<TaskNode>,
}

/// Nested response tree: a task row plus its resources and children,
/// children in outline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    #[serde(flatten)]
    pub task: TaskRow,
    pub resources: Vec<TaskResourceRow>,
    pub is_editable: bool,
    pub subtasks: Vec<TaskTree>,
}

/// Min baseline-start / max baseline-end over a set of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaselineWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl BaselineWindow {
    pub fn fold(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        if let Some(s) = start {
            self.start = Some(self.start.map_or(s, |cur| cur.min(s)));
        }
        if let Some(e) = end {
            self.end = Some(self.end.map_or(e, |cur| cur.max(e)));
        }
    }

    pub fn merge(&mut self, other: BaselineWindow) {
        self.fold(other.start, other.end);
    }
}
