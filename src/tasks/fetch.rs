//! Multi-project fetch orchestrator.
//!
//! One concurrent read-only unit of work per requested project, joined with
//! an explicit barrier: every unit runs to completion before the first error
//! is inspected, so a failing project never cancels its siblings. Units
//! never mutate state and never open their own transaction.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::projects::store as projects;
use crate::projects::types::{EventMark, ProjectStatus};
use crate::tasks::error::{TaskError, TaskResult};
use crate::tasks::policy::{can_modify, AccessFacts, Caller, PM_ROLE};
use crate::tasks::store;
use crate::tasks::tree::{nest_rows, OrphanPolicy};
use crate::tasks::types::{TaskRow, TaskTree};

#[derive(Debug, Clone, Copy)]
pub struct TaskFilters {
    /// Use the top-level filtered nest variant: subtask rows only appear
    /// under their parents, never in the root list.
    pub top_level_only: bool,
    pub include_event_marks: bool,
}

impl Default for TaskFilters {
    fn default() -> Self {
        Self {
            top_level_only: false,
            include_event_marks: true,
        }
    }
}

/// Assembled view of one project's task tree.
#[derive(Debug, Serialize)]
pub struct ProjectTasksView {
    pub project_id: Uuid,
    pub project_status: ProjectStatus,
    /// Whether the caller may edit the whole list.
    pub is_editable: bool,
    /// Earliest start across merged baseline/actual start dates.
    pub project_start_date: Option<chrono::NaiveDate>,
    pub tasks: Vec<TaskTree>,
    pub event_marks: Vec<EventMark>,
}

/// Fetch and assemble each project's tree concurrently. The per-project map
/// is only returned when every unit succeeded; otherwise the first error (in
/// request order) is reported after all units have finished.
pub async fn fetch_projects(
    pool: &SqlitePool,
    caller: &Caller,
    project_ids: &[Uuid],
    filters: &TaskFilters,
) -> TaskResult<HashMap<Uuid, ProjectTasksView>> {
    let units = project_ids
        .iter()
        .map(|&pid| fetch_one_project(pool, caller, pid, filters));
    let results = join_all(units).await;

    let mut views = HashMap::with_capacity(project_ids.len());
    let mut first_error: Option<TaskError> = None;
    for (pid, result) in project_ids.iter().zip(results) {
        match result {
            Ok(view) => {
                views.insert(*pid, view);
            }
            Err(e) => {
                warn!("Fetching tasks for project {} failed: {}", pid, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    info!("Assembled task trees for {} project(s)", views.len());
    Ok(views)
}

async fn fetch_one_project(
    pool: &SqlitePool,
    caller: &Caller,
    project_id: Uuid,
    filters: &TaskFilters,
) -> TaskResult<ProjectTasksView> {
    let project = projects::fetch_project(pool, project_id)
        .await?
        .ok_or_else(|| TaskError::not_found(format!("project {project_id}")))?;

    let rows = store::fetch_live_tasks(pool, project_id).await?;
    let task_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let assignments = store::fetch_task_resources(pool, &task_ids).await?;
    let roster = projects::fetch_project_resources(pool, project_id).await?;

    let pm_resource_ids: Vec<String> = roster
        .iter()
        .filter(|r| r.role.as_deref() == Some(PM_ROLE))
        .map(|r| r.resource_id.clone())
        .collect();

    let mut assigned_by_task: HashMap<Uuid, Vec<String>> = HashMap::new();
    for a in &assignments {
        assigned_by_task
            .entry(a.task_id)
            .or_default()
            .push(a.resource_id.clone());
    }

    let project_start_date = earliest_start(&rows);

    let project_creator = project.created_by.clone();
    let editable = |row: &TaskRow| {
        let facts = AccessFacts {
            project_creator: Some(project_creator.clone()),
            task_creators: vec![row.created_by.clone()],
            pm_resource_ids: pm_resource_ids.clone(),
            assigned_resource_ids: assigned_by_task.get(&row.id).cloned().unwrap_or_default(),
        };
        can_modify(caller, &facts)
    };

    let orphans = if filters.top_level_only {
        OrphanPolicy::DropSubtasks
    } else {
        OrphanPolicy::PromoteToRoot
    };
    let (tasks, _window) = nest_rows(rows, assignments, editable, orphans);

    // The whole list is editable when the caller holds a project-level grant
    // or may edit every task individually.
    let project_facts = AccessFacts {
        project_creator: Some(project.created_by.clone()),
        pm_resource_ids: pm_resource_ids.clone(),
        ..Default::default()
    };
    let is_editable =
        can_modify(caller, &project_facts) || all_editable(&tasks);

    let event_marks = if filters.include_event_marks {
        projects::fetch_event_marks(pool, project_id).await?
    } else {
        Vec::new()
    };

    Ok(ProjectTasksView {
        project_id,
        project_status: project.status,
        is_editable,
        project_start_date,
        tasks,
        event_marks,
    })
}

/// Min over baseline and actual start dates of all tasks and subtasks.
fn earliest_start(rows: &[TaskRow]) -> Option<chrono::NaiveDate> {
    rows.iter()
        .flat_map(|r| [r.start_date, r.baseline_start])
        .flatten()
        .min()
}

fn all_editable(trees: &[TaskTree]) -> bool {
    trees
        .iter()
        .all(|t| t.is_editable && all_editable(&t.subtasks))
}

/// Dedup helper for handlers parsing comma-separated project id lists.
pub fn parse_project_ids(raw: &str) -> TaskResult<Vec<Uuid>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = Uuid::parse_str(part)
            .map_err(|_| TaskError::validation(format!("invalid project id '{part}'")))?;
        if seen.insert(id) {
            out.push(id);
        }
    }
    if out.is_empty() {
        return Err(TaskError::validation("no project ids supplied"));
    }
    Ok(out)
}
