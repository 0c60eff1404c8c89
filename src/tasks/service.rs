//! The task engine service: every exposed operation runs here.
//!
//! Mutation flow: begin transaction -> permission gate -> flatten ->
//! outline numbering -> batch write -> resource sync -> baseline
//! recompute -> commit. The transaction rolls back on drop, so any early
//! return leaves the database unchanged; only the success path commits.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::projects::store as projects;
use crate::projects::types::{Project, ProjectResourceRow};
use crate::tasks::assign::sync_task_resources;
use crate::tasks::baseline::recompute_project_window;
use crate::tasks::error::{TaskError, TaskResult};
use crate::tasks::fetch::{self, ProjectTasksView, TaskFilters};
use crate::tasks::outline;
use crate::tasks::policy::{can_modify, denial_reason, AccessFacts, Caller, PM_ROLE};
use crate::tasks::store;
use crate::tasks::tree::{flatten_tree, nest_rows, FlattenContext, FlattenedBatch, OrphanPolicy};
use crate::tasks::types::{BaselineWindow, TaskNode, TaskRow, TaskTree};

#[derive(Clone)]
pub struct TaskService {
    pool: SqlitePool,
}

/// Everything one flattened write changed, for the aggregator call that
/// closes the operation.
struct WriteOutcome {
    project_id: Uuid,
    root_id: Uuid,
    window: BaselineWindow,
    written_ids: Vec<Uuid>,
    deleted_ids: Vec<Uuid>,
}

impl TaskService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create one task (optionally a subtask via `parent_id`, optionally
    /// carrying nested subtasks). Returns the new root task id.
    pub async fn create_task(
        &self,
        project_id: Uuid,
        node: TaskNode,
        caller: &Caller,
    ) -> TaskResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        let project = require_project(&mut tx, project_id).await?;
        let facts = gather_facts(&mut tx, &project, &[]).await?;
        require_permission(caller, &facts)?;

        let outcome = apply_create(&mut tx, &project, &node, caller).await?;
        recompute_project_window(&mut tx, project_id, &[], outcome.window).await?;

        tx.commit().await?;
        info!(
            "Created task {} in project {} (outline root)",
            outcome.root_id, project_id
        );
        Ok(outcome.root_id)
    }

    /// Batch root create: every tree becomes a new top-level task of the
    /// batch's project, numbered consecutively. All-or-nothing.
    pub async fn create_tasks(
        &self,
        project_id: Uuid,
        trees: Vec<TaskNode>,
        caller: &Caller,
    ) -> TaskResult<()> {
        if trees.is_empty() {
            return Err(TaskError::validation("batch create requires at least one task"));
        }
        let mut tx = self.pool.begin().await?;

        let project = require_project(&mut tx, project_id).await?;
        let facts = gather_facts(&mut tx, &project, &[]).await?;
        require_permission(caller, &facts)?;

        let outlines = store::fetch_live_outlines(&mut *tx, project_id).await?;
        let mut root_outline = outline::next_root(deepest_root(&outlines));
        let mut display = store::next_display_id(&mut tx, project_id).await?;
        let ctx = FlattenContext {
            project_id,
            acting_user: caller.user_id.clone(),
            now: Utc::now(),
        };

        let mut batch = FlattenedBatch::default();
        for node in &trees {
            flatten_tree(node, root_outline.clone(), &ctx, &mut display, &mut batch)?;
            root_outline = outline::increment(&root_outline);
        }

        for row in &batch.rows {
            store::insert_task(&mut tx, row).await?;
        }
        sync_task_resources(&mut tx, project_id, &batch.resources, &caller.user_id).await?;
        recompute_project_window(&mut tx, project_id, &[], batch.window).await?;

        tx.commit().await?;
        info!(
            "Created {} task row(s) across {} tree(s) in project {}",
            batch.rows.len(),
            trees.len(),
            project_id
        );
        Ok(())
    }

    /// Update one task tree. The payload subtree is authoritative: stored
    /// descendants absent from it are soft-deleted, keeping outline numbers
    /// unique under renumbering. Returns the root task id.
    pub async fn update_task(&self, node: TaskNode, caller: &Caller) -> TaskResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        let outcome = apply_tree_update(&mut tx, &node, caller).await?;
        let mut excluded = outcome.written_ids.clone();
        excluded.extend(&outcome.deleted_ids);
        recompute_project_window(&mut tx, outcome.project_id, &excluded, outcome.window).await?;

        tx.commit().await?;
        info!("Updated task {} (project {})", outcome.root_id, outcome.project_id);
        Ok(outcome.root_id)
    }

    /// Batch update. One transaction; the baseline aggregator runs once per
    /// affected project after all trees are written.
    pub async fn update_tasks(&self, trees: Vec<TaskNode>, caller: &Caller) -> TaskResult<()> {
        if trees.is_empty() {
            return Err(TaskError::validation("batch update requires at least one task"));
        }
        let mut tx = self.pool.begin().await?;

        let mut windows: HashMap<Uuid, BaselineWindow> = HashMap::new();
        let mut excluded: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for node in &trees {
            let outcome = apply_tree_update(&mut tx, node, caller).await?;
            windows
                .entry(outcome.project_id)
                .or_default()
                .merge(outcome.window);
            let exc = excluded.entry(outcome.project_id).or_default();
            exc.extend(outcome.written_ids);
            exc.extend(outcome.deleted_ids);
        }
        for (project_id, window) in windows {
            let exc = excluded.remove(&project_id).unwrap_or_default();
            recompute_project_window(&mut tx, project_id, &exc, window).await?;
        }

        tx.commit().await?;
        info!("Updated {} task tree(s)", trees.len());
        Ok(())
    }

    /// Soft-delete the listed tasks and all their live descendants, then
    /// shrink the project window accordingly.
    pub async fn delete_tasks(
        &self,
        project_id: Uuid,
        task_ids: Vec<Uuid>,
        caller: &Caller,
    ) -> TaskResult<()> {
        if task_ids.is_empty() {
            return Err(TaskError::validation("no task ids supplied"));
        }
        let mut tx = self.pool.begin().await?;

        let project = require_project(&mut tx, project_id).await?;
        let mut targets = Vec::with_capacity(task_ids.len());
        for id in &task_ids {
            let row = store::fetch_task(&mut *tx, *id)
                .await?
                .ok_or_else(|| TaskError::not_found(format!("task {id}")))?;
            if row.project_id != project_id {
                return Err(TaskError::validation(format!(
                    "task {id} does not belong to project {project_id}"
                )));
            }
            targets.push(row);
        }

        let facts = gather_facts(&mut tx, &project, &targets).await?;
        require_permission(caller, &facts)?;

        // Deleting a task takes its whole subtree with it; an orphaned
        // outline chain would break ancestor resolution.
        let live = store::fetch_live_tasks(&mut *tx, project_id).await?;
        let mut delete_ids: HashSet<Uuid> = targets.iter().map(|t| t.id).collect();
        for row in &live {
            if targets
                .iter()
                .any(|t| outline::is_descendant(&row.outline_number, &t.outline_number))
            {
                delete_ids.insert(row.id);
            }
        }
        let delete_ids: Vec<Uuid> = delete_ids.into_iter().collect();

        store::soft_delete_tasks(&mut tx, &delete_ids, &caller.user_id).await?;
        recompute_project_window(&mut tx, project_id, &delete_ids, BaselineWindow::default())
            .await?;

        tx.commit().await?;
        info!(
            "Soft-deleted {} task(s) in project {}",
            delete_ids.len(),
            project_id
        );
        Ok(())
    }

    /// Full subtree of one task, nested, with per-task editability.
    pub async fn get_task(&self, id: Uuid, caller: &Caller) -> TaskResult<TaskTree> {
        let root = store::fetch_task(&self.pool, id)
            .await?
            .ok_or_else(|| TaskError::not_found(format!("task {id}")))?;
        let project = projects::fetch_project(&self.pool, root.project_id)
            .await?
            .ok_or_else(|| TaskError::not_found(format!("project {}", root.project_id)))?;

        let live = store::fetch_live_tasks(&self.pool, root.project_id).await?;
        let scope: Vec<TaskRow> = live
            .into_iter()
            .filter(|r| {
                r.id == root.id || outline::is_descendant(&r.outline_number, &root.outline_number)
            })
            .collect();
        let scope_ids: Vec<Uuid> = scope.iter().map(|r| r.id).collect();
        let assignments = store::fetch_task_resources(&self.pool, &scope_ids).await?;
        let roster = projects::fetch_project_resources(&self.pool, root.project_id).await?;
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

        let creator = project.created_by.clone();
        let editable = |row: &TaskRow| {
            let facts = AccessFacts {
                project_creator: Some(creator.clone()),
                task_creators: vec![row.created_by.clone()],
                pm_resource_ids: pm_resource_ids.clone(),
                assigned_resource_ids: assigned_by_task.get(&row.id).cloned().unwrap_or_default(),
            };
            can_modify(caller, &facts)
        };

        let (trees, _) = nest_rows(scope, assignments, editable, OrphanPolicy::PromoteToRoot);
        trees
            .into_iter()
            .find(|t| t.task.id == id)
            .ok_or_else(|| TaskError::not_found(format!("task {id}")))
    }

    /// Concurrent multi-project view; see `fetch::fetch_projects`.
    pub async fn get_tasks_by_projects(
        &self,
        caller: &Caller,
        project_ids: &[Uuid],
        filters: &TaskFilters,
    ) -> TaskResult<HashMap<Uuid, ProjectTasksView>> {
        fetch::fetch_projects(&self.pool, caller, project_ids, filters).await
    }
}

/// Fetch the project and take the row write-lock (`touch`) so the sibling
/// outline queries below are serialized against concurrent mutations.
async fn require_project(
    conn: &mut SqliteConnection,
    project_id: Uuid,
) -> TaskResult<Project> {
    let project = projects::fetch_project(&mut *conn, project_id)
        .await?
        .ok_or_else(|| TaskError::not_found(format!("project {project_id}")))?;
    projects::touch_project(conn, project_id).await?;
    Ok(project)
}

/// Facts are re-derived just-in-time for every mutation, never cached.
async fn gather_facts(
    conn: &mut SqliteConnection,
    project: &Project,
    tasks: &[TaskRow],
) -> TaskResult<AccessFacts> {
    let roster = projects::fetch_project_resources(&mut *conn, project.id).await?;
    let pm_resource_ids = roster
        .iter()
        .filter(|r: &&ProjectResourceRow| r.role.as_deref() == Some(PM_ROLE))
        .map(|r| r.resource_id.clone())
        .collect();

    let task_ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
    let assignments = store::fetch_task_resources(&mut *conn, &task_ids).await?;

    Ok(AccessFacts {
        project_creator: Some(project.created_by.clone()),
        task_creators: tasks.iter().map(|t| t.created_by.clone()).collect(),
        pm_resource_ids,
        assigned_resource_ids: assignments.into_iter().map(|a| a.resource_id).collect(),
    })
}

/// Walk an update payload and reject any node id outside the allowed set.
fn require_subtree_ids(node: &TaskNode, allowed: &HashSet<Uuid>) -> TaskResult<()> {
    if let Some(id) = node.id {
        if !allowed.contains(&id) {
            return Err(TaskError::validation(format!(
                "task {id} is not a live member of the updated subtree"
            )));
        }
    }
    for child in &node.subtasks {
        require_subtree_ids(child, allowed)?;
    }
    Ok(())
}

fn require_permission(caller: &Caller, facts: &AccessFacts) -> TaskResult<()> {
    if can_modify(caller, facts) {
        Ok(())
    } else {
        Err(TaskError::PermissionDenied(denial_reason().to_string()))
    }
}

fn deepest_root(outlines: &[String]) -> Option<&str> {
    outlines
        .iter()
        .map(String::as_str)
        .filter(|o| outline::depth(o) == 1)
        .max_by(|a, b| outline::compare(a, b))
}

fn deepest_child<'a>(outlines: &'a [String], parent: &str) -> Option<&'a str> {
    outlines
        .iter()
        .map(String::as_str)
        .filter(|o| outline::is_child_of(o, parent))
        .max_by(|a, b| outline::compare(a, b))
}

/// Flatten-and-insert for a create rooted at the next available outline
/// number (top-level, or under `parent_id`).
async fn apply_create(
    conn: &mut SqliteConnection,
    project: &Project,
    node: &TaskNode,
    caller: &Caller,
) -> TaskResult<WriteOutcome> {
    let outlines = store::fetch_live_outlines(&mut *conn, project.id).await?;

    let root_outline = match node.parent_id {
        Some(parent_id) => {
            let parent = store::fetch_task(&mut *conn, parent_id)
                .await?
                .ok_or_else(|| TaskError::not_found(format!("parent task {parent_id}")))?;
            if parent.project_id != project.id {
                return Err(TaskError::validation(format!(
                    "parent task {parent_id} belongs to another project"
                )));
            }
            if !parent.segments.is_empty() {
                return Err(TaskError::validation(format!(
                    "task '{}' is segmented and cannot acquire subtasks",
                    parent.name
                )));
            }
            outline::next_child(
                &parent.outline_number,
                deepest_child(&outlines, &parent.outline_number),
            )
        }
        None => outline::next_root(deepest_root(&outlines)),
    };

    let mut display = store::next_display_id(&mut *conn, project.id).await?;
    let ctx = FlattenContext {
        project_id: project.id,
        acting_user: caller.user_id.clone(),
        now: Utc::now(),
    };
    let mut batch = FlattenedBatch::default();
    flatten_tree(node, root_outline, &ctx, &mut display, &mut batch)?;

    for row in &batch.rows {
        store::insert_task(&mut *conn, row).await?;
    }
    sync_task_resources(&mut *conn, project.id, &batch.resources, &caller.user_id).await?;

    Ok(WriteOutcome {
        project_id: project.id,
        root_id: batch.rows[0].id,
        window: batch.window,
        written_ids: batch.rows.iter().map(|r| r.id).collect(),
        deleted_ids: Vec::new(),
    })
}

/// One tree of an update operation: permission gate, renumbered flatten,
/// upsert of rows, replacement-delete of absent stored descendants, and the
/// wholesale resource sync. The aggregator call is left to the caller so
/// batches recompute once per project.
async fn apply_tree_update(
    conn: &mut SqliteConnection,
    node: &TaskNode,
    caller: &Caller,
) -> TaskResult<WriteOutcome> {
    let root_id = node
        .id
        .ok_or_else(|| TaskError::validation("task id is required for update"))?;

    let existing = store::fetch_task(&mut *conn, root_id)
        .await?
        .ok_or_else(|| TaskError::not_found(format!("task {root_id}")))?;
    let project = require_project(&mut *conn, existing.project_id).await?;

    let facts = gather_facts(&mut *conn, &project, std::slice::from_ref(&existing)).await?;
    require_permission(caller, &facts)?;

    let live = store::fetch_live_tasks(&mut *conn, project.id).await?;
    let stored_ids: HashSet<Uuid> = live.iter().map(|r| r.id).collect();

    // A payload id may only name the updated root or one of its live
    // descendants. Anything else would renumber a foreign task into this
    // subtree and orphan that task's own children, or resurrect a deleted
    // row onto a conflicting primary key.
    let subtree_ids: HashSet<Uuid> = live
        .iter()
        .filter(|r| {
            r.id == root_id
                || outline::is_descendant(&r.outline_number, &existing.outline_number)
        })
        .map(|r| r.id)
        .collect();
    require_subtree_ids(node, &subtree_ids)?;

    let mut display = store::next_display_id(&mut *conn, project.id).await?;
    let ctx = FlattenContext {
        project_id: project.id,
        acting_user: caller.user_id.clone(),
        now: Utc::now(),
    };
    let mut batch = FlattenedBatch::default();
    flatten_tree(
        node,
        existing.outline_number.clone(),
        &ctx,
        &mut display,
        &mut batch,
    )?;

    let written_ids: HashSet<Uuid> = batch.rows.iter().map(|r| r.id).collect();

    // The payload subtree replaces the stored one: stored descendants the
    // client no longer lists are soft-deleted, which keeps the renumbered
    // outline set unique.
    let deleted_ids: Vec<Uuid> = live
        .iter()
        .filter(|r| {
            outline::is_descendant(&r.outline_number, &existing.outline_number)
                && !written_ids.contains(&r.id)
        })
        .map(|r| r.id)
        .collect();
    store::soft_delete_tasks(&mut *conn, &deleted_ids, &caller.user_id).await?;

    for row in &batch.rows {
        if stored_ids.contains(&row.id) {
            if !store::update_task(&mut *conn, row).await? {
                return Err(TaskError::not_found(format!("task {}", row.id)));
            }
        } else {
            store::insert_task(&mut *conn, row).await?;
        }
    }
    sync_task_resources(&mut *conn, project.id, &batch.resources, &caller.user_id).await?;

    Ok(WriteOutcome {
        project_id: project.id,
        root_id,
        window: batch.window,
        written_ids: written_ids.into_iter().collect(),
        deleted_ids,
    })
}
