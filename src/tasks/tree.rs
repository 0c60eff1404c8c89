//! Tree assembler: flattens nested request payloads into persistence rows
//! and nests flat rows back into response trees.
//!
//! Both directions work over an arena keyed by outline number, so
//! parent/child relationships are index lookups and the tree can never
//! contain a cycle. Both directions also track the min baseline-start /
//! max baseline-end of the scope they process, for the aggregator.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::tasks::error::{TaskError, TaskResult};
use crate::tasks::outline;
use crate::tasks::types::{
    BaselineWindow, TaskNode, TaskResourceInput, TaskResourceRow, TaskRow, TaskTree,
};

/// Common annotations propagated to every descendant while flattening.
#[derive(Debug, Clone)]
pub struct FlattenContext {
    pub project_id: Uuid,
    pub acting_user: String,
    pub now: DateTime<Utc>,
}

/// Resource assignments of one flattened task, handed to the synchronizer.
#[derive(Debug, Clone)]
pub struct TaskResources {
    pub task_id: Uuid,
    pub resources: Vec<TaskResourceInput>,
}

/// Result of flattening one payload tree (or batch of trees).
#[derive(Debug, Default)]
pub struct FlattenedBatch {
    pub rows: Vec<TaskRow>,
    pub resources: Vec<TaskResources>,
    pub window: BaselineWindow,
}

/// How the nest direction treats rows whose parent outline is not in scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Subtree scopes (GetTask): the scope root's parent is outside the
    /// scope on purpose, so out-of-scope parents promote the row to a root.
    PromoteToRoot,
    /// Top-level filtered project views: a subtask row never appears in the
    /// root list, so orphaned subtasks are dropped.
    DropSubtasks,
}

/// Depth-first flatten of a nested payload. `root_outline` is the outline
/// number already reserved for `node`; descendants are renumbered
/// `<parent>.<1-based index>`. Display ids are drawn from `next_display_id`
/// for every node (existing rows keep theirs at write time).
pub fn flatten_tree(
    node: &TaskNode,
    root_outline: String,
    ctx: &FlattenContext,
    next_display_id: &mut i64,
    out: &mut FlattenedBatch,
) -> TaskResult<()> {
    if !node.segments.is_empty() && !node.subtasks.is_empty() {
        return Err(TaskError::validation(format!(
            "task '{}' is segmented and cannot have subtasks",
            node.name
        )));
    }
    if let Some(p) = node.progress {
        if !(0.0..=100.0).contains(&p) {
            return Err(TaskError::validation(format!(
                "task '{}' progress {} is outside 0..=100",
                node.name, p
            )));
        }
    }

    let id = node.id.unwrap_or_else(Uuid::new_v4);
    let display_id = *next_display_id;
    *next_display_id += 1;

    out.window.fold(node.baseline_start, node.baseline_end);
    out.rows.push(TaskRow {
        id,
        project_id: ctx.project_id,
        display_id,
        name: node.name.clone(),
        start_date: node.start_date,
        end_date: node.end_date,
        baseline_start: node.baseline_start,
        baseline_end: node.baseline_end,
        duration: node.duration,
        progress: node.progress,
        cost: node.cost,
        predecessor: node.predecessor.clone(),
        outline_number: root_outline.clone(),
        segments: node.segments.clone(),
        indicators: node.indicators.clone(),
        resource_groups: node.resource_groups.clone(),
        is_subtask: outline::depth(&root_outline) > 1,
        deleted: false,
        created_by: ctx.acting_user.clone(),
        updated_by: Some(ctx.acting_user.clone()),
        created_at: ctx.now,
        updated_at: ctx.now,
    });
    out.resources.push(TaskResources {
        task_id: id,
        resources: node.resources.clone(),
    });

    for (i, child) in node.subtasks.iter().enumerate() {
        flatten_tree(child, outline::child_at(&root_outline, i), ctx, next_display_id, out)?;
    }
    Ok(())
}

/// Nest flat rows into trees. Rows are sorted by segment-wise outline order
/// first, which guarantees every parent is placed before its children and
/// that sibling order matches depth-first outline order. Returns the trees
/// plus the baseline window of the whole scope.
pub fn nest_rows<F>(
    rows: Vec<TaskRow>,
    resources: Vec<TaskResourceRow>,
    editable: F,
    orphans: OrphanPolicy,
) -> (Vec<TaskTree>, BaselineWindow)
where
    F: Fn(&TaskRow) -> bool,
{
    let mut window = BaselineWindow::default();
    for row in &rows {
        window.fold(row.baseline_start, row.baseline_end);
    }

    let mut by_task: HashMap<Uuid, Vec<TaskResourceRow>> = HashMap::new();
    for r in resources {
        by_task.entry(r.task_id).or_default().push(r);
    }

    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| outline::compare(&rows[a].outline_number, &rows[b].outline_number));

    let index_of: HashMap<String, usize> = order
        .iter()
        .map(|&i| (rows[i].outline_number.clone(), i))
        .collect();

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for &i in &order {
        let parent = outline::parent_of(&rows[i].outline_number)
            .and_then(|p| index_of.get(p).copied());
        match parent {
            Some(p) => children.entry(p).or_default().push(i),
            None if rows[i].is_subtask && orphans == OrphanPolicy::DropSubtasks => {}
            None => roots.push(i),
        }
    }

    let mut slots: Vec<Option<TaskTree>> = rows
        .into_iter()
        .map(|row| {
            let is_editable = editable(&row);
            let resources = by_task.remove(&row.id).unwrap_or_default();
            Some(TaskTree {
                task: row,
                resources,
                is_editable,
                subtasks: Vec::new(),
            })
        })
        .collect();

    fn build(
        idx: usize,
        slots: &mut Vec<Option<TaskTree>>,
        children: &HashMap<usize, Vec<usize>>,
    ) -> TaskTree {
        let mut tree = slots[idx].take().expect("task placed twice in tree");
        if let Some(kids) = children.get(&idx) {
            for &c in kids {
                tree.subtasks.push(build(c, slots, children));
            }
        }
        tree
    }

    let trees = roots
        .into_iter()
        .map(|r| build(r, &mut slots, &children))
        .collect();
    (trees, window)
}
