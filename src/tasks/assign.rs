//! Resource-assignment synchronizer.
//!
//! On every task write the task's resource set is replaced wholesale: one
//! bulk delete of the old rows, one bulk insert of the new set. Any resource
//! referenced without a project roster row gets one synthesized (role unset,
//! editable, created by the acting user). Runs inside the caller's
//! transaction; a failure aborts the whole mutation.

use std::collections::HashSet;

use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::projects::store as projects;
use crate::projects::types::ProjectResourceRow;
use crate::tasks::error::{TaskError, TaskResult};
use crate::tasks::store;
use crate::tasks::tree::TaskResources;
use crate::tasks::types::TaskResourceRow;

pub async fn sync_task_resources(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    sets: &[TaskResources],
    acting_user: &str,
) -> TaskResult<()> {
    if sets.is_empty() {
        return Ok(());
    }

    let mut inserts: Vec<TaskResourceRow> = Vec::new();
    for set in sets {
        let mut seen: HashSet<&str> = HashSet::new();
        for input in &set.resources {
            if input.units < 0.0 {
                return Err(TaskError::validation(format!(
                    "allocation units for resource '{}' must be >= 0",
                    input.resource_id
                )));
            }
            // (task, resource) exists at most once; duplicates collapse
            if !seen.insert(input.resource_id.as_str()) {
                continue;
            }
            inserts.push(TaskResourceRow {
                task_id: set.task_id,
                resource_id: input.resource_id.clone(),
                units: input.units,
                created_by: acting_user.to_string(),
                updated_by: Some(acting_user.to_string()),
            });
        }
    }

    let task_ids: Vec<Uuid> = sets.iter().map(|s| s.task_id).collect();
    store::delete_task_resources(conn, &task_ids).await?;
    store::insert_task_resources(conn, &inserts).await?;

    backfill_roster(conn, project_id, &inserts, acting_user).await
}

/// Insert project_resources rows for referenced resources missing from the
/// roster, in one bulk operation.
async fn backfill_roster(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    inserts: &[TaskResourceRow],
    acting_user: &str,
) -> TaskResult<()> {
    let referenced: HashSet<&str> = inserts.iter().map(|r| r.resource_id.as_str()).collect();
    if referenced.is_empty() {
        return Ok(());
    }

    let roster = projects::fetch_project_resources(&mut *conn, project_id).await?;
    let existing: HashSet<&str> = roster.iter().map(|r| r.resource_id.as_str()).collect();

    let mut missing: Vec<&str> = referenced.difference(&existing).copied().collect();
    missing.sort_unstable();

    let rows: Vec<ProjectResourceRow> = missing
        .into_iter()
        .map(|resource_id| ProjectResourceRow {
            project_id,
            resource_id: resource_id.to_string(),
            role: None,
            editable: true,
            created_by: acting_user.to_string(),
        })
        .collect();
    projects::insert_project_resources(conn, &rows).await
}
