//! sqlx access to tasks and task_resources.
//!
//! Structured sub-fields (segments, indicators, resource groups) live as
//! JSON text columns and are encoded/decoded only here, at the storage
//! boundary. Reads are generic over the executor; mutations take the
//! transaction connection so every write composes into one transaction.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::projects::store::parse_uuid;
use crate::tasks::error::TaskResult;
use crate::tasks::types::{TaskResourceRow, TaskRow};

const TASK_COLUMNS: &str = "id, project_id, display_id, name, start_date, end_date, \
     baseline_start, baseline_end, duration, progress, cost, predecessor, \
     outline_number, segments, indicators, resource_groups, is_subtask, deleted, \
     created_by, updated_by, created_at, updated_at";

fn encode_json<T: Serialize>(value: &[T]) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

fn decode_json<T: DeserializeOwned>(text: String, column: &str) -> Result<Vec<T>, sqlx::Error> {
    serde_json::from_str(&text).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn row_to_task(row: &SqliteRow) -> Result<TaskRow, sqlx::Error> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let segments: String = row.get("segments");
    let indicators: String = row.get("indicators");
    let resource_groups: String = row.get("resource_groups");

    Ok(TaskRow {
        id: parse_uuid(id, "id")?,
        project_id: parse_uuid(project_id, "project_id")?,
        display_id: row.get("display_id"),
        name: row.get("name"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        baseline_start: row.get("baseline_start"),
        baseline_end: row.get("baseline_end"),
        duration: row.get("duration"),
        progress: row.get("progress"),
        cost: row.get("cost"),
        predecessor: row.get("predecessor"),
        outline_number: row.get("outline_number"),
        segments: decode_json(segments, "segments")?,
        indicators: decode_json(indicators, "indicators")?,
        resource_groups: decode_json(resource_groups, "resource_groups")?,
        is_subtask: row.get("is_subtask"),
        deleted: row.get("deleted"),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn fetch_task<'e, E>(executor: E, id: Uuid) -> TaskResult<Option<TaskRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND deleted = 0"
    ))
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;

    row.map(|r| row_to_task(&r)).transpose().map_err(Into::into)
}

/// All live (non-deleted) tasks of a project. Outline ordering is applied in
/// Rust; SQL cannot sort dotted numbers segment-wise.
pub async fn fetch_live_tasks<'e, E>(executor: E, project_id: Uuid) -> TaskResult<Vec<TaskRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ? AND deleted = 0"
    ))
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(row_to_task(&row)?);
    }
    Ok(out)
}

/// Outline numbers of all live tasks of a project, for sibling queries.
pub async fn fetch_live_outlines<'e, E>(executor: E, project_id: Uuid) -> TaskResult<Vec<String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows =
        sqlx::query("SELECT outline_number FROM tasks WHERE project_id = ? AND deleted = 0")
            .bind(project_id.to_string())
            .fetch_all(executor)
            .await?;
    Ok(rows.into_iter().map(|r| r.get("outline_number")).collect())
}

/// Next per-project display id, assigned inside the write transaction.
pub async fn next_display_id(conn: &mut SqliteConnection, project_id: Uuid) -> TaskResult<i64> {
    let max: Option<i64> =
        sqlx::query_scalar("SELECT MAX(display_id) FROM tasks WHERE project_id = ? AND deleted = 0")
            .bind(project_id.to_string())
            .fetch_one(conn)
            .await?;
    Ok(max.unwrap_or(0) + 1)
}

pub async fn insert_task(conn: &mut SqliteConnection, task: &TaskRow) -> TaskResult<()> {
    sqlx::query(
        r#"
        INSERT INTO tasks (
            id, project_id, display_id, name, start_date, end_date,
            baseline_start, baseline_end, duration, progress, cost, predecessor,
            outline_number, segments, indicators, resource_groups, is_subtask,
            deleted, created_by, updated_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(task.id.to_string())
    .bind(task.project_id.to_string())
    .bind(task.display_id)
    .bind(&task.name)
    .bind(task.start_date)
    .bind(task.end_date)
    .bind(task.baseline_start)
    .bind(task.baseline_end)
    .bind(task.duration)
    .bind(task.progress)
    .bind(task.cost)
    .bind(&task.predecessor)
    .bind(&task.outline_number)
    .bind(encode_json(&task.segments))
    .bind(encode_json(&task.indicators))
    .bind(encode_json(&task.resource_groups))
    .bind(task.is_subtask)
    .bind(task.deleted)
    .bind(&task.created_by)
    .bind(&task.updated_by)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Full update of a task's mutable fields. Creator identity, creation time
/// and display id are immutable once written.
pub async fn update_task(conn: &mut SqliteConnection, task: &TaskRow) -> TaskResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE tasks SET
            name = ?, start_date = ?, end_date = ?, baseline_start = ?,
            baseline_end = ?, duration = ?, progress = ?, cost = ?,
            predecessor = ?, outline_number = ?, segments = ?, indicators = ?,
            resource_groups = ?, is_subtask = ?, updated_by = ?, updated_at = ?
        WHERE id = ? AND deleted = 0
        "#,
    )
    .bind(&task.name)
    .bind(task.start_date)
    .bind(task.end_date)
    .bind(task.baseline_start)
    .bind(task.baseline_end)
    .bind(task.duration)
    .bind(task.progress)
    .bind(task.cost)
    .bind(&task.predecessor)
    .bind(&task.outline_number)
    .bind(encode_json(&task.segments))
    .bind(encode_json(&task.indicators))
    .bind(encode_json(&task.resource_groups))
    .bind(task.is_subtask)
    .bind(&task.updated_by)
    .bind(task.updated_at)
    .bind(task.id.to_string())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Soft delete: rows are marked, never removed, and every aggregate query
/// filters on `deleted = 0`.
pub async fn soft_delete_tasks(
    conn: &mut SqliteConnection,
    task_ids: &[Uuid],
    updated_by: &str,
) -> TaskResult<()> {
    if task_ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; task_ids.len()].join(",");
    let sql = format!(
        "UPDATE tasks SET deleted = 1, updated_by = ?, updated_at = ? WHERE id IN ({placeholders})"
    );
    let mut query = sqlx::query(&sql).bind(updated_by).bind(Utc::now());
    for id in task_ids {
        query = query.bind(id.to_string());
    }
    query.execute(conn).await?;
    Ok(())
}

pub async fn fetch_task_resources<'e, E>(
    executor: E,
    task_ids: &[Uuid],
) -> TaskResult<Vec<TaskResourceRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; task_ids.len()].join(",");
    let sql = format!(
        "SELECT task_id, resource_id, units, created_by, updated_by \
         FROM task_resources WHERE task_id IN ({placeholders})"
    );
    let mut query = sqlx::query(&sql);
    for id in task_ids {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(executor).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let task_id: String = row.get("task_id");
        out.push(TaskResourceRow {
            task_id: parse_uuid(task_id, "task_id")?,
            resource_id: row.get("resource_id"),
            units: row.get("units"),
            created_by: row.get("created_by"),
            updated_by: row.get("updated_by"),
        });
    }
    Ok(out)
}

/// One bulk delete for the whole written task set, never per-row.
pub async fn delete_task_resources(
    conn: &mut SqliteConnection,
    task_ids: &[Uuid],
) -> TaskResult<()> {
    if task_ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; task_ids.len()].join(",");
    let sql = format!("DELETE FROM task_resources WHERE task_id IN ({placeholders})");
    let mut query = sqlx::query(&sql);
    for id in task_ids {
        query = query.bind(id.to_string());
    }
    query.execute(conn).await?;
    Ok(())
}

/// One bulk insert for the whole written task set, never per-row.
pub async fn insert_task_resources(
    conn: &mut SqliteConnection,
    rows: &[TaskResourceRow],
) -> TaskResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["(?, ?, ?, ?, ?)"; rows.len()].join(", ");
    let sql = format!(
        "INSERT INTO task_resources (task_id, resource_id, units, created_by, updated_by) VALUES {placeholders}"
    );
    let mut query = sqlx::query(&sql);
    for r in rows {
        query = query
            .bind(r.task_id.to_string())
            .bind(&r.resource_id)
            .bind(r.units)
            .bind(&r.created_by)
            .bind(&r.updated_by);
    }
    query.execute(conn).await?;
    Ok(())
}
