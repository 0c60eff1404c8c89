//! sqlx access to the collaborator tables: projects, project_resources,
//! event_marks. Reads are generic over the executor so they run on the pool
//! or inside a transaction; writes take the transaction connection.

use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection};
use uuid::Uuid;

use crate::projects::types::{EventMark, Project, ProjectResourceRow, ProjectStatus};
use crate::tasks::error::TaskResult;

/// Decode a TEXT uuid column, reporting decode failures through sqlx.
pub(crate) fn parse_uuid(value: String, column: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(&value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn row_to_project(row: &SqliteRow) -> Result<Project, sqlx::Error> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    Ok(Project {
        id: parse_uuid(id, "id")?,
        name: row.get("name"),
        status: status.parse().map_err(|e: String| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: e.into(),
        })?,
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn fetch_project<'e, E>(executor: E, id: Uuid) -> TaskResult<Option<Project>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT id, name, status, start_date, end_date, created_by, created_at, updated_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(executor)
    .await?;

    row.map(|r| row_to_project(&r)).transpose().map_err(Into::into)
}

pub async fn create_project(
    conn: &mut SqliteConnection,
    id: Uuid,
    name: &str,
    status: ProjectStatus,
    created_by: &str,
) -> TaskResult<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, name, status, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(name)
    .bind(status.to_string())
    .bind(created_by)
    .bind(Utc::now())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

/// Touch the project row at the start of a mutation. This both verifies the
/// project exists and acquires SQLite's write lock before any sibling
/// outline query, serializing concurrent mutations on the same project.
pub async fn touch_project(conn: &mut SqliteConnection, id: Uuid) -> TaskResult<bool> {
    let result = sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Write the derived schedule window onto the project row.
pub async fn update_project_window(
    conn: &mut SqliteConnection,
    id: Uuid,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> TaskResult<()> {
    sqlx::query("UPDATE projects SET start_date = ?, end_date = ?, updated_at = ? WHERE id = ?")
        .bind(start)
        .bind(end)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_project_resources<'e, E>(
    executor: E,
    project_id: Uuid,
) -> TaskResult<Vec<ProjectResourceRow>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT project_id, resource_id, role, editable, created_by
        FROM project_resources
        WHERE project_id = ?
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let pid: String = row.get("project_id");
        out.push(ProjectResourceRow {
            project_id: parse_uuid(pid, "project_id")?,
            resource_id: row.get("resource_id"),
            role: row.get("role"),
            editable: row.get("editable"),
            created_by: row.get("created_by"),
        });
    }
    Ok(out)
}

/// Bulk-insert roster rows. Used by the resource synchronizer to backfill
/// resources referenced by a task but missing from the project roster.
pub async fn insert_project_resources(
    conn: &mut SqliteConnection,
    rows: &[ProjectResourceRow],
) -> TaskResult<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["(?, ?, ?, ?, ?)"; rows.len()].join(", ");
    let sql = format!(
        "INSERT INTO project_resources (project_id, resource_id, role, editable, created_by) VALUES {placeholders}"
    );
    let mut query = sqlx::query(&sql);
    for r in rows {
        query = query
            .bind(r.project_id.to_string())
            .bind(&r.resource_id)
            .bind(&r.role)
            .bind(r.editable)
            .bind(&r.created_by);
    }
    query.execute(conn).await?;
    Ok(())
}

pub async fn fetch_event_marks<'e, E>(executor: E, project_id: Uuid) -> TaskResult<Vec<EventMark>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT project_id, name, mark_date FROM event_marks WHERE project_id = ? ORDER BY mark_date",
    )
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let pid: String = row.get("project_id");
        out.push(EventMark {
            project_id: parse_uuid(pid, "project_id")?,
            name: row.get("name"),
            mark_date: row.get("mark_date"),
        });
    }
    Ok(out)
}
