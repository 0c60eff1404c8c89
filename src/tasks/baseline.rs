//! Baseline aggregator.
//!
//! A project's start/end window is derived data: the min baseline-start and
//! max baseline-end over all live tasks. Recomputed exactly once per
//! mutating operation, after the task rows are persisted, inside the same
//! transaction, so a failure rolls the task write back too.

use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use crate::projects::store as projects;
use crate::tasks::error::TaskResult;
use crate::tasks::types::BaselineWindow;

/// Recompute and persist the project window. `excluded` names task ids whose
/// stored rows must not count (rows being rewritten or deleted in this same
/// transaction); `candidate` is the window of the rows just written, which
/// are folded in explicitly.
pub async fn recompute_project_window(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    excluded: &[Uuid],
    candidate: BaselineWindow,
) -> TaskResult<()> {
    let mut sql = String::from(
        "SELECT MIN(baseline_start) AS min_start, MAX(baseline_end) AS max_end \
         FROM tasks WHERE project_id = ? AND deleted = 0",
    );
    if !excluded.is_empty() {
        let placeholders = vec!["?"; excluded.len()].join(",");
        sql.push_str(&format!(" AND id NOT IN ({placeholders})"));
    }

    let mut query = sqlx::query(&sql).bind(project_id.to_string());
    for id in excluded {
        query = query.bind(id.to_string());
    }
    let row = query.fetch_one(&mut *conn).await?;

    // Zero live tasks leaves both aggregates NULL; that is a valid window.
    let mut window = BaselineWindow {
        start: row.get("min_start"),
        end: row.get("max_end"),
    };
    window.merge(candidate);

    projects::update_project_window(conn, project_id, window.start, window.end).await
}
