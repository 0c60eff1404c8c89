//! Database pool configuration and schema migrations

use anyhow::Result;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use std::time::Duration;
use tracing::info;

/// Create an optimized SQLite connection pool
pub async fn create_optimized_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        // SQLite is single-writer, but can have multiple readers
        .max_connections(max_connections)
        // Keep some connections ready
        .min_connections(2)
        // Don't wait too long for a connection
        .acquire_timeout(Duration::from_secs(10))
        // Recycle connections periodically
        .max_lifetime(Duration::from_secs(1800)) // 30 minutes
        .idle_timeout(Duration::from_secs(600)) // 10 minutes
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))
}

const CREATE_PROJECTS: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft' CHECK (status IN ('draft', 'active', 'closed')),
    start_date DATE,
    end_date DATE,
    created_by TEXT NOT NULL,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    display_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    start_date DATE,
    end_date DATE,
    baseline_start DATE,
    baseline_end DATE,
    duration INTEGER,
    progress REAL,
    cost REAL,
    predecessor TEXT,
    outline_number TEXT NOT NULL,
    segments TEXT NOT NULL DEFAULT '[]',
    indicators TEXT NOT NULL DEFAULT '[]',
    resource_groups TEXT NOT NULL DEFAULT '[]',
    is_subtask BOOLEAN NOT NULL DEFAULT 0,
    deleted BOOLEAN NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL,
    updated_by TEXT,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (project_id) REFERENCES projects(id)
);
"#;

const CREATE_TASK_RESOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS task_resources (
    task_id TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    units REAL NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL,
    updated_by TEXT,
    PRIMARY KEY (task_id, resource_id),
    FOREIGN KEY (task_id) REFERENCES tasks(id)
);
"#;

const CREATE_PROJECT_RESOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS project_resources (
    project_id TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    role TEXT,
    editable BOOLEAN NOT NULL DEFAULT 1,
    created_by TEXT NOT NULL,
    PRIMARY KEY (project_id, resource_id),
    FOREIGN KEY (project_id) REFERENCES projects(id)
);
"#;

const CREATE_EVENT_MARKS: &str = r#"
CREATE TABLE IF NOT EXISTS event_marks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    mark_date DATE NOT NULL,
    FOREIGN KEY (project_id) REFERENCES projects(id)
);
"#;

const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id);
CREATE INDEX IF NOT EXISTS idx_tasks_outline ON tasks(project_id, outline_number);
CREATE INDEX IF NOT EXISTS idx_task_resources_task ON task_resources(task_id);
CREATE INDEX IF NOT EXISTS idx_project_resources_project ON project_resources(project_id);
CREATE INDEX IF NOT EXISTS idx_event_marks_project ON event_marks(project_id);
"#;

/// Runs all required migrations.
/// Safe to call at every startup (idempotent).
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_PROJECTS).await?;
    pool.execute(CREATE_TASKS).await?;
    pool.execute(CREATE_TASK_RESOURCES).await?;
    pool.execute(CREATE_PROJECT_RESOURCES).await?;
    pool.execute(CREATE_EVENT_MARKS).await?;
    pool.execute(CREATE_INDICES).await?;

    info!("Migrations complete");
    Ok(())
}
