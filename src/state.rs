// src/state.rs

use sqlx::SqlitePool;

use crate::tasks::service::TaskService;

/// Shared application state handed to every handler.
pub struct AppState {
    pub pool: SqlitePool,
    pub tasks: TaskService,
}

pub fn create_app_state(pool: SqlitePool) -> AppState {
    AppState {
        tasks: TaskService::new(pool.clone()),
        pool,
    }
}
