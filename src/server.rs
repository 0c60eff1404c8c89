// src/server.rs

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::tasks::handlers::{
    create_task_handler, create_tasks_handler, delete_tasks_handler, get_task_handler,
    get_tasks_by_projects_handler, update_task_handler, update_tasks_handler,
};

pub fn build_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/projects/{project_id}/tasks", post(create_task_handler))
        .route("/api/tasks", get(get_tasks_by_projects_handler))
        .route("/api/tasks/batch", post(create_tasks_handler).put(update_tasks_handler))
        .route("/api/tasks/delete", post(delete_tasks_handler))
        .route(
            "/api/tasks/{id}",
            get(get_task_handler).put(update_task_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
