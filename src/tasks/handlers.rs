// src/tasks/handlers.rs
// Thin HTTP adapters over the task engine. Caller identity arrives as
// headers set by the upstream gateway; everything else is engine logic.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::tasks::fetch::{parse_project_ids, ProjectTasksView, TaskFilters};
use crate::tasks::policy::{Caller, Role};
use crate::tasks::types::TaskNode;

#[derive(Debug, Deserialize)]
pub struct BatchCreateRequest {
    pub project_id: Uuid,
    pub tasks: Vec<TaskNode>,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub tasks: Vec<TaskNode>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteTasksRequest {
    pub project_id: Uuid,
    pub task_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TaskIdResponse {
    pub task_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

impl OkResponse {
    fn ok() -> Self {
        Self { status: "ok" }
    }
}

#[derive(Debug, Deserialize)]
pub struct TasksQuery {
    /// Comma-separated project uuids.
    pub project_ids: String,
    #[serde(default)]
    pub top_level_only: bool,
    pub include_event_marks: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ProjectsTasksResponse {
    pub projects: HashMap<Uuid, ProjectTasksView>,
    pub total: usize,
}

/// Caller context comes from the request layer, not derived here.
fn caller_from_headers(headers: &HeaderMap) -> ApiResult<Caller> {
    let user_id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing x-user-id header"))?
        .to_string();

    let role = headers
        .get("x-user-role")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.parse().unwrap_or(Role::User))
        .unwrap_or(Role::User);

    let resource_id = headers
        .get("x-resource-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Caller {
        user_id,
        role,
        resource_id,
    })
}

pub async fn create_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<TaskNode>,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        let task_id = app_state
            .tasks
            .create_task(project_id, payload, &caller)
            .await?;
        Ok((StatusCode::CREATED, Json(TaskIdResponse { task_id })))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn create_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BatchCreateRequest>,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        app_state
            .tasks
            .create_tasks(payload.project_id, payload.tasks, &caller)
            .await?;
        Ok((StatusCode::CREATED, Json(OkResponse::ok())))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn update_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(mut payload): Json<TaskNode>,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        // the path id is authoritative
        payload.id = Some(id);
        let task_id = app_state.tasks.update_task(payload, &caller).await?;
        Ok(Json(TaskIdResponse { task_id }))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn update_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<BatchUpdateRequest>,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        app_state.tasks.update_tasks(payload.tasks, &caller).await?;
        Ok(Json(OkResponse::ok()))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn delete_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<DeleteTasksRequest>,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        app_state
            .tasks
            .delete_tasks(payload.project_id, payload.task_ids, &caller)
            .await?;
        Ok(Json(OkResponse::ok()))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn get_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        let tree = app_state.tasks.get_task(id, &caller).await?;
        Ok(Json(tree))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}

pub async fn get_tasks_by_projects_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<TasksQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let result: ApiResult<_> = async {
        let caller = caller_from_headers(&headers)?;
        let project_ids = parse_project_ids(&query.project_ids)?;
        let filters = TaskFilters {
            top_level_only: query.top_level_only,
            include_event_marks: query.include_event_marks.unwrap_or(true),
        };
        let projects = app_state
            .tasks
            .get_tasks_by_projects(&caller, &project_ids, &filters)
            .await?;

        let response = ProjectsTasksResponse {
            total: projects.len(),
            projects,
        };
        Ok(Json(response))
    }
    .await;

    match result {
        Ok(response) => response.into_response(),
        Err(error) => error.into_response(),
    }
}
