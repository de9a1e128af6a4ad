/// Task REST API endpoints

use super::validate::{CreateTasksRequest, UpdateTaskRequest};
use super::{AppState, AuthUser, ValidJson, ValidPath};
use crate::error::ApiResult;
use crate::model::Task;
use crate::service::{tasks, TaskDraft};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn create_task_routes() -> Router<AppState> {
    Router::new()
        .route("/api/snapshots/{id}/tasks", get(list_tasks).post(create_tasks))
        .route(
            "/api/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

/// GET /api/snapshots/{id}/tasks
/// Returns: { "tasks": [...] } in position order
async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(snapshot_id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    let tasks = tasks::list(state.store.as_ref(), &user, snapshot_id).await?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// Store a batch of generated tasks
///
/// POST /api/snapshots/{id}/tasks
/// Body: { "tasks": [{ "title": "...", "description": "...", "markdown": "..." }] }
async fn create_tasks(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(snapshot_id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<CreateTasksRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let drafts: Vec<TaskDraft> = payload.tasks.into_iter().map(TaskDraft::from).collect();
    let tasks = tasks::create_batch(state.store.as_ref(), &user, snapshot_id, drafts).await?;

    state.analytics.capture(
        user.id.to_string(),
        "tasks_generated",
        json!({ "snapshot_id": snapshot_id, "count": tasks.len() }),
    );
    Ok((StatusCode::CREATED, Json(json!({ "tasks": tasks }))))
}

/// GET /api/tasks/{id}
async fn get_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Task>> {
    Ok(Json(tasks::owned(state.store.as_ref(), &user, id).await?))
}

/// PATCH /api/tasks/{id}
/// Body: any of { "title", "description", "markdown", "status" }
async fn update_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateTaskRequest>,
) -> ApiResult<Json<Task>> {
    Ok(Json(tasks::update(state.store.as_ref(), &user, id, payload.into()).await?))
}

/// DELETE /api/tasks/{id}
async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    tasks::delete(state.store.as_ref(), &user, id).await?;
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}
