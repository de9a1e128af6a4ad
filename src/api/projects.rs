/// Project management REST API endpoints
///
/// All routes require a bearer token and only ever expose the caller's own projects.

use super::validate::{CreateProjectRequest, UpdateProjectRequest};
use super::{AppState, AuthUser, ValidJson, ValidPath};
use crate::error::{ApiError, ApiResult};
use crate::github::GitHubError;
use crate::model::{NewProject, Project};
use crate::service::{billing, projects};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

pub fn create_project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/api/projects/{id}/branches", get(list_branches))
}

/// List the caller's projects
///
/// GET /api/projects
/// Returns: { "projects": [...] }
async fn list_projects(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let projects = projects::list(state.store.as_ref(), &user).await?;
    Ok(Json(json!({ "projects": projects })))
}

/// Create a project
///
/// POST /api/projects
/// Body: { "repo_name": "owner/name", "github_token": "...", "default_branch": "main" }
async fn create_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let store = state.store.as_ref();
    let plan = billing::effective_plan(store, &user).await?;
    let (repo_name, github_token, default_branch) = payload.into_parts();

    let project = projects::create(
        store,
        &user,
        plan,
        NewProject {
            user_id: user.id,
            repo_name,
            github_token,
            default_branch,
        },
    )
    .await?;

    state.analytics.capture(
        user.id.to_string(),
        "project_created",
        json!({ "project_id": project.id, "repo_name": project.repo_name, "plan": plan }),
    );
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(projects::owned(state.store.as_ref(), &user, id).await?))
}

/// Update repo name, token or default branch
///
/// PATCH /api/projects/{id}
/// Body: any of { "repo_name", "github_token", "default_branch" }; "" clears optional fields
async fn update_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateProjectRequest>,
) -> ApiResult<Json<Project>> {
    let project = projects::update(state.store.as_ref(), &user, id, payload.into()).await?;
    Ok(Json(project))
}

/// Delete a project with its snapshots and tasks
///
/// DELETE /api/projects/{id}
/// Returns: { "message": "Project deleted successfully" }
async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    projects::delete(state.store.as_ref(), &user, id).await?;
    state
        .analytics
        .capture(user.id.to_string(), "project_deleted", json!({ "project_id": id }));
    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

/// Branches of the project's GitHub repository
///
/// GET /api/projects/{id}/branches
/// Returns: { "branches": [{ "name": "main", "sha": "...", "protected": false }] }
async fn list_branches(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    let project = projects::owned(state.store.as_ref(), &user, id).await?;
    let branches = state
        .github
        .list_branches(&project.repo_name, project.github_token.as_deref())
        .await
        .map_err(|e| match e {
            GitHubError::InvalidRepo(_) => ApiError::validation(e.to_string()),
            GitHubError::NotFound => ApiError::NotFound("repository"),
            other => {
                tracing::warn!("❌ GitHub branch lookup failed for {}: {}", project.repo_name, other);
                ApiError::Upstream(other.to_string())
            }
        })?;

    tracing::debug!("Fetched {} branches for {}", branches.len(), project.repo_name);
    Ok(Json(json!({ "branches": branches })))
}
