/// Snapshot REST API endpoints
///
/// Snapshots are markdown renderings of a repository. Export hands the markdown
/// back for the browser to turn into a PDF.

use super::validate::CreateSnapshotRequest;
use super::{AppState, AuthUser, ValidJson, ValidPath};
use crate::error::{ApiError, ApiResult};
use crate::model::Snapshot;
use crate::service::snapshots;
use axum::{
    extract::{Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn create_snapshot_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/{id}/snapshots",
            get(list_snapshots).post(create_snapshot),
        )
        .route("/api/snapshots/{id}", get(get_snapshot).delete(delete_snapshot))
        .route("/api/snapshots/{id}/export", get(export_snapshot))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// "json" (default) or "raw"
    pub format: Option<String>,
}

/// GET /api/projects/{id}/snapshots
/// Returns: { "snapshots": [...] } newest first
async fn list_snapshots(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(project_id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    let snapshots = snapshots::list(state.store.as_ref(), &user, project_id).await?;
    Ok(Json(json!({ "snapshots": snapshots })))
}

/// POST /api/projects/{id}/snapshots
/// Body: { "markdown": "# repo ...", "branch": "main" }
async fn create_snapshot(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(project_id): ValidPath<Uuid>,
    ValidJson(payload): ValidJson<CreateSnapshotRequest>,
) -> ApiResult<(StatusCode, Json<Snapshot>)> {
    let branch = payload
        .branch
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());
    let snapshot =
        snapshots::create(state.store.as_ref(), &user, project_id, branch, payload.markdown).await?;

    state.analytics.capture(
        user.id.to_string(),
        "snapshot_created",
        json!({
            "project_id": project_id,
            "snapshot_id": snapshot.id,
            "bytes": snapshot.markdown.len(),
        }),
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/snapshots/{id}
async fn get_snapshot(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Snapshot>> {
    let (snapshot, _) = snapshots::owned(state.store.as_ref(), &user, id).await?;
    Ok(Json(snapshot))
}

/// DELETE /api/snapshots/{id}
async fn delete_snapshot(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
) -> ApiResult<Json<Value>> {
    snapshots::delete(state.store.as_ref(), &user, id).await?;
    Ok(Json(json!({ "message": "Snapshot deleted successfully" })))
}

/// Export a snapshot for client-side PDF conversion
///
/// GET /api/snapshots/{id}/export[?format=raw]
/// Returns: { "filename", "content_type", "markdown" } or the raw markdown as an attachment
async fn export_snapshot(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<Uuid>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let document = snapshots::export(state.store.as_ref(), &user, id).await?;
    state
        .analytics
        .capture(user.id.to_string(), "snapshot_exported", json!({ "snapshot_id": id }));

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(document).into_response()),
        Some("raw") => Ok((
            [
                (CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", document.filename),
                ),
            ],
            document.markdown,
        )
            .into_response()),
        Some(other) => Err(ApiError::validation(format!("unsupported export format '{}'", other))),
    }
}
