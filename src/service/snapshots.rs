/// Snapshot operations and markdown export

use super::projects;
use crate::error::{ApiError, ApiResult};
use crate::model::{NewSnapshot, Project, Snapshot, User};
use crate::store::Store;
use serde::Serialize;
use uuid::Uuid;

/// Markdown handed to the client for PDF conversion
#[derive(Debug, Clone, Serialize)]
pub struct ExportDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub markdown: String,
}

pub async fn list(store: &dyn Store, user: &User, project_id: Uuid) -> ApiResult<Vec<Snapshot>> {
    projects::owned(store, user, project_id).await?;
    Ok(store.list_snapshots(project_id).await?)
}

pub async fn create(
    store: &dyn Store,
    user: &User,
    project_id: Uuid,
    branch: Option<String>,
    markdown: String,
) -> ApiResult<Snapshot> {
    let project = projects::owned(store, user, project_id).await?;
    let branch = branch.or(project.default_branch);
    let snapshot = store
        .insert_snapshot(NewSnapshot { project_id, branch, markdown })
        .await?;
    tracing::info!(
        "📸 Stored snapshot {} for project {} ({} bytes)",
        snapshot.id,
        project_id,
        snapshot.markdown.len()
    );
    Ok(snapshot)
}

/// Fetch a snapshot together with the project that owns it
pub async fn owned(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<(Snapshot, Project)> {
    let snapshot = store.get_snapshot(id).await?.ok_or(ApiError::NotFound("snapshot"))?;
    let project = store
        .get_project(snapshot.project_id)
        .await?
        .ok_or(ApiError::NotFound("snapshot"))?;
    if project.user_id != user.id {
        tracing::warn!("🚫 User {} attempted to access snapshot {}", user.id, id);
        return Err(ApiError::Forbidden("snapshot"));
    }
    Ok((snapshot, project))
}

pub async fn delete(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<()> {
    owned(store, user, id).await?;
    if !store.delete_snapshot(id).await? {
        return Err(ApiError::NotFound("snapshot"));
    }
    tracing::info!("🗑️ Deleted snapshot {}", id);
    Ok(())
}

pub async fn export(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<ExportDocument> {
    let (snapshot, project) = owned(store, user, id).await?;
    Ok(export_document(&project, snapshot))
}

pub fn export_document(project: &Project, snapshot: Snapshot) -> ExportDocument {
    let repo = project.repo_name.replace('/', "-");
    let filename = format!("{}-snapshot-{}.md", repo, snapshot.created_at.format("%Y%m%d-%H%M%S"));
    ExportDocument {
        filename,
        content_type: "text/markdown",
        markdown: snapshot.markdown,
    }
}
