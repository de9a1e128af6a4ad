/// Project operations scoped to the authenticated user

use crate::error::{ApiError, ApiResult};
use crate::model::{NewProject, Plan, Project, ProjectPatch, User};
use crate::store::Store;
use uuid::Uuid;

pub async fn list(store: &dyn Store, user: &User) -> ApiResult<Vec<Project>> {
    Ok(store.list_projects(user.id).await?)
}

/// Create a project unless the user's plan is already at its project limit
pub async fn create(
    store: &dyn Store,
    user: &User,
    plan: Plan,
    input: NewProject,
) -> ApiResult<Project> {
    let limit = plan.project_limit();
    let project = store
        .insert_project_within_limit(NewProject { user_id: user.id, ..input }, limit)
        .await?
        .ok_or_else(|| {
            ApiError::PlanLimit(format!(
                "the {} plan allows {} projects; upgrade to add more",
                plan,
                limit.unwrap_or_default()
            ))
        })?;
    tracing::info!(
        "📁 Created project {} ({}) for user {}",
        project.id,
        project.repo_name,
        user.id
    );
    Ok(project)
}

/// Fetch a project the user owns
pub async fn owned(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<Project> {
    let project = store.get_project(id).await?.ok_or(ApiError::NotFound("project"))?;
    if project.user_id != user.id {
        tracing::warn!("🚫 User {} attempted to access project {}", user.id, id);
        return Err(ApiError::Forbidden("project"));
    }
    Ok(project)
}

pub async fn update(
    store: &dyn Store,
    user: &User,
    id: Uuid,
    patch: ProjectPatch,
) -> ApiResult<Project> {
    owned(store, user, id).await?;
    let project = store
        .update_project(id, patch)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    tracing::info!("Updated project {}", id);
    Ok(project)
}

pub async fn delete(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<()> {
    owned(store, user, id).await?;
    if !store.delete_project(id).await? {
        return Err(ApiError::NotFound("project"));
    }
    tracing::info!("🗑️ Deleted project {} with its snapshots and tasks", id);
    Ok(())
}
