/// Task operations
///
/// Tasks are generated client-side from a snapshot and arrive here in batches.

use super::snapshots;
use crate::error::{ApiError, ApiResult};
use crate::model::{NewTask, Task, TaskPatch, TaskStatus, User};
use crate::store::Store;
use uuid::Uuid;

/// A task as submitted by the client; markdown is optional
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub markdown: Option<String>,
    pub status: Option<TaskStatus>,
}

impl TaskDraft {
    fn into_new_task(self) -> NewTask {
        let markdown = match self.markdown {
            Some(markdown) if !markdown.trim().is_empty() => markdown,
            _ => render_markdown(&self.title, &self.description),
        };
        NewTask {
            title: self.title,
            description: self.description,
            markdown,
            status: self.status.unwrap_or_default(),
        }
    }
}

/// Default markdown body for a task
pub fn render_markdown(title: &str, description: &str) -> String {
    if description.trim().is_empty() {
        format!("## {}\n", title)
    } else {
        format!("## {}\n\n{}\n", title, description.trim())
    }
}

pub async fn list(store: &dyn Store, user: &User, snapshot_id: Uuid) -> ApiResult<Vec<Task>> {
    snapshots::owned(store, user, snapshot_id).await?;
    Ok(store.list_tasks(snapshot_id).await?)
}

pub async fn create_batch(
    store: &dyn Store,
    user: &User,
    snapshot_id: Uuid,
    drafts: Vec<TaskDraft>,
) -> ApiResult<Vec<Task>> {
    snapshots::owned(store, user, snapshot_id).await?;
    let new_tasks = drafts.into_iter().map(TaskDraft::into_new_task).collect();
    let tasks = store.insert_tasks(snapshot_id, new_tasks).await?;
    tracing::info!("🧩 Stored {} tasks for snapshot {}", tasks.len(), snapshot_id);
    Ok(tasks)
}

pub async fn owned(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<Task> {
    let task = store.get_task(id).await?.ok_or(ApiError::NotFound("task"))?;
    match snapshots::owned(store, user, task.snapshot_id).await {
        Ok(_) => Ok(task),
        Err(ApiError::Forbidden(_)) => Err(ApiError::Forbidden("task")),
        Err(ApiError::NotFound(_)) => Err(ApiError::NotFound("task")),
        Err(e) => Err(e),
    }
}

pub async fn update(store: &dyn Store, user: &User, id: Uuid, patch: TaskPatch) -> ApiResult<Task> {
    owned(store, user, id).await?;
    let task = store.update_task(id, patch).await?.ok_or(ApiError::NotFound("task"))?;
    tracing::debug!("Updated task {} (status {})", id, task.status.as_str());
    Ok(task)
}

pub async fn delete(store: &dyn Store, user: &User, id: Uuid) -> ApiResult<()> {
    owned(store, user, id).await?;
    if !store.delete_task(id).await? {
        return Err(ApiError::NotFound("task"));
    }
    tracing::info!("🗑️ Deleted task {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewProject, Plan};
    use crate::service::projects;
    use crate::store::MemoryStore;

    fn draft(title: &str, description: &str, markdown: Option<&str>) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: description.to_string(),
            markdown: markdown.map(str::to_string),
            status: None,
        }
    }

    async fn snapshot_for(store: &MemoryStore, user: &User) -> Uuid {
        let project = projects::create(
            store,
            user,
            Plan::Free,
            NewProject {
                user_id: user.id,
                repo_name: "octo/app".to_string(),
                github_token: None,
                default_branch: None,
            },
        )
        .await
        .unwrap();
        snapshots::create(store, user, project.id, None, "# App".into())
            .await
            .unwrap()
            .id
    }

    #[test]
    fn markdown_is_rendered_when_missing() {
        assert_eq!(render_markdown("Add CI", ""), "## Add CI\n");
        assert_eq!(
            render_markdown("Add CI", " Run tests on push "),
            "## Add CI\n\nRun tests on push\n"
        );

        let task = draft("Add CI", "Run tests", Some("  ")).into_new_task();
        assert_eq!(task.markdown, "## Add CI\n\nRun tests\n");
        assert_eq!(task.status, TaskStatus::Todo);

        let task = draft("Add CI", "Run tests", Some("custom")).into_new_task();
        assert_eq!(task.markdown, "custom");
    }

    #[tokio::test]
    async fn batch_then_update_and_delete() {
        let store = MemoryStore::new();
        let user = User { id: Uuid::new_v4(), email: None };
        let snapshot_id = snapshot_for(&store, &user).await;

        let tasks = create_batch(
            &store,
            &user,
            snapshot_id,
            vec![draft("one", "", None), draft("two", "", None)],
        )
        .await
        .unwrap();
        assert_eq!(tasks.iter().map(|t| t.position).collect::<Vec<_>>(), vec![0, 1]);

        let updated = update(
            &store,
            &user,
            tasks[1].id,
            TaskPatch { status: Some(TaskStatus::Done), ..Default::default() },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, TaskStatus::Done);
        assert_eq!(updated.title, "two");

        delete(&store, &user, tasks[0].id).await.unwrap();
        let remaining = list(&store, &user, snapshot_id).await.unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn tasks_of_other_users_are_forbidden() {
        let store = MemoryStore::new();
        let owner = User { id: Uuid::new_v4(), email: None };
        let snapshot_id = snapshot_for(&store, &owner).await;
        let tasks = create_batch(&store, &owner, snapshot_id, vec![draft("one", "", None)])
            .await
            .unwrap();

        let stranger = User { id: Uuid::new_v4(), email: None };
        assert!(matches!(
            owned(&store, &stranger, tasks[0].id).await,
            Err(ApiError::Forbidden("task"))
        ));
        assert!(matches!(
            owned(&store, &owner, Uuid::new_v4()).await,
            Err(ApiError::NotFound("task"))
        ));
    }
}
