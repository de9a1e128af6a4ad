/// In-process store
///
/// Mirrors `PgStore` semantics (ordering, cascading deletes, upserts) on plain
/// vectors behind a tokio `RwLock`. Used when no DATABASE_URL is configured and by tests.

use super::{Store, StoreResult};
use crate::model::{
    NewProject, NewSnapshot, NewTask, Project, ProjectPatch, Snapshot, Subscription, Task,
    TaskPatch, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    // Kept in insertion order; listings reverse them for newest-first.
    projects: Vec<Project>,
    snapshots: Vec<Snapshot>,
    tasks: Vec<Task>,
    subscriptions: HashMap<Uuid, Subscription>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users seen so far
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

fn new_project_row(project: NewProject) -> Project {
    let now = Utc::now();
    Project {
        id: Uuid::new_v4(),
        user_id: project.user_id,
        repo_name: project.repo_name,
        github_token: project.github_token,
        default_branch: project.default_branch,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        self.tables.write().await.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn list_projects(&self, user_id: Uuid) -> StoreResult<Vec<Project>> {
        let tables = self.tables.read().await;
        Ok(tables
            .projects
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_projects(&self, user_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().filter(|p| p.user_id == user_id).count() as i64)
    }

    async fn insert_project(&self, project: NewProject) -> StoreResult<Project> {
        let project = new_project_row(project);
        self.tables.write().await.projects.push(project.clone());
        Ok(project)
    }

    async fn insert_project_within_limit(
        &self,
        project: NewProject,
        limit: Option<i64>,
    ) -> StoreResult<Option<Project>> {
        // One write guard covers both the count and the push.
        let mut tables = self.tables.write().await;
        if let Some(limit) = limit {
            let owned = tables
                .projects
                .iter()
                .filter(|p| p.user_id == project.user_id)
                .count() as i64;
            if owned >= limit {
                return Ok(None);
            }
        }
        let project = new_project_row(project);
        tables.projects.push(project.clone());
        Ok(Some(project))
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let tables = self.tables.read().await;
        Ok(tables.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> StoreResult<Option<Project>> {
        let mut tables = self.tables.write().await;
        let Some(project) = tables.projects.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(repo_name) = patch.repo_name {
            project.repo_name = repo_name;
        }
        if let Some(token) = patch.github_token {
            project.github_token = token;
        }
        if let Some(branch) = patch.default_branch {
            project.default_branch = branch;
        }
        project.updated_at = Utc::now();
        Ok(Some(project.clone()))
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }

        let snapshot_ids: Vec<Uuid> = tables
            .snapshots
            .iter()
            .filter(|s| s.project_id == id)
            .map(|s| s.id)
            .collect();
        tables.snapshots.retain(|s| s.project_id != id);
        tables.tasks.retain(|t| !snapshot_ids.contains(&t.snapshot_id));
        Ok(true)
    }

    async fn list_snapshots(&self, project_id: Uuid) -> StoreResult<Vec<Snapshot>> {
        let tables = self.tables.read().await;
        Ok(tables
            .snapshots
            .iter()
            .rev()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> StoreResult<Snapshot> {
        let snapshot = Snapshot {
            id: Uuid::new_v4(),
            project_id: snapshot.project_id,
            branch: snapshot.branch,
            markdown: snapshot.markdown,
            created_at: Utc::now(),
        };
        self.tables.write().await.snapshots.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>> {
        let tables = self.tables.read().await;
        Ok(tables.snapshots.iter().find(|s| s.id == id).cloned())
    }

    async fn delete_snapshot(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.snapshots.len();
        tables.snapshots.retain(|s| s.id != id);
        if tables.snapshots.len() == before {
            return Ok(false);
        }
        tables.tasks.retain(|t| t.snapshot_id != id);
        Ok(true)
    }

    async fn list_tasks(&self, snapshot_id: Uuid) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .iter()
            .filter(|t| t.snapshot_id == snapshot_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        Ok(tasks)
    }

    async fn insert_tasks(&self, snapshot_id: Uuid, tasks: Vec<NewTask>) -> StoreResult<Vec<Task>> {
        let mut tables = self.tables.write().await;
        let mut next_position = tables
            .tasks
            .iter()
            .filter(|t| t.snapshot_id == snapshot_id)
            .map(|t| t.position + 1)
            .max()
            .unwrap_or(0);

        let now = Utc::now();
        let mut inserted = Vec::with_capacity(tasks.len());
        for task in tasks {
            let task = Task {
                id: Uuid::new_v4(),
                snapshot_id,
                title: task.title,
                description: task.description,
                markdown: task.markdown,
                status: task.status,
                position: next_position,
                created_at: now,
                updated_at: now,
            };
            next_position += 1;
            tables.tasks.push(task.clone());
            inserted.push(task);
        }
        Ok(inserted)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let tables = self.tables.read().await;
        Ok(tables.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write().await;
        let Some(task) = tables.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(markdown) = patch.markdown {
            task.markdown = markdown;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = Utc::now();
        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables.tasks.retain(|t| t.id != id);
        Ok(tables.tasks.len() != before)
    }

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>> {
        Ok(self.tables.read().await.subscriptions.get(&user_id).cloned())
    }

    async fn find_subscription_by_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subscriptions
            .values()
            .find(|s| s.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .subscriptions
            .insert(subscription.user_id, subscription.clone());
        Ok(())
    }
}
