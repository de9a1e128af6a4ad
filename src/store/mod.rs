/// Persistence layer
///
/// The `Store` trait is the only way handlers and services touch data. `PgStore`
/// talks to the managed Postgres database, `MemoryStore` keeps everything in
/// process for local development and tests.

use crate::model::{
    NewProject, NewSnapshot, NewTask, Project, ProjectPatch, Snapshot, Subscription, Task,
    TaskPatch, User,
};
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("{0} not found")]
    Missing(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Record the user the first time they are seen; refresh their email afterwards
    async fn upsert_user(&self, user: &User) -> StoreResult<()>;

    /// Projects owned by a user, newest first
    async fn list_projects(&self, user_id: Uuid) -> StoreResult<Vec<Project>>;
    async fn count_projects(&self, user_id: Uuid) -> StoreResult<i64>;
    async fn insert_project(&self, project: NewProject) -> StoreResult<Project>;
    /// Inserts only while the owner has fewer than `limit` projects; `None` when at the limit.
    /// The count and the insert are atomic per owner.
    async fn insert_project_within_limit(
        &self,
        project: NewProject,
        limit: Option<i64>,
    ) -> StoreResult<Option<Project>>;
    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>>;
    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> StoreResult<Option<Project>>;
    /// Deletes the project with its snapshots and tasks
    async fn delete_project(&self, id: Uuid) -> StoreResult<bool>;

    /// Snapshots of a project, newest first
    async fn list_snapshots(&self, project_id: Uuid) -> StoreResult<Vec<Snapshot>>;
    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> StoreResult<Snapshot>;
    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>>;
    async fn delete_snapshot(&self, id: Uuid) -> StoreResult<bool>;

    /// Tasks of a snapshot ordered by position
    async fn list_tasks(&self, snapshot_id: Uuid) -> StoreResult<Vec<Task>>;
    /// Appends tasks after the snapshot's existing ones
    async fn insert_tasks(&self, snapshot_id: Uuid, tasks: Vec<NewTask>) -> StoreResult<Vec<Task>>;
    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>>;
    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>>;
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>>;
    async fn find_subscription_by_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Subscription>>;
    async fn upsert_subscription(&self, subscription: &Subscription) -> StoreResult<()>;
}
