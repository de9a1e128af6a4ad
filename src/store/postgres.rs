/// Postgres persistence via sqlx
///
/// Talks to the managed (Supabase) Postgres database. The schema is bootstrapped
/// on start-up with `CREATE TABLE IF NOT EXISTS`, so it is safe to run against an
/// existing database.

use super::{Store, StoreError, StoreResult};
use crate::model::{
    NewProject, NewSnapshot, NewTask, Plan, Project, ProjectPatch, Snapshot, Subscription, Task,
    TaskPatch, TaskStatus, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

const PROJECT_COLUMNS: &str =
    "id, user_id, repo_name, github_token, default_branch, created_at, updated_at";
const SNAPSHOT_COLUMNS: &str = "id, project_id, branch, markdown, created_at";
const TASK_COLUMNS: &str =
    "id, snapshot_id, title, description, markdown, status, position, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str = "user_id, plan, status, stripe_customer_id, \
     stripe_subscription_id, current_period_end, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool and make sure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        tracing::info!("🗄️ Connecting to Postgres (pool size {})", max_connections);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self::new(pool);
        store.init_schema().await?;
        tracing::info!("✅ Postgres schema ready");
        Ok(store)
    }

    /// Create tables and indexes. Safe to call multiple times.
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                repo_name TEXT NOT NULL,
                github_token TEXT,
                default_branch TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id UUID PRIMARY KEY,
                project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                branch TEXT,
                markdown TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id UUID PRIMARY KEY,
                snapshot_id UUID NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                markdown TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'todo',
                position INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                plan TEXT NOT NULL DEFAULT 'free',
                status TEXT NOT NULL,
                stripe_customer_id TEXT UNIQUE,
                stripe_subscription_id TEXT,
                current_period_end TIMESTAMPTZ,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_user ON projects(user_id, created_at DESC)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_project ON snapshots(project_id, created_at DESC)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_snapshot ON tasks(snapshot_id, position)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    user_id: Uuid,
    repo_name: String,
    github_token: Option<String>,
    default_branch: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            user_id: row.user_id,
            repo_name: row.repo_name,
            github_token: row.github_token,
            default_branch: row.default_branch,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    project_id: Uuid,
    branch: Option<String>,
    markdown: String,
    created_at: DateTime<Utc>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Snapshot {
            id: row.id,
            project_id: row.project_id,
            branch: row.branch,
            markdown: row.markdown,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    snapshot_id: Uuid,
    title: String,
    description: String,
    markdown: String,
    status: String,
    position: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("task {}: {}", row.id, e)))?;
        Ok(Task {
            id: row.id,
            snapshot_id: row.snapshot_id,
            title: row.title,
            description: row.description,
            markdown: row.markdown,
            status,
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    user_id: Uuid,
    plan: String,
    status: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan: Plan = row
            .plan
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("subscription {}: {}", row.user_id, e)))?;
        Ok(Subscription {
            user_id: row.user_id,
            plan,
            status: row.status,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            current_period_end: row.current_period_end,
            updated_at: row.updated_at,
        })
    }
}

fn tasks_from_rows(rows: Vec<TaskRow>) -> StoreResult<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET email = excluded.email
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_projects(&self, user_id: Uuid) -> StoreResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Project::from).collect())
    }

    async fn count_projects(&self, user_id: Uuid) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_project(&self, project: NewProject) -> StoreResult<Project> {
        let row: ProjectRow = sqlx::query_as(&format!(
            "INSERT INTO projects (id, user_id, repo_name, github_token, default_branch) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(project.user_id)
        .bind(&project.repo_name)
        .bind(&project.github_token)
        .bind(&project.default_branch)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_project_within_limit(
        &self,
        project: NewProject,
        limit: Option<i64>,
    ) -> StoreResult<Option<Project>> {
        let Some(limit) = limit else {
            return self.insert_project(project).await.map(Some);
        };
        let mut tx = self.pool.begin().await?;

        // Locking the owner serializes concurrent creates so the count stays accurate.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
                .bind(project.user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::Missing("user"));
        }

        let (owned,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE user_id = $1")
            .bind(project.user_id)
            .fetch_one(&mut *tx)
            .await?;
        if owned >= limit {
            return Ok(None);
        }

        let row: ProjectRow = sqlx::query_as(&format!(
            "INSERT INTO projects (id, user_id, repo_name, github_token, default_branch) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(project.user_id)
        .bind(&project.repo_name)
        .bind(&project.github_token)
        .bind(&project.default_branch)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn get_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let row: Option<ProjectRow> =
            sqlx::query_as(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Project::from))
    }

    async fn update_project(&self, id: Uuid, patch: ProjectPatch) -> StoreResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            r#"
            UPDATE projects SET
                repo_name = COALESCE($2, repo_name),
                github_token = CASE WHEN $3 THEN $4 ELSE github_token END,
                default_branch = CASE WHEN $5 THEN $6 ELSE default_branch END,
                updated_at = now()
            WHERE id = $1
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.repo_name)
        .bind(patch.github_token.is_some())
        .bind(patch.github_token.flatten())
        .bind(patch.default_branch.is_some())
        .bind(patch.default_branch.flatten())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Project::from))
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_snapshots(&self, project_id: Uuid) -> StoreResult<Vec<Snapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE project_id = $1 ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Snapshot::from).collect())
    }

    async fn insert_snapshot(&self, snapshot: NewSnapshot) -> StoreResult<Snapshot> {
        let row: SnapshotRow = sqlx::query_as(&format!(
            "INSERT INTO snapshots (id, project_id, branch, markdown) \
             VALUES ($1, $2, $3, $4) RETURNING {SNAPSHOT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(snapshot.project_id)
        .bind(&snapshot.branch)
        .bind(&snapshot.markdown)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_snapshot(&self, id: Uuid) -> StoreResult<Option<Snapshot>> {
        let row: Option<SnapshotRow> =
            sqlx::query_as(&format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Snapshot::from))
    }

    async fn delete_snapshot(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM snapshots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tasks(&self, snapshot_id: Uuid) -> StoreResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE snapshot_id = $1 ORDER BY position, created_at"
        ))
        .bind(snapshot_id)
        .fetch_all(&self.pool)
        .await?;
        tasks_from_rows(rows)
    }

    async fn insert_tasks(&self, snapshot_id: Uuid, tasks: Vec<NewTask>) -> StoreResult<Vec<Task>> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent batches for the same snapshot so positions stay unique.
        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM snapshots WHERE id = $1 FOR UPDATE")
                .bind(snapshot_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::Missing("snapshot"));
        }

        let (mut next_position,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE snapshot_id = $1",
        )
        .bind(snapshot_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut inserted = Vec::with_capacity(tasks.len());
        for task in tasks {
            let row: TaskRow = sqlx::query_as(&format!(
                "INSERT INTO tasks (id, snapshot_id, title, description, markdown, status, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {TASK_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(snapshot_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.markdown)
            .bind(task.status.as_str())
            .bind(next_position)
            .fetch_one(&mut *tx)
            .await?;
            next_position += 1;
            inserted.push(Task::try_from(row)?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Task::try_from).transpose()
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> StoreResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(&format!(
            r#"
            UPDATE tasks SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                markdown = COALESCE($4, markdown),
                status = COALESCE($5, status),
                updated_at = now()
            WHERE id = $1
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.markdown)
        .bind(patch.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(Task::try_from).transpose()
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_subscription(&self, user_id: Uuid) -> StoreResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Subscription::try_from).transpose()
    }

    async fn find_subscription_by_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE stripe_customer_id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Subscription::try_from).transpose()
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, plan, status, stripe_customer_id,
                                       stripe_subscription_id, current_period_end, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                stripe_customer_id = excluded.stripe_customer_id,
                stripe_subscription_id = excluded.stripe_subscription_id,
                current_period_end = excluded.current_period_end,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.plan.as_str())
        .bind(&subscription.status)
        .bind(&subscription.stripe_customer_id)
        .bind(&subscription.stripe_subscription_id)
        .bind(subscription.current_period_end)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
