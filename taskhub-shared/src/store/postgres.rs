/// PostgreSQL-backed store
///
/// Thin adapter over the model functions in [`crate::models`]. Constraint
/// violations reported by PostgreSQL are mapped to [`StoreError`] variants by
/// its `From<sqlx::Error>` impl.
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskhub_shared::store::{PgStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// store.ping().await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{limit_offset, Store, StoreResult};
use crate::db::pool::health_check;
use crate::models::{
    comment::{Comment, CommentFilter, CommentSort, NewComment},
    idempotency::{IdempotencyRecord, NewIdempotencyRecord, StoredResponse},
    membership::{NewProjectMember, ProjectMember},
    project::{NewProject, Project, ProjectFilter, ProjectScope, ProjectSort, UpdateProject},
    task::{NewTask, Task, TaskFilter, TaskSort, UpdateTask},
    user::{NewUser, User},
    Page,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: NewUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let (limit, offset) = limit_offset(page);
        let users = User::list(&self.pool, limit, offset).await?;
        let count = User::count(&self.pool).await?;
        Ok((users, total(count)))
    }

    async fn create_project(&self, data: NewProject) -> StoreResult<Project> {
        Ok(Project::create(&self.pool, data).await?)
    }

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(Project::find_by_id(&self.pool, id).await?)
    }

    async fn find_project_owner(&self, id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(Project::find_owner(&self.pool, id).await?)
    }

    async fn list_projects(
        &self,
        scope: ProjectScope,
        filter: &ProjectFilter,
        sort: ProjectSort,
        page: Page,
    ) -> StoreResult<(Vec<Project>, u64)> {
        let (limit, offset) = limit_offset(page);
        let (projects, count) = Project::list(&self.pool, scope, filter, sort, limit, offset).await?;
        Ok((projects, total(count)))
    }

    async fn update_project(&self, id: Uuid, data: UpdateProject) -> StoreResult<Option<Project>> {
        Ok(Project::update(&self.pool, id, data).await?)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Project::delete(&self.pool, id).await?)
    }

    async fn find_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>> {
        Ok(ProjectMember::find(&self.pool, project_id, user_id).await?)
    }

    async fn list_memberships(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        Ok(ProjectMember::list_by_project(&self.pool, project_id).await?)
    }

    async fn create_membership(&self, data: NewProjectMember) -> StoreResult<ProjectMember> {
        Ok(ProjectMember::create(&self.pool, data).await?)
    }

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(ProjectMember::delete(&self.pool, project_id, user_id).await?)
    }

    async fn create_task(&self, data: NewTask) -> StoreResult<Task> {
        Ok(Task::create(&self.pool, data).await?)
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(
        &self,
        project_id: Uuid,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> StoreResult<(Vec<Task>, u64)> {
        let (limit, offset) = limit_offset(page);
        let (tasks, count) = Task::list_by_project(&self.pool, project_id, filter, sort, limit, offset).await?;
        Ok((tasks, total(count)))
    }

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> StoreResult<Option<Task>> {
        Ok(Task::update(&self.pool, id, data).await?)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn create_comment(&self, data: NewComment) -> StoreResult<Comment> {
        Ok(Comment::create(&self.pool, data).await?)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(Comment::find_by_id(&self.pool, id).await?)
    }

    async fn list_comments(
        &self,
        task_id: Uuid,
        filter: &CommentFilter,
        sort: CommentSort,
        page: Page,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        let (limit, offset) = limit_offset(page);
        let (comments, count) = Comment::list_by_task(&self.pool, task_id, filter, sort, limit, offset).await?;
        Ok((comments, total(count)))
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Comment::delete(&self.pool, id).await?)
    }

    async fn find_idempotency_record(&self, fingerprint: &str) -> StoreResult<Option<IdempotencyRecord>> {
        Ok(IdempotencyRecord::find(&self.pool, fingerprint).await?)
    }

    async fn create_idempotency_record(&self, data: NewIdempotencyRecord) -> StoreResult<()> {
        Ok(IdempotencyRecord::create(&self.pool, data).await?)
    }

    async fn complete_idempotency_record(
        &self,
        fingerprint: &str,
        claim_id: Uuid,
        response: &StoredResponse,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(IdempotencyRecord::complete(&self.pool, fingerprint, claim_id, response, expires_at).await?)
    }

    async fn release_idempotency_record(&self, fingerprint: &str, claim_id: Uuid) -> StoreResult<bool> {
        Ok(IdempotencyRecord::release(&self.pool, fingerprint, claim_id).await?)
    }

    async fn purge_expired_idempotency_record(&self, fingerprint: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(IdempotencyRecord::purge_expired(&self.pool, fingerprint, now).await?)
    }
}
