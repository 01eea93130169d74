/// Persistence interface
///
/// Everything the authorization gate, the idempotency coordinator and the
/// route handlers read or write goes through the [`Store`] trait. Two
/// implementations are provided:
///
/// - [`postgres::PgStore`]: production backend on top of sqlx, delegating to
///   the model functions in [`crate::models`]
/// - [`memory::MemoryStore`]: in-process backend with the same uniqueness and
///   cascade semantics, used by tests and local development
///
/// # Uniqueness
///
/// Implementations must report violations of the following constraints as
/// [`StoreError::UniqueViolation`], distinct from any other failure:
///
/// - `users.email`
/// - `project_members (project_id, user_id)`
/// - `idempotency_keys.fingerprint`

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    comment::{Comment, CommentFilter, CommentSort, NewComment},
    idempotency::{IdempotencyRecord, NewIdempotencyRecord, StoredResponse},
    membership::{NewProjectMember, ProjectMember},
    project::{NewProject, Project, ProjectFilter, ProjectScope, ProjectSort, UpdateProject},
    task::{NewTask, Task, TaskFilter, TaskSort, UpdateTask},
    user::{NewUser, User},
    Page,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A referenced row does not exist
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }

        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations used by the API
#[async_trait]
pub trait Store: Send + Sync {
    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    // Users

    async fn create_user(&self, data: NewUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)>;

    // Projects

    async fn create_project(&self, data: NewProject) -> StoreResult<Project>;

    async fn find_project(&self, id: Uuid) -> StoreResult<Option<Project>>;

    /// Owner of the project, `None` if the project does not exist
    async fn find_project_owner(&self, id: Uuid) -> StoreResult<Option<Uuid>>;

    /// Projects within `scope` that pass `filter`, one page in `sort` order,
    /// plus the filtered total
    async fn list_projects(
        &self,
        scope: ProjectScope,
        filter: &ProjectFilter,
        sort: ProjectSort,
        page: Page,
    ) -> StoreResult<(Vec<Project>, u64)>;

    async fn update_project(&self, id: Uuid, data: UpdateProject) -> StoreResult<Option<Project>>;

    /// Deletes the project together with its members, tasks and comments
    async fn delete_project(&self, id: Uuid) -> StoreResult<bool>;

    // Memberships

    async fn find_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<Option<ProjectMember>>;

    async fn list_memberships(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>>;

    async fn create_membership(&self, data: NewProjectMember) -> StoreResult<ProjectMember>;

    async fn delete_membership(&self, project_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    // Tasks

    async fn create_task(&self, data: NewTask) -> StoreResult<Task>;

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>>;

    async fn list_tasks(
        &self,
        project_id: Uuid,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Page,
    ) -> StoreResult<(Vec<Task>, u64)>;

    async fn update_task(&self, id: Uuid, data: UpdateTask) -> StoreResult<Option<Task>>;

    /// Deletes the task together with its comments
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    // Comments

    async fn create_comment(&self, data: NewComment) -> StoreResult<Comment>;

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>>;

    async fn list_comments(
        &self,
        task_id: Uuid,
        filter: &CommentFilter,
        sort: CommentSort,
        page: Page,
    ) -> StoreResult<(Vec<Comment>, u64)>;

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool>;

    // Idempotency records

    async fn find_idempotency_record(&self, fingerprint: &str) -> StoreResult<Option<IdempotencyRecord>>;

    /// Claims a fingerprint by inserting a pending record
    ///
    /// Must fail with [`StoreError::UniqueViolation`] if a record with the
    /// same fingerprint exists, whatever its state.
    async fn create_idempotency_record(&self, data: NewIdempotencyRecord) -> StoreResult<()>;

    /// Stores the response on the pending record held by `claim_id`
    ///
    /// Returns `false` if the claim is gone (expired and purged, or taken
    /// over by another request).
    async fn complete_idempotency_record(
        &self,
        fingerprint: &str,
        claim_id: Uuid,
        response: &StoredResponse,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Deletes the pending record held by `claim_id`
    async fn release_idempotency_record(&self, fingerprint: &str, claim_id: Uuid) -> StoreResult<bool>;

    /// Deletes the record if, and only if, it is expired at `now`
    async fn purge_expired_idempotency_record(&self, fingerprint: &str, now: DateTime<Utc>) -> StoreResult<bool>;
}

/// Converts a page request into SQL `LIMIT`/`OFFSET` values
pub(crate) fn limit_offset(page: Page) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}
