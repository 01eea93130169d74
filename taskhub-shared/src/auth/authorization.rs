/// Authorization gate and membership resolution
///
/// # Permission Model
///
/// TaskHub uses a two-level model:
///
/// 1. **Global role**: a global owner ([`Principal::Superuser`]) passes every
///    project-level check on resources that exist
/// 2. **Project relationship**: everybody else is judged by their relationship
///    to the project the resource belongs to
///
/// | Resource | Action | Required relationship |
/// |---|---|---|
/// | Project | read | participant |
/// | Project | update, delete, manage members | owner |
/// | Task | create, read, update | participant |
/// | Task | delete | owner |
/// | Comment | create, read | participant |
/// | Comment | delete | comment author or project owner |
///
/// A *participant* is the project's owner or any user with a membership row.
/// The per-project membership role label is never consulted.
///
/// # Ordering
///
/// Existence is always checked before permission: a missing resource yields
/// a resource-specific not-found error even for callers who would not be
/// allowed to see it, and a missing project is never reported as "not a
/// member".
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::auth::authorization::{authorize_task, AuthzError, TaskAction};
/// use taskhub_shared::auth::middleware::Principal;
/// use taskhub_shared::store::Store;
/// use uuid::Uuid;
///
/// async fn delete_task(store: &dyn Store, principal: Principal, task_id: Uuid) -> Result<(), AuthzError> {
///     let task = authorize_task(store, principal, task_id, TaskAction::Delete).await?;
///     store.delete_task(task.id).await?;
///     Ok(())
/// }
/// ```

use uuid::Uuid;

use super::middleware::Principal;
use crate::models::{comment::Comment, project::ProjectScope, task::Task};
use crate::store::{Store, StoreError};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Project not found")]
    ProjectNotFound,

    #[error("Task not found")]
    TaskNotFound,

    #[error("Comment not found")]
    CommentNotFound,

    /// The principal lacks the required relationship
    #[error("Access denied")]
    AccessDenied,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Relationship to a project required by an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// Project owner or member
    Participant,

    /// Project owner only
    Owner,

    /// The resource's author, or the project owner
    AuthorOrOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectAction {
    Read,
    Update,
    Delete,
    ManageMembers,
}

impl ProjectAction {
    pub fn required(&self) -> Relationship {
        match self {
            ProjectAction::Read => Relationship::Participant,
            ProjectAction::Update | ProjectAction::Delete | ProjectAction::ManageMembers => Relationship::Owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Create,
    Read,
    Update,
    Delete,
}

impl From<TaskAction> for Relationship {
    fn from(action: TaskAction) -> Self {
        action.required()
    }
}

impl TaskAction {
    pub fn required(&self) -> Relationship {
        match self {
            TaskAction::Create | TaskAction::Read | TaskAction::Update => Relationship::Participant,
            TaskAction::Delete => Relationship::Owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Create,
    Read,
    Delete,
}

impl From<CommentAction> for Relationship {
    fn from(action: CommentAction) -> Self {
        action.required()
    }
}

impl CommentAction {
    pub fn required(&self) -> Relationship {
        match self {
            CommentAction::Create | CommentAction::Read => Relationship::Participant,
            CommentAction::Delete => Relationship::AuthorOrOwner,
        }
    }
}

/// Returns whether `principal` owns the project
///
/// Superusers count as owners of every existing project.
///
/// # Errors
///
/// `AuthzError::ProjectNotFound` if the project doesn't exist
pub async fn is_owner(store: &dyn Store, project_id: Uuid, principal: Principal) -> Result<bool, AuthzError> {
    let owner_id = store
        .find_project_owner(project_id)
        .await?
        .ok_or(AuthzError::ProjectNotFound)?;

    Ok(match principal {
        Principal::Superuser(_) => true,
        Principal::Scoped(user_id) => owner_id == user_id,
    })
}

/// Returns whether `principal` participates in the project
///
/// True for the owner without a membership row.
///
/// # Errors
///
/// `AuthzError::ProjectNotFound` if the project doesn't exist
pub async fn is_member(store: &dyn Store, project_id: Uuid, principal: Principal) -> Result<bool, AuthzError> {
    if is_owner(store, project_id, principal).await? {
        return Ok(true);
    }

    let membership = store.find_membership(project_id, principal.user_id()).await?;
    Ok(membership.is_some())
}

async fn require(
    store: &dyn Store,
    project_id: Uuid,
    principal: Principal,
    relationship: Relationship,
    author_id: Option<Uuid>,
) -> Result<(), AuthzError> {
    let allowed = match relationship {
        Relationship::Participant => is_member(store, project_id, principal).await?,
        Relationship::Owner => is_owner(store, project_id, principal).await?,
        Relationship::AuthorOrOwner => {
            let owner = is_owner(store, project_id, principal).await?;
            owner || author_id == Some(principal.user_id())
        }
    };

    if !allowed {
        tracing::debug!(
            user_id = %principal.user_id(),
            project_id = %project_id,
            relationship = ?relationship,
            "Access denied"
        );
        return Err(AuthzError::AccessDenied);
    }

    Ok(())
}

/// Checks a project-level action
pub async fn authorize_project(
    store: &dyn Store,
    principal: Principal,
    project_id: Uuid,
    action: ProjectAction,
) -> Result<(), AuthzError> {
    require(store, project_id, principal, action.required(), None).await
}

/// Checks that `principal` may create a task in the project
pub async fn authorize_new_task(store: &dyn Store, principal: Principal, project_id: Uuid) -> Result<(), AuthzError> {
    require(store, project_id, principal, TaskAction::Create.required(), None).await
}

/// Loads a task and checks the relationship an action on it, or on its
/// comments, requires
///
/// Accepts a [`TaskAction`], a [`CommentAction`] (create or list comments
/// under the task) or a bare [`Relationship`].
///
/// # Errors
///
/// `AuthzError::TaskNotFound` before any permission check
pub async fn authorize_task(
    store: &dyn Store,
    principal: Principal,
    task_id: Uuid,
    required: impl Into<Relationship>,
) -> Result<Task, AuthzError> {
    let task = store.find_task(task_id).await?.ok_or(AuthzError::TaskNotFound)?;
    require(store, task.project_id, principal, required.into(), None).await?;
    Ok(task)
}

/// Loads a comment and checks an action on it
///
/// # Errors
///
/// `AuthzError::CommentNotFound` or `AuthzError::TaskNotFound` before any
/// permission check
pub async fn authorize_comment(
    store: &dyn Store,
    principal: Principal,
    comment_id: Uuid,
    action: CommentAction,
) -> Result<Comment, AuthzError> {
    let comment = store
        .find_comment(comment_id)
        .await?
        .ok_or(AuthzError::CommentNotFound)?;
    let task = store
        .find_task(comment.task_id)
        .await?
        .ok_or(AuthzError::TaskNotFound)?;

    require(store, task.project_id, principal, action.required(), Some(comment.author_id)).await?;
    Ok(comment)
}

/// Which projects `principal` may list
pub fn project_list_scope(principal: Principal) -> ProjectScope {
    match principal {
        Principal::Superuser(_) => ProjectScope::All,
        Principal::Scoped(user_id) => ProjectScope::VisibleTo(user_id),
    }
}
