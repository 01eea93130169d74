/// Task endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/projects/:id/tasks` - Create a task (any participant)
/// - `GET /api/v1/projects/:id/tasks` - List (any participant)
/// - `GET /api/v1/tasks/:id` - Read (any participant)
/// - `PUT /api/v1/tasks/:id` - Update (any participant)
/// - `DELETE /api/v1/tasks/:id` - Delete (project owner only)
///
/// # Listing
///
/// `search` matches title or description, ignoring case (description only
/// when `title` is also given). Exact filters: `title`, `status`,
/// `priority`, `assignedToId`, `createdById`. `unassigned=true|false` applies
/// when `assignedToId` is absent. Date bounds: `createdAfter`,
/// `createdBefore`, `updatedAfter`, `updatedBefore`. `sortBy` is one of
/// `title`, `status`, `priority`, `createdAt` (default), `updatedAt`;
/// `sortOrder` is `asc` or `desc` (default).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{
        bool_param, non_blank, parse_body, uuid_param, ApiJson, ApiPath, ApiQuery, DateRangeQuery, PageQuery,
        SortQuery,
    },
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{authorize_new_task, authorize_project, authorize_task, ProjectAction, TaskAction},
        middleware::AuthContext,
    },
    models::{
        task::{NewTask, Task, TaskFilter, TaskSort, TaskSortField, UpdateTask, DEFAULT_PRIORITY, DEFAULT_STATUS},
        Pagination, SortOrder,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Status must be between 1 and 50 characters"))]
    pub status: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Priority must be between 1 and 50 characters"))]
    pub priority: Option<String>,

    pub assigned_to_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Status must be between 1 and 50 characters"))]
    pub status: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Priority must be between 1 and 50 characters"))]
    pub priority: Option<String>,

    pub assigned_to_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    #[serde(flatten)]
    pub page: PageQuery,

    #[serde(flatten)]
    pub sort: SortQuery,

    #[serde(flatten)]
    pub dates: DateRangeQuery,

    pub search: Option<String>,

    pub title: Option<String>,

    pub status: Option<String>,

    pub priority: Option<String>,

    pub assigned_to_id: Option<String>,

    pub unassigned: Option<String>,

    pub created_by_id: Option<String>,
}

impl TaskListQuery {
    fn filter(&self) -> ApiResult<TaskFilter> {
        Ok(TaskFilter {
            search: non_blank(&self.search),
            title: non_blank(&self.title),
            status: non_blank(&self.status),
            priority: non_blank(&self.priority),
            assigned_to_id: uuid_param("assignedToId", &self.assigned_to_id)?,
            unassigned: bool_param(&self.unassigned),
            created_by_id: uuid_param("createdById", &self.created_by_id)?,
            created: self.dates.created(),
            updated: self.dates.updated(),
        })
    }

    fn sort(&self) -> TaskSort {
        TaskSort {
            field: self.sort.field(TaskSortField::parse, TaskSortField::CreatedAt),
            order: self.sort.order(SortOrder::Desc),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub pagination: Pagination,
}

/// Creates a task in a project
///
/// Membership is checked before the body is validated, so a non-participant
/// gets 403 regardless of payload.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(project_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    authorize_new_task(state.store.as_ref(), auth.principal, project_id).await?;

    let req: CreateTaskRequest = parse_body(body)?;

    let task = state
        .store
        .create_task(NewTask {
            project_id,
            title: req.title,
            description: req.description,
            status: req.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            priority: req.priority.unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            assigned_to_id: req.assigned_to_id,
            created_by_id: auth.user_id(),
        })
        .await?;

    tracing::info!(task_id = %task.id, project_id = %project_id, user_id = %auth.user_id(), "Task created");

    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(project_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> ApiResult<Json<TaskListResponse>> {
    authorize_project(state.store.as_ref(), auth.principal, project_id, ProjectAction::Read).await?;

    let page = query.page.page();
    let filter = query.filter()?;
    let (tasks, total) = state.store.list_tasks(project_id, &filter, query.sort(), page).await?;

    Ok(Json(TaskListResponse {
        tasks,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let task = authorize_task(state.store.as_ref(), auth.principal, id, TaskAction::Read).await?;

    Ok(Json(TaskResponse { task }))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    authorize_task(state.store.as_ref(), auth.principal, id, TaskAction::Update).await?;
    req.validate()?;

    let task = state
        .store
        .update_task(
            id,
            UpdateTask {
                title: req.title,
                description: req.description,
                status: req.status,
                priority: req.priority,
                assigned_to_id: req.assigned_to_id,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("TASK_NOT_FOUND", "Task not found"))?;

    Ok(Json(TaskResponse { task }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize_task(state.store.as_ref(), auth.principal, id, TaskAction::Delete).await?;

    if !state.store.delete_task(id).await? {
        return Err(ApiError::not_found("TASK_NOT_FOUND", "Task not found"));
    }

    tracing::info!(task_id = %id, user_id = %auth.user_id(), "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
