/// Comment endpoints
///
/// - `POST /api/v1/tasks/:id/comments` - Comment on a task (any participant)
/// - `GET /api/v1/tasks/:id/comments` - Comments on a task, oldest first
/// - `GET /api/v1/comments/:id` - Single comment
/// - `DELETE /api/v1/comments/:id` - Author or project owner only
///
/// Listing accepts `search` (content, ignoring case), `authorId`,
/// `myComments=true|false` (which wins over `authorId`), the date bounds and
/// `sortBy=createdAt|updatedAt` with `sortOrder`.

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
        authorization::{authorize_comment, authorize_task, CommentAction},
        middleware::AuthContext,
    },
    models::{
        comment::{Comment, CommentFilter, CommentSort, CommentSortField, NewComment},
        Pagination, SortOrder,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be between 1 and 5000 characters"))]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListQuery {
    #[serde(flatten)]
    pub page: PageQuery,

    #[serde(flatten)]
    pub sort: SortQuery,

    #[serde(flatten)]
    pub dates: DateRangeQuery,

    pub search: Option<String>,

    pub author_id: Option<String>,

    pub my_comments: Option<String>,
}

impl CommentListQuery {
    fn filter(&self, user_id: Uuid) -> ApiResult<CommentFilter> {
        let mut filter = CommentFilter {
            search: non_blank(&self.search),
            author_id: uuid_param("authorId", &self.author_id)?,
            exclude_author_id: None,
            created: self.dates.created(),
            updated: self.dates.updated(),
        };

        match bool_param(&self.my_comments) {
            Some(true) => filter.author_id = Some(user_id),
            Some(false) => {
                filter.author_id = None;
                filter.exclude_author_id = Some(user_id);
            }
            None => {}
        }

        Ok(filter)
    }

    fn sort(&self) -> CommentSort {
        CommentSort {
            field: self.sort.field(CommentSortField::parse, CommentSortField::CreatedAt),
            order: self.sort.order(SortOrder::Asc),
        }
    }
}

/// Adds a comment to a task
///
/// Like task creation, access is decided before the body is looked at.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<serde_json::Value>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    authorize_task(state.store.as_ref(), auth.principal, task_id, CommentAction::Create).await?;

    let req: CreateCommentRequest = parse_body(body)?;

    let comment = state
        .store
        .create_comment(NewComment {
            task_id,
            author_id: auth.user_id(),
            content: req.content,
        })
        .await?;

    tracing::info!(comment_id = %comment.id, task_id = %task_id, user_id = %auth.user_id(), "Comment created");

    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(task_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<CommentListQuery>,
) -> ApiResult<Json<CommentListResponse>> {
    authorize_task(state.store.as_ref(), auth.principal, task_id, CommentAction::Read).await?;

    let filter = query.filter(auth.user_id())?;
    let page = query.page.page();
    let (comments, total) = state.store.list_comments(task_id, &filter, query.sort(), page).await?;

    Ok(Json(CommentListResponse {
        comments,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<CommentResponse>> {
    let comment = authorize_comment(state.store.as_ref(), auth.principal, id, CommentAction::Read).await?;

    Ok(Json(CommentResponse { comment }))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    authorize_comment(state.store.as_ref(), auth.principal, id, CommentAction::Delete).await?;

    if !state.store.delete_comment(id).await? {
        return Err(ApiError::not_found("COMMENT_NOT_FOUND", "Comment not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
