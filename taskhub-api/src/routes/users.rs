/// User directory endpoints
///
/// - `GET /api/v1/users?page&limit` - Paginated user list, newest first
/// - `GET /api/v1/users/:id` - Single user

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery, PageQuery},
};
use axum::{extract::State, Json};
use serde::Serialize;
use taskhub_shared::models::{user::User, Pagination};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let page = query.page();
    let (users, total) = state.store.list_users(page).await?;

    Ok(Json(UserListResponse {
        users,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;

    Ok(Json(UserResponse { user }))
}
