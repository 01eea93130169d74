/// Project-owner guard
///
/// Route middleware for the owner-only project routes (update, delete,
/// add/remove member). Runs before the handler and answers 404
/// `PROJECT_NOT_FOUND` for unknown projects and 403 `ACCESS_DENIED` for
/// anyone who is neither the project's owner nor a global owner.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use taskhub_shared::auth::{
    authorization::{authorize_project, ProjectAction},
    middleware::AuthContext,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extract::ApiPath;

/// Path parameters of the guarded routes; `:id` is always the project
#[derive(Debug, serde::Deserialize)]
pub struct ProjectRouteParams {
    pub id: Uuid,

    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
}

pub async fn require_project_owner(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(params): ApiPath<ProjectRouteParams>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let action = if params.user_id.is_some() || request.uri().path().ends_with("/members") {
        ProjectAction::ManageMembers
    } else if request.method() == axum::http::Method::DELETE {
        ProjectAction::Delete
    } else {
        ProjectAction::Update
    };

    authorize_project(state.store.as_ref(), auth.principal, params.id, action).await?;

    Ok(next.run(request).await)
}
