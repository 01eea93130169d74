/// Project and membership endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/projects` - Create a project; the caller becomes its owner
/// - `GET /api/v1/projects` - Projects visible to the caller
/// - `GET /api/v1/projects/:id` - Project with its members
/// - `PUT /api/v1/projects/:id` - Update (owner only)
/// - `DELETE /api/v1/projects/:id` - Delete with tasks, comments and members (owner only)
/// - `POST /api/v1/projects/:id/members` - Add a member (owner only)
/// - `DELETE /api/v1/projects/:id/members/:userId` - Remove a member (owner only)
///
/// Listing accepts `search` (name or description, ignoring case), `name`,
/// `ownerId`, `myRole=owner|member`, the `createdAfter`/`createdBefore`/
/// `updatedAfter`/`updatedBefore` bounds and `sortBy=name|createdAt|updatedAt`
/// with `sortOrder` (newest first by default).
///
/// Owner-only routes are guarded by
/// [`require_project_owner`](crate::middleware::project_owner::require_project_owner)
/// before these handlers run.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_blank, uuid_param, ApiJson, ApiPath, ApiQuery, DateRangeQuery, PageQuery, SortQuery},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        authorization::{authorize_project, project_list_scope, ProjectAction},
        middleware::AuthContext,
    },
    models::{
        membership::{NewProjectMember, ProjectMember},
        project::{NewProject, Project, ProjectFilter, ProjectSort, ProjectSortField, UpdateProject},
        user::User,
        Pagination, SortOrder,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,

    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Uuid,

    #[validate(length(min = 1, max = 50, message = "Role must be between 1 and 50 characters"))]
    pub role: String,
}

/// Membership row with the member's public profile
#[derive(Debug, Serialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub member: ProjectMember,

    pub user: Option<User>,
}

/// Project with its members
#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,

    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse<P> {
    pub project: P,
}

#[derive(Debug, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: MemberView,
}

async fn member_views(state: &AppState, members: Vec<ProjectMember>) -> ApiResult<Vec<MemberView>> {
    let mut views = Vec::with_capacity(members.len());
    for member in members {
        let user = state.store.find_user(member.user_id).await?;
        views.push(MemberView { member, user });
    }
    Ok(views)
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<ProjectResponse<ProjectDetail>>)> {
    req.validate()?;

    let project = state
        .store
        .create_project(NewProject {
            name: req.name,
            description: req.description,
            owner_id: auth.user_id(),
        })
        .await?;

    tracing::info!(project_id = %project.id, user_id = %auth.user_id(), "Project created");

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            project: ProjectDetail {
                project,
                members: Vec::new(),
            },
        }),
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    #[serde(flatten)]
    pub page: PageQuery,

    #[serde(flatten)]
    pub sort: SortQuery,

    #[serde(flatten)]
    pub dates: DateRangeQuery,

    pub search: Option<String>,

    pub name: Option<String>,

    pub owner_id: Option<String>,

    /// `owner` or `member`; anything else is ignored
    pub my_role: Option<String>,
}

impl ProjectListQuery {
    fn filter(&self, user_id: Uuid) -> ApiResult<ProjectFilter> {
        let mut filter = ProjectFilter {
            search: non_blank(&self.search),
            name: non_blank(&self.name),
            owner_id: uuid_param("ownerId", &self.owner_id)?,
            member_id: None,
            created: self.dates.created(),
            updated: self.dates.updated(),
        };

        match self.my_role.as_deref().map(str::trim) {
            Some("owner") => filter.owner_id = Some(user_id),
            Some("member") => filter.member_id = Some(user_id),
            _ => {}
        }

        Ok(filter)
    }

    fn sort(&self) -> ProjectSort {
        ProjectSort {
            field: self.sort.field(ProjectSortField::parse, ProjectSortField::CreatedAt),
            order: self.sort.order(SortOrder::Desc),
        }
    }
}

/// Lists projects the caller can see
///
/// Global owners see every project; everyone else sees the projects they own
/// or are a member of.
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ProjectListQuery>,
) -> ApiResult<Json<ProjectListResponse>> {
    let filter = query.filter(auth.user_id())?;
    let page = query.page.page();
    let (projects, total) = state
        .store
        .list_projects(project_list_scope(auth.principal), &filter, query.sort(), page)
        .await?;

    Ok(Json(ProjectListResponse {
        projects,
        pagination: Pagination::new(page, total),
    }))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ProjectResponse<ProjectDetail>>> {
    authorize_project(state.store.as_ref(), auth.principal, id, ProjectAction::Read).await?;

    let project = state
        .store
        .find_project(id)
        .await?
        .ok_or_else(|| ApiError::not_found("PROJECT_NOT_FOUND", "Project not found"))?;
    let members = state.store.list_memberships(id).await?;
    let members = member_views(&state, members).await?;

    Ok(Json(ProjectResponse {
        project: ProjectDetail { project, members },
    }))
}

pub async fn update_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> ApiResult<Json<ProjectResponse<Project>>> {
    req.validate()?;

    let project = state
        .store
        .update_project(
            id,
            UpdateProject {
                name: req.name,
                description: req.description,
            },
        )
        .await?
        .ok_or_else(|| ApiError::not_found("PROJECT_NOT_FOUND", "Project not found"))?;

    Ok(Json(ProjectResponse { project }))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_project(id).await? {
        return Err(ApiError::not_found("PROJECT_NOT_FOUND", "Project not found"));
    }

    tracing::info!(project_id = %id, user_id = %auth.user_id(), "Project deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_member(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberResponse>)> {
    req.validate()?;

    let member_exists = || ApiError::conflict("MEMBER_EXISTS", "User is already a member of this project");

    if state.store.find_membership(id, req.user_id).await?.is_some() {
        return Err(member_exists());
    }

    let user = state
        .store
        .find_user(req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;

    let member = state
        .store
        .create_membership(NewProjectMember {
            project_id: id,
            user_id: user.id,
            role: req.role,
        })
        .await
        .map_err(|e| {
            if e.is_unique_violation() {
                member_exists()
            } else {
                e.into()
            }
        })?;

    tracing::info!(project_id = %id, user_id = %user.id, role = %member.role, "Member added");

    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            member: MemberView {
                member,
                user: Some(user),
            },
        }),
    ))
}

pub async fn remove_member(
    State(state): State<AppState>,
    ApiPath((id, user_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    if !state.store.delete_membership(id, user_id).await? {
        return Err(ApiError::not_found("MEMBER_NOT_FOUND", "Member not found in this project"));
    }

    tracing::info!(project_id = %id, user_id = %user_id, "Member removed");

    Ok(StatusCode::NO_CONTENT)
}
