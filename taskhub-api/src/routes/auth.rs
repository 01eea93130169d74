/// Authentication endpoints
///
/// This module provides user authentication endpoints:
/// - Registration
/// - Login
/// - Current user
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Register new user
/// - `POST /api/v1/auth/login` - Login and get a token
/// - `GET /api/v1/auth/me` - Current user (authenticated)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use taskhub_shared::{
    auth::{
        jwt::{self, Claims},
        middleware::AuthContext,
        password,
    },
    models::user::{GlobalRole, NewUser, User},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Register and login response
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,

    /// Bearer token
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
}

fn issue_token(state: &AppState, user: &User) -> ApiResult<String> {
    let claims = Claims::with_expiration(
        user.id,
        user.email.clone(),
        user.role,
        chrono::Duration::hours(state.config.jwt.expires_in_hours),
    );
    Ok(jwt::create_token(&claims, state.jwt_secret())?)
}

/// Register a new user
///
/// New accounts always get the `member` global role; the request cannot
/// choose a role.
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "secret1",
///   "name": "Jane Doe"
/// }
/// ```
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: Validation failed
/// - `409 DUPLICATE_EMAIL`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    if state.store.find_user_by_email(&req.email).await?.is_some() {
        return Err(duplicate_email());
    }

    let password_hash = password::hash_password(&req.password, &state.hash_cost())?;

    let user = state
        .store
        .create_user(NewUser {
            email: req.email,
            name: req.name,
            password_hash,
            role: GlobalRole::Member,
        })
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if e.is_unique_violation() {
                duplicate_email()
            } else {
                e.into()
            }
        })?;

    tracing::info!(user_id = %user.id, "User registered");

    let token = issue_token(&state, &user)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

fn duplicate_email() -> ApiError {
    ApiError::conflict("DUPLICATE_EMAIL", "User with this email already exists")
}

/// Login endpoint
///
/// Authenticates a user and returns a JWT. Unknown email and wrong password
/// produce the same error.
///
/// # Errors
///
/// - `400 VALIDATION_ERROR`: Validation failed
/// - `401 INVALID_CREDENTIALS`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::unauthorized("INVALID_CREDENTIALS", "Invalid email or password");

    let user = state
        .store
        .find_user_by_email(&req.email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid());
    }

    let token = issue_token(&state, &user)?;

    Ok(Json(AuthResponse { user, token }))
}

/// Returns the authenticated user
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let user = state
        .store
        .find_user(auth.user_id())
        .await?
        .ok_or_else(|| ApiError::not_found("USER_NOT_FOUND", "User not found"))?;

    Ok(Json(MeResponse { user }))
}
