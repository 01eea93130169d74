/// Request authentication primitives for Axum middleware
///
/// [`authenticate`] validates the `Authorization: Bearer <token>` header and
/// produces an [`AuthContext`]. The API's auth layer inserts it into the
/// request extensions; handlers and downstream middleware (the idempotency
/// coordinator, the project-owner guard) read the caller's identity from
/// there and nowhere else.
///
/// # Example
///
/// ```no_run
/// use axum::{extract::Request, middleware::Next, response::{IntoResponse, Response}};
/// use taskhub_shared::auth::middleware::authenticate;
///
/// async fn auth_layer(mut req: Request, next: Next) -> Response {
///     match authenticate(req.headers(), "secret") {
///         Ok(auth) => {
///             req.extensions_mut().insert(auth);
///             next.run(req).await
///         }
///         Err(e) => (axum::http::StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
///     }
/// }
/// ```

use axum::http::{header, HeaderMap};
use serde::Serialize;
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use crate::models::user::GlobalRole;

/// Who is acting, and whether project-level checks apply to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "userId", rename_all = "lowercase")]
pub enum Principal {
    /// Global owner: every project-level check passes for existing resources
    Superuser(Uuid),

    /// Regular user, limited to projects they own or are a member of
    Scoped(Uuid),
}

impl Principal {
    pub fn new(user_id: Uuid, role: GlobalRole) -> Self {
        match role {
            GlobalRole::Owner => Principal::Superuser(user_id),
            GlobalRole::Member => Principal::Scoped(user_id),
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            Principal::Superuser(id) | Principal::Scoped(id) => *id,
        }
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, Principal::Superuser(_))
    }
}

/// Authentication context added to request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub principal: Principal,

    pub email: String,
}

impl AuthContext {
    /// Creates auth context from validated JWT claims
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            principal: Principal::new(claims.sub, claims.role),
            email: claims.email,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.principal.user_id()
    }
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or non-bearer authorization header
    #[error("Authentication required")]
    MissingCredentials,

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "AUTH_REQUIRED",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            _ => AuthError::InvalidToken("Invalid token".to_string()),
        }
    }
}

/// Extracts and validates the bearer token from request headers
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredentials)?;

    let claims = validate_token(token, secret)?;
    Ok(AuthContext::from_claims(claims))
}
