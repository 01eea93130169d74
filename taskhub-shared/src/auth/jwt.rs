/// Bearer tokens for TaskHub users
///
/// HS256 tokens carrying the user id, email and global role. The API signs
/// one on register and login; the auth middleware validates it on every
/// protected request and turns the claims into an
/// [`AuthContext`](crate::auth::middleware::AuthContext).
///
/// Global roles never change after registration, so the role claim is
/// trusted without a database lookup.
///
/// ```
/// use taskhub_shared::auth::jwt::{create_token, validate_token, Claims};
/// use taskhub_shared::models::user::GlobalRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "your-secret-key-at-least-32-bytes-long";
/// let claims = Claims::new(Uuid::new_v4(), "alice@example.com".to_string(), GlobalRole::Member);
///
/// let token = create_token(&claims, secret)?;
/// assert_eq!(validate_token(&token, secret)?.role, GlobalRole::Member);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::GlobalRole;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "taskhub";

/// Default token lifetime
pub const DEFAULT_EXPIRATION_HOURS: i64 = 168;

/// Signing and validation failures
///
/// Everything except `CreateError` means the client sent a bad token and maps
/// to 401 `INVALID_TOKEN`.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    CreateError(String),

    #[error("Invalid token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token was not issued by {expected}")]
    InvalidIssuer { expected: String },
}

/// Token payload: registered claims plus `email` and `role`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,

    pub email: String,

    pub role: GlobalRole,

    /// [`ISSUER`]
    pub iss: String,

    // Unix timestamps
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
}

impl Claims {
    /// Claims valid for [`DEFAULT_EXPIRATION_HOURS`]
    pub fn new(user_id: Uuid, email: String, role: GlobalRole) -> Self {
        Self::with_expiration(user_id, email, role, Duration::hours(DEFAULT_EXPIRATION_HOURS))
    }

    /// Claims valid from now for `expires_in` (`JWT_EXPIRES_IN_HOURS` in the API)
    pub fn with_expiration(user_id: Uuid, email: String, role: GlobalRole, expires_in: Duration) -> Self {
        let issued_at = Utc::now().timestamp();

        Self {
            sub: user_id,
            email,
            role,
            iss: ISSUER.to_string(),
            iat: issued_at,
            exp: issued_at + expires_in.num_seconds(),
            nbf: issued_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs `claims` with the shared secret
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Checks signature, `exp`, `nbf` and `iss`, then returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: ISSUER.to_string(),
            },
            _ => JwtError::ValidationError(e.to_string()),
        })
}
