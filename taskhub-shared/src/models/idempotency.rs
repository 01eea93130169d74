/// Idempotency record model and database operations
///
/// A record is keyed by the request fingerprint (see
/// [`crate::idempotency::Fingerprint`]). It goes through two states:
///
/// - **pending**: inserted when a request claims the fingerprint, before the
///   handler runs. `status_code` and `response_body` are NULL.
/// - **completed**: the handler answered 201 and its body was stored.
///
/// The primary key on `fingerprint` is what makes concurrent claims safe:
/// exactly one INSERT wins, every other one fails with a unique violation.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE idempotency_keys (
///     fingerprint TEXT PRIMARY KEY,
///     claim_id UUID NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     method TEXT NOT NULL,
///     path TEXT NOT NULL,
///     status_code INTEGER,
///     response_body JSONB,
///     expires_at TIMESTAMPTZ NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Response captured from the original request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub fingerprint: String,

    /// Identifies the request holding the claim; completion and release are
    /// conditional on it
    pub claim_id: Uuid,

    pub user_id: Uuid,

    pub method: String,

    pub path: String,

    /// `None` while the claim is pending
    pub response: Option<StoredResponse>,

    pub expires_at: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    /// A record is live while `expires_at > now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_pending(&self) -> bool {
        self.response.is_none()
    }
}

/// Input for claiming a fingerprint
#[derive(Debug, Clone)]
pub struct NewIdempotencyRecord {
    pub fingerprint: String,
    pub claim_id: Uuid,
    pub user_id: Uuid,
    pub method: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct IdempotencyRow {
    fingerprint: String,
    claim_id: Uuid,
    user_id: Uuid,
    method: String,
    path: String,
    status_code: Option<i32>,
    response_body: Option<serde_json::Value>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<IdempotencyRow> for IdempotencyRecord {
    fn from(row: IdempotencyRow) -> Self {
        let response = match (row.status_code, row.response_body) {
            (Some(code), Some(body)) => u16::try_from(code).ok().map(|status_code| StoredResponse {
                status_code,
                body,
            }),
            _ => None,
        };

        Self {
            fingerprint: row.fingerprint,
            claim_id: row.claim_id,
            user_id: row.user_id,
            method: row.method,
            path: row.path,
            response,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

impl IdempotencyRecord {
    pub async fn find(pool: &PgPool, fingerprint: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, IdempotencyRow>(
            r#"
            SELECT fingerprint, claim_id, user_id, method, path, status_code,
                   response_body, expires_at, created_at
            FROM idempotency_keys
            WHERE fingerprint = $1
            "#,
        )
        .bind(fingerprint)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Inserts a pending claim
    ///
    /// # Errors
    ///
    /// Fails with a unique violation when another request already holds the
    /// fingerprint.
    pub async fn create(pool: &PgPool, data: NewIdempotencyRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (fingerprint, claim_id, user_id, method, path, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(data.fingerprint)
        .bind(data.claim_id)
        .bind(data.user_id)
        .bind(data.method)
        .bind(data.path)
        .bind(data.expires_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Stores the response on a pending claim held by `claim_id`
    pub async fn complete(
        pool: &PgPool,
        fingerprint: &str,
        claim_id: Uuid,
        response: &StoredResponse,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET status_code = $3, response_body = $4, expires_at = $5
            WHERE fingerprint = $1 AND claim_id = $2 AND status_code IS NULL
            "#,
        )
        .bind(fingerprint)
        .bind(claim_id)
        .bind(i32::from(response.status_code))
        .bind(response.body.clone())
        .bind(expires_at)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drops a pending claim held by `claim_id`
    pub async fn release(pool: &PgPool, fingerprint: &str, claim_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE fingerprint = $1 AND claim_id = $2 AND status_code IS NULL
            "#,
        )
        .bind(fingerprint)
        .bind(claim_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the record only if it is still expired at `now`
    pub async fn purge_expired(
        pool: &PgPool,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE fingerprint = $1 AND expires_at <= $2
            "#,
        )
        .bind(fingerprint)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(expires_at: DateTime<Utc>, response: Option<StoredResponse>) -> IdempotencyRecord {
        IdempotencyRecord {
            fingerprint: "fp".to_string(),
            claim_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            method: "POST".to_string(),
            path: "/api/v1/projects".to_string(),
            response,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        assert!(!record(now + Duration::seconds(1), None).is_expired(now));
        assert!(record(now, None).is_expired(now));
        assert!(record(now - Duration::seconds(1), None).is_expired(now));
    }

    #[test]
    fn test_pending_until_response_stored() {
        let now = Utc::now();
        assert!(record(now, None).is_pending());

        let completed = record(
            now,
            Some(StoredResponse {
                status_code: 201,
                body: serde_json::json!({ "project": { "id": "x" } }),
            }),
        );
        assert!(!completed.is_pending());
    }
}
