/// Idempotent POST coordination
///
/// A client may send `Idempotency-Key: <key>` with a POST. The first request
/// with a given key runs normally; if it answers 201 its body is stored and
/// every later request with the same key, from the same user, on the same
/// path, gets that body back with status 200 instead of running again.
///
/// # Scope
///
/// Records are keyed by a [`Fingerprint`]: the SHA-256 of
/// `METHOD:path:userId:key`. The path is the full request path with path
/// parameters resolved, so the same key is independent across users, routes
/// and path-parameter instances.
///
/// # Concurrency
///
/// No in-process lock is taken. Before the handler runs, the request claims
/// the fingerprint by inserting a *pending* record; the storage uniqueness
/// constraint lets exactly one insert win. A loser polls the record until it
/// is completed (replay), released or expired (claim again), or the wait
/// timeout elapses ([`Decision::InUse`]).
///
/// # Failure handling
///
/// Storage faults never fail the request: they are logged and the request
/// proceeds without deduplication.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_shared::auth::middleware::Principal;
/// use taskhub_shared::idempotency::{
///     Decision, IdempotencyConfig, IdempotencyCoordinator, IdempotencyKey, RequestContext,
/// };
/// use taskhub_shared::store::MemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let coordinator = IdempotencyCoordinator::new(Arc::new(MemoryStore::new()), IdempotencyConfig::default());
/// let ctx = RequestContext::new(Principal::Scoped(Uuid::new_v4()), "POST", "/api/v1/projects");
/// let key = IdempotencyKey::parse("create-project-1")?;
///
/// match coordinator.begin(&ctx, &key).await {
///     Decision::Replay(stored) => println!("replay {}", stored.body),
///     Decision::Proceed(claim) => {
///         // run the handler, then:
///         if let Some(claim) = claim {
///             coordinator.finish(claim, 201, Some(serde_json::json!({ "project": {} }))).await;
///         }
///     }
///     Decision::InUse => println!("another request holds this key"),
/// }
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::middleware::Principal;
use crate::models::idempotency::{NewIdempotencyRecord, StoredResponse};
use crate::store::Store;

/// Request header carrying the client key
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Rejected `Idempotency-Key` header value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidKey {
    #[error("Idempotency key must not be empty")]
    Empty,

    #[error("Idempotency key must be valid UTF-8")]
    NotUtf8,
}

/// A trimmed, non-blank client key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Trims surrounding whitespace; anything left over is a valid key
    pub fn parse(raw: &str) -> Result<Self, InvalidKey> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidKey::Empty);
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn from_header(raw: &[u8]) -> Result<Self, InvalidKey> {
        let value = std::str::from_utf8(raw).map_err(|_| InvalidKey::NotUtf8)?;
        Self::parse(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Who is making which request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Principal,

    /// Uppercase HTTP method
    pub method: String,

    /// Full request path, path parameters resolved, no query string
    pub path: String,
}

impl RequestContext {
    pub fn new(principal: Principal, method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            principal,
            method: method.into(),
            path: path.into(),
        }
    }
}

/// SHA-256 hex digest identifying an idempotency scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(ctx: &RequestContext, key: &IdempotencyKey) -> Self {
        let scoped = format!(
            "{}:{}:{}:{}",
            ctx.method,
            ctx.path,
            ctx.principal.user_id(),
            key.as_str()
        );
        Self(hex::encode(Sha256::digest(scoped.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timing parameters of the coordinator
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    /// Lifetime of a stored 201 response
    pub ttl: Duration,

    /// Lifetime of a pending claim; bounds how long a crashed or cancelled
    /// request blocks its key
    pub claim_ttl: Duration,

    /// How long a request waits on another request's pending claim
    pub wait_timeout: Duration,

    pub poll_interval: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            claim_ttl: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(25),
        }
    }
}

/// A fingerprint claimed by the current request
///
/// Hand it to [`IdempotencyCoordinator::finish`]. A claim dropped without
/// finishing (the handler future was cancelled, or panicked) releases its
/// pending record from a spawned task, so retries don't wait out
/// `claim_ttl`.
pub struct Claim {
    pub fingerprint: Fingerprint,
    pub claim_id: Uuid,

    /// Set until the claim is finished
    store: Option<Arc<dyn Store>>,
}

impl Claim {
    fn new(fingerprint: Fingerprint, claim_id: Uuid, store: Arc<dyn Store>) -> Self {
        Self {
            fingerprint,
            claim_id,
            store: Some(store),
        }
    }

    fn disarm(&mut self) {
        self.store = None;
    }
}

impl std::fmt::Debug for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim")
            .field("fingerprint", &self.fingerprint)
            .field("claim_id", &self.claim_id)
            .field("armed", &self.store.is_some())
            .finish()
    }
}

impl PartialEq for Claim {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.claim_id == other.claim_id
    }
}

impl Eq for Claim {}

impl Drop for Claim {
    fn drop(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                fingerprint = %self.fingerprint,
                "Idempotency claim dropped outside a runtime; it expires with claim_ttl"
            );
            return;
        };

        let fingerprint = self.fingerprint.clone();
        let claim_id = self.claim_id;
        runtime.spawn(async move {
            match store.release_idempotency_record(fingerprint.as_str(), claim_id).await {
                Ok(released) => {
                    tracing::debug!(fingerprint = %fingerprint, released, "Released abandoned idempotency claim");
                }
                Err(e) => {
                    tracing::warn!(error = %e, fingerprint = %fingerprint, "Failed to release abandoned idempotency claim");
                }
            }
        });
    }
}

/// What to do with an incoming request
#[derive(Debug, PartialEq)]
pub enum Decision {
    /// Answer with the stored response, don't run the handler
    Replay(StoredResponse),

    /// Run the handler. With a claim, hand the result to
    /// [`IdempotencyCoordinator::finish`]; without one (storage fault), the
    /// response is not recorded.
    Proceed(Option<Claim>),

    /// Another request still holds the key after the wait timeout
    InUse,
}

fn expires_at(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Decides between replay and execution, and records 201 responses
#[derive(Clone)]
pub struct IdempotencyCoordinator {
    store: Arc<dyn Store>,
    config: IdempotencyConfig,
}

impl IdempotencyCoordinator {
    pub fn new(store: Arc<dyn Store>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &IdempotencyConfig {
        &self.config
    }

    /// Looks up the fingerprint of `ctx` + `key` and either replays, claims
    /// it, or gives up after waiting on another claim
    pub async fn begin(&self, ctx: &RequestContext, key: &IdempotencyKey) -> Decision {
        let fingerprint = Fingerprint::new(ctx, key);
        let user_id = ctx.principal.user_id();
        let deadline = Instant::now() + self.config.wait_timeout;

        loop {
            let now = Utc::now();

            match self.store.find_idempotency_record(fingerprint.as_str()).await {
                Ok(Some(record)) if !record.is_expired(now) => {
                    if let Some(response) = record.response {
                        tracing::info!(
                            fingerprint = %fingerprint,
                            user_id = %user_id,
                            path = %ctx.path,
                            "Replaying stored response for idempotency key"
                        );
                        return Decision::Replay(response);
                    }

                    if Instant::now() >= deadline {
                        tracing::warn!(
                            fingerprint = %fingerprint,
                            user_id = %user_id,
                            "Idempotency key still held by another request"
                        );
                        return Decision::InUse;
                    }

                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                Ok(Some(_)) => {
                    if let Err(e) = self
                        .store
                        .purge_expired_idempotency_record(fingerprint.as_str(), now)
                        .await
                    {
                        tracing::error!(error = %e, fingerprint = %fingerprint, "Failed to purge expired idempotency record");
                        return Decision::Proceed(None);
                    }
                    tracing::debug!(fingerprint = %fingerprint, "Purged expired idempotency record");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, fingerprint = %fingerprint, "Error checking idempotency key");
                    return Decision::Proceed(None);
                }
            }

            let claim_id = Uuid::new_v4();
            let record = NewIdempotencyRecord {
                fingerprint: fingerprint.as_str().to_string(),
                claim_id,
                user_id,
                method: ctx.method.clone(),
                path: ctx.path.clone(),
                expires_at: expires_at(now, self.config.claim_ttl),
            };

            match self.store.create_idempotency_record(record).await {
                Ok(()) => {
                    tracing::debug!(fingerprint = %fingerprint, user_id = %user_id, "Claimed idempotency key");
                    return Decision::Proceed(Some(Claim::new(fingerprint.clone(), claim_id, self.store.clone())));
                }
                Err(e) if e.is_unique_violation() => {
                    // Lost the race; the next lookup sees the winner's record
                    tracing::debug!(fingerprint = %fingerprint, "Idempotency key claimed concurrently");
                    if Instant::now() >= deadline {
                        return Decision::InUse;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, fingerprint = %fingerprint, "Failed to claim idempotency key");
                    return Decision::Proceed(None);
                }
            }
        }
    }

    /// Records the handler's response on the claim
    ///
    /// Only a 201 with a JSON body is stored. Anything else releases the
    /// claim so the client can retry with the same key.
    pub async fn finish(&self, mut claim: Claim, status: u16, body: Option<serde_json::Value>) {
        let fingerprint = claim.fingerprint.as_str();

        match (status, body) {
            (201, Some(body)) => {
                let response = StoredResponse {
                    status_code: status,
                    body,
                };
                let expires = expires_at(Utc::now(), self.config.ttl);

                match self
                    .store
                    .complete_idempotency_record(fingerprint, claim.claim_id, &response, expires)
                    .await
                {
                    Ok(true) => {
                        tracing::debug!(fingerprint = %fingerprint, "Stored idempotent response");
                    }
                    Ok(false) => {
                        tracing::warn!(fingerprint = %fingerprint, "Idempotency claim lost before response was stored");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, fingerprint = %fingerprint, "Failed to store idempotency key response");
                    }
                }
            }
            _ => {
                if let Err(e) = self
                    .store
                    .release_idempotency_record(fingerprint, claim.claim_id)
                    .await
                {
                    tracing::warn!(error = %e, fingerprint = %fingerprint, "Failed to release idempotency claim");
                }
            }
        }

        // Disarmed only once the store has answered
        claim.disarm();
    }
}
