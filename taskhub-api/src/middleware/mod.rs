/// Middleware modules for the API server
///
/// - `api_version`: Accept-Version negotiation for `/api/v1`
/// - `idempotency`: Idempotency-Key deduplication for POST requests
/// - `project_owner`: Owner-only guard for project mutation routes

pub mod api_version;
pub mod idempotency;
pub mod project_owner;
