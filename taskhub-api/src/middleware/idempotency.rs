/// Idempotency-key middleware for POST endpoints
///
/// Wraps every authenticated route. Requests that are not POST, or that carry
/// no `Idempotency-Key` header, pass straight through. For the rest:
///
/// 1. The key is trimmed (400 `INVALID_IDEMPOTENCY_KEY` when blank or not
///    UTF-8).
/// 2. The caller must be authenticated (401 `UNAUTHORIZED`).
/// 3. The shared [`IdempotencyCoordinator`] decides: replay a stored 201 body
///    with status 200, run the handler under a claim, or give up with 409
///    `IDEMPOTENCY_KEY_IN_USE` when another request holds the key too long.
/// 4. The handler's response is captured as a value, handed to the
///    coordinator (only a 201 JSON body is stored), and forwarded unchanged.
///
/// The scoping path is the full original URI path, so
/// `/api/v1/projects/A/tasks` and `/api/v1/projects/B/tasks` never share a
/// record.
///
/// [`IdempotencyCoordinator`]: taskhub_shared::idempotency::IdempotencyCoordinator

use axum::{
    body::{to_bytes, Body},
    extract::{OriginalUri, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use taskhub_shared::{
    auth::middleware::AuthContext,
    idempotency::{Claim, Decision, IdempotencyCoordinator, IdempotencyKey, RequestContext, IDEMPOTENCY_KEY_HEADER},
};

use crate::app::AppState;
use crate::error::ApiError;

/// Axum middleware applying the idempotency coordinator
pub async fn idempotency_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() != Method::POST {
        return Ok(next.run(request).await);
    }

    let Some(raw_key) = request.headers().get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(next.run(request).await);
    };

    let key = IdempotencyKey::from_header(raw_key.as_bytes())
        .map_err(|e| ApiError::bad_request("INVALID_IDEMPOTENCY_KEY", e.to_string()))?;

    let auth = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("UNAUTHORIZED", "Authentication required"))?;

    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let ctx = RequestContext::new(auth.principal, request.method().as_str(), path);

    match state.idempotency.begin(&ctx, &key).await {
        Decision::Replay(stored) => Ok((StatusCode::OK, Json(stored.body)).into_response()),
        Decision::InUse => Err(ApiError::conflict(
            "IDEMPOTENCY_KEY_IN_USE",
            "A request with this idempotency key is already in progress",
        )),
        Decision::Proceed(None) => Ok(next.run(request).await),
        Decision::Proceed(Some(claim)) => {
            let response = next.run(request).await;
            Ok(record_response(&state.idempotency, claim, response).await)
        }
    }
}

/// Hands the handler's `{status, body}` to the coordinator and rebuilds the
/// response for the client
async fn record_response(coordinator: &IdempotencyCoordinator, claim: Claim, response: Response) -> Response {
    let status = response.status();

    if status != StatusCode::CREATED {
        coordinator.finish(claim, status.as_u16(), None).await;
        return response;
    }

    // Handler bodies are already in memory; capture them whole so a large
    // 201 is stored like any other
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            coordinator.finish(claim, status.as_u16(), None).await;
            return ApiError::InternalError(format!("Failed to read response body: {}", e)).into_response();
        }
    };

    let json = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
    coordinator.finish(claim, status.as_u16(), json).await;

    Response::from_parts(parts, Body::from(bytes))
}
