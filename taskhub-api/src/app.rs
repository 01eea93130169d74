/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskhub_api::{app::AppState, config::Config};
/// use taskhub_shared::store::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = taskhub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::{ApiError, ApiResult},
    middleware::{
        api_version::{api_version_layer, ACCEPT_VERSION_HEADER},
        idempotency::idempotency_layer,
        project_owner::require_project_owner,
    },
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use taskhub_shared::{
    auth::{middleware::authenticate, password::HashCost},
    idempotency::{IdempotencyCoordinator, IDEMPOTENCY_KEY_HEADER},
    store::Store,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Header carrying the per-request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend
    pub store: Arc<dyn Store>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Idempotency-key coordinator, sharing `store`
    pub idempotency: IdempotencyCoordinator,
}

impl AppState {
    /// Creates new application state
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let idempotency = IdempotencyCoordinator::new(store.clone(), config.idempotency.coordinator_config());
        Self {
            store,
            config: Arc::new(config),
            idempotency,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Argon2 cost for new password hashes
    pub fn hash_cost(&self) -> HashCost {
        self.config.password.hash_cost()
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                              # Health check (public)
/// └── /api/v1/
///     ├── POST /auth/register              # public
///     ├── POST /auth/login                 # public
///     ├── GET  /auth/me
///     ├── GET  /users, /users/:id
///     ├── /projects
///     │   ├── POST, GET
///     │   ├── GET /:id
///     │   ├── PUT, DELETE /:id             # owner guard
///     │   ├── POST /:id/members            # owner guard
///     │   ├── DELETE /:id/members/:userId  # owner guard
///     │   └── POST, GET /:id/tasks
///     ├── GET, PUT, DELETE /tasks/:id
///     ├── POST, GET /tasks/:id/comments
///     └── GET, DELETE /comments/:id
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. Request id (set from `x-request-id` or generated)
/// 2. CORS
/// 3. Request id propagation to the response
/// 4. Logging (tower-http TraceLayer)
/// 5. Accept-Version negotiation (`/api/v1` only)
/// 6. Authentication (protected routes)
/// 7. Idempotency coordinator (protected routes)
/// 8. Project-owner guard (owner-only routes)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, comments, health, projects, tasks, users};

    let owner_guard = || from_fn_with_state(state.clone(), require_project_owner);

    // Auth routes (public, no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/projects", post(projects::create_project).get(projects::list_projects))
        .route(
            "/projects/:id",
            get(projects::get_project).merge(
                put(projects::update_project)
                    .delete(projects::delete_project)
                    .route_layer(owner_guard()),
            ),
        )
        .route(
            "/projects/:id/members",
            post(projects::add_member).route_layer(owner_guard()),
        )
        .route(
            "/projects/:id/members/:userId",
            delete(projects::remove_member).route_layer(owner_guard()),
        )
        .route(
            "/projects/:id/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route(
            "/tasks/:id",
            get(tasks::get_task).put(tasks::update_task).delete(tasks::delete_task),
        )
        .route(
            "/tasks/:id/comments",
            post(comments::create_comment).get(comments::list_comments),
        )
        .route(
            "/comments/:id",
            get(comments::get_comment).delete(comments::delete_comment),
        )
        .layer(from_fn_with_state(state.clone(), idempotency_layer))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(from_fn(api_version_layer));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
                HeaderName::from_static(ACCEPT_VERSION_HEADER),
                HeaderName::from_static(REQUEST_ID_HEADER),
            ])
            .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", v1_routes)
        .fallback(route_not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(cors)
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, then injects AuthContext into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;

    tracing::debug!(user_id = %auth_context.user_id(), "Authenticated request");

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

async fn route_not_found() -> ApiResult<()> {
    Err(ApiError::not_found("NOT_FOUND", "Route not found"))
}
