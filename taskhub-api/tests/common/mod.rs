//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An application wired to a fresh in-memory store
//! - Test user creation with signed tokens
//! - Request helpers driving the router with `oneshot`

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use taskhub_api::app::{build_router, AppState};
use taskhub_api::config::{
    ApiConfig, Config, DatabaseConfig, IdempotencySettings, JwtConfig, LogFormat, LoggingConfig, PasswordConfig,
    StorageBackend,
};
use taskhub_shared::auth::jwt::{create_token, Claims};
use taskhub_shared::models::user::{GlobalRole, NewUser, User};
use taskhub_shared::store::{MemoryStore, Store};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

pub fn test_config(idempotency: IdempotencySettings) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
        },
        database: DatabaseConfig {
            backend: StorageBackend::Memory,
            url: String::new(),
            max_connections: 1,
            run_migrations: false,
        },
        jwt: JwtConfig {
            secret: JWT_SECRET.to_string(),
            expires_in_hours: 1,
        },
        idempotency,
        // Cheap hashing keeps register/login tests fast
        password: PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        logging: LoggingConfig {
            format: LogFormat::Pretty,
        },
    }
}

/// A user known to the store, with a valid bearer token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Decoded response
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_idempotency(IdempotencySettings::default())
    }

    pub fn with_idempotency(idempotency: IdempotencySettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let config = test_config(idempotency);
        let app = build_router(AppState::new(store.clone(), config.clone()));

        Self { store, app, config }
    }

    /// Inserts a user directly and signs a token for it
    pub async fn create_user(&self, label: &str, role: GlobalRole) -> TestUser {
        let user = self
            .store
            .create_user(NewUser {
                email: format!("{}-{}@example.com", label, Uuid::new_v4()),
                name: label.to_string(),
                password_hash: "unused".to_string(),
                role,
            })
            .await
            .expect("Failed to create user");

        let claims = Claims::new(user.id, user.email.clone(), user.role);
        let token = create_token(&claims, JWT_SECRET).expect("Failed to sign token");

        TestUser { user, token }
    }

    pub async fn member(&self, label: &str) -> TestUser {
        self.create_user(label, GlobalRole::Member).await
    }

    /// Sends a request through the full router
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        idempotency_key: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        if let Some(key) = idempotency_key {
            builder = builder.header("idempotency-key", key);
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| panic!("Non-JSON body ({}): {}", status, String::from_utf8_lossy(&bytes)))
        };

        TestResponse { status, headers, body }
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send(Method::GET, uri, Some(&user.token), None, None).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(&user.token), Some(body), None).await
    }

    pub async fn post_idempotent(&self, uri: &str, user: &TestUser, key: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(&user.token), Some(body), Some(key)).await
    }

    pub async fn put(&self, uri: &str, user: &TestUser, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(&user.token), Some(body), None).await
    }

    pub async fn delete(&self, uri: &str, user: &TestUser) -> TestResponse {
        self.send(Method::DELETE, uri, Some(&user.token), None, None).await
    }

    /// Creates a project owned by `owner` and returns its id
    pub async fn create_project(&self, owner: &TestUser, name: &str) -> Uuid {
        let response = self
            .post("/api/v1/projects", owner, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        id_of(&response.body["project"])
    }

    pub async fn add_member(&self, owner: &TestUser, project_id: Uuid, member: &TestUser, role: &str) {
        let response = self
            .post(
                &format!("/api/v1/projects/{}/members", project_id),
                owner,
                serde_json::json!({ "userId": member.id(), "role": role }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    }

    pub async fn create_task(&self, user: &TestUser, project_id: Uuid, title: &str) -> Uuid {
        let response = self
            .post(
                &format!("/api/v1/projects/{}/tasks", project_id),
                user,
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        id_of(&response.body["task"])
    }

    pub async fn create_comment(&self, user: &TestUser, task_id: Uuid, content: &str) -> Uuid {
        let response = self
            .post(
                &format!("/api/v1/tasks/{}/comments", task_id),
                user,
                serde_json::json!({ "content": content }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        id_of(&response.body["comment"])
    }
}

pub fn id_of(value: &Value) -> Uuid {
    value["id"]
        .as_str()
        .and_then(|id| id.parse().ok())
        .unwrap_or_else(|| panic!("No id in {}", value))
}
