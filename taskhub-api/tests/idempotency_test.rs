/// Idempotency-key behaviour through the full router
///
/// Covers replay, scoping by user and by path parameters, failures that must
/// not be cached, concurrent duplicates, and malformed keys.

mod common;

use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    middleware::from_fn_with_state,
    routing::post,
    Router,
};
use chrono::Utc;
use common::{id_of, test_config, TestContext};
use futures::future::join_all;
use serde_json::json;
use taskhub_api::{
    app::AppState,
    config::IdempotencySettings,
    middleware::idempotency::idempotency_layer,
};
use taskhub_shared::{
    auth::middleware::Principal,
    idempotency::{Fingerprint, IdempotencyKey, RequestContext},
    models::{
        idempotency::NewIdempotencyRecord,
        project::{ProjectFilter, ProjectScope, ProjectSort},
        user::GlobalRole,
        Page,
    },
    store::{MemoryStore, Store},
};
use tower::ServiceExt;
use uuid::Uuid;

async fn project_count(ctx: &TestContext) -> u64 {
    let (_, total) = ctx
        .store
        .list_projects(ProjectScope::All, &ProjectFilter::default(), ProjectSort::default(), Page::default())
        .await
        .unwrap();
    total
}

#[tokio::test]
async fn test_replay_returns_original_body_with_200() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;

    let first = ctx
        .post_idempotent("/api/v1/projects", &alice, "key-1", json!({ "name": "First" }))
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    // The retry body is ignored
    let second = ctx
        .post_idempotent("/api/v1/projects", &alice, "key-1", json!({ "name": "Second" }))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body, first.body);
    assert_eq!(id_of(&second.body["project"]), id_of(&first.body["project"]));
    assert_eq!(second.body["project"]["name"], "First");

    assert_eq!(project_count(&ctx).await, 1);
}

#[tokio::test]
async fn test_large_created_body_is_replayed() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;
    let description = "d".repeat(1_100_000);
    let body = json!({ "name": "Large", "description": description });

    let first = ctx
        .post_idempotent("/api/v1/projects", &alice, "large-body", body.clone())
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["project"]["description"].as_str().map(str::len), Some(1_100_000));

    let second = ctx
        .post_idempotent("/api/v1/projects", &alice, "large-body", body)
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(id_of(&second.body["project"]), id_of(&first.body["project"]));

    assert_eq!(project_count(&ctx).await, 1);
}

#[tokio::test]
async fn test_requests_without_key_are_not_deduplicated() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;

    ctx.create_project(&alice, "One").await;
    ctx.create_project(&alice, "One").await;

    assert_eq!(project_count(&ctx).await, 2);
}

#[tokio::test]
async fn test_keys_are_scoped_per_user() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;
    let bob = ctx.member("bob").await;

    let from_alice = ctx
        .post_idempotent("/api/v1/projects", &alice, "shared-key", json!({ "name": "A" }))
        .await;
    let from_bob = ctx
        .post_idempotent("/api/v1/projects", &bob, "shared-key", json!({ "name": "B" }))
        .await;

    assert_eq!(from_alice.status, StatusCode::CREATED);
    assert_eq!(from_bob.status, StatusCode::CREATED);
    assert_ne!(id_of(&from_alice.body["project"]), id_of(&from_bob.body["project"]));
    assert_eq!(from_bob.body["project"]["ownerId"], bob.id().to_string());
}

#[tokio::test]
async fn test_keys_are_scoped_per_path() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner").await;

    let first_project = ctx.create_project(&owner, "A").await;
    let second_project = ctx.create_project(&owner, "B").await;

    let in_first = ctx
        .post_idempotent(
            &format!("/api/v1/projects/{}/tasks", first_project),
            &owner,
            "task-key",
            json!({ "title": "T" }),
        )
        .await;
    let in_second = ctx
        .post_idempotent(
            &format!("/api/v1/projects/{}/tasks", second_project),
            &owner,
            "task-key",
            json!({ "title": "T" }),
        )
        .await;

    assert_eq!(in_first.status, StatusCode::CREATED);
    assert_eq!(in_second.status, StatusCode::CREATED);
    assert_eq!(in_first.body["task"]["projectId"], first_project.to_string());
    assert_eq!(in_second.body["task"]["projectId"], second_project.to_string());
}

#[tokio::test]
async fn test_validation_failure_is_not_cached() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner").await;
    let project = ctx.create_project(&owner, "P").await;
    let uri = format!("/api/v1/projects/{}/tasks", project);

    let rejected = ctx
        .post_idempotent(&uri, &owner, "retry-me", json!({ "title": "" }))
        .await;
    assert_eq!(rejected.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected.error_code(), "VALIDATION_ERROR");

    let fixed = ctx
        .post_idempotent(&uri, &owner, "retry-me", json!({ "title": "Fixed" }))
        .await;
    assert_eq!(fixed.status, StatusCode::CREATED);
    assert_eq!(fixed.body["task"]["title"], "Fixed");
}

#[tokio::test]
async fn test_forbidden_is_not_cached() {
    let ctx = TestContext::new();
    let owner = ctx.member("owner").await;
    let newcomer = ctx.member("newcomer").await;
    let project = ctx.create_project(&owner, "P").await;
    let uri = format!("/api/v1/projects/{}/tasks", project);

    let denied = ctx
        .post_idempotent(&uri, &newcomer, "after-invite", json!({ "title": "T" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    ctx.add_member(&owner, project, &newcomer, "developer").await;

    let allowed = ctx
        .post_idempotent(&uri, &newcomer, "after-invite", json!({ "title": "T" }))
        .await;
    assert_eq!(allowed.status, StatusCode::CREATED);
    assert_eq!(allowed.body["task"]["createdById"], newcomer.id().to_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_create_one_resource() {
    let ctx = Arc::new(TestContext::new());
    let alice = ctx.member("alice").await;

    let requests = (0..10).map(|i| {
        let ctx = ctx.clone();
        let alice = alice.clone();
        tokio::spawn(async move {
            ctx.post_idempotent(
                "/api/v1/projects",
                &alice,
                "burst",
                json!({ "name": format!("Burst {}", i) }),
            )
            .await
        })
    });

    let responses: Vec<_> = join_all(requests)
        .await
        .into_iter()
        .map(|joined| joined.expect("request task panicked"))
        .collect();

    let created = responses.iter().filter(|r| r.status == StatusCode::CREATED).count();
    let replayed = responses.iter().filter(|r| r.status == StatusCode::OK).count();
    assert_eq!(created, 1);
    assert_eq!(replayed, 9);

    let id = id_of(&responses[0].body["project"]);
    assert!(responses.iter().all(|r| id_of(&r.body["project"]) == id));

    assert_eq!(project_count(&ctx).await, 1);
}

#[tokio::test]
async fn test_pending_claim_times_out_with_conflict() {
    let ctx = TestContext::with_idempotency(IdempotencySettings {
        wait_timeout_ms: 50,
        poll_interval_ms: 5,
        ..IdempotencySettings::default()
    });
    let alice = ctx.member("alice").await;

    // Another request holds the key and never finishes
    let key = IdempotencyKey::parse("held").unwrap();
    let request = RequestContext::new(
        Principal::new(alice.id(), GlobalRole::Member),
        "POST",
        "/api/v1/projects",
    );
    ctx.store
        .create_idempotency_record(NewIdempotencyRecord {
            fingerprint: Fingerprint::new(&request, &key).as_str().to_string(),
            claim_id: Uuid::new_v4(),
            user_id: alice.id(),
            method: "POST".to_string(),
            path: "/api/v1/projects".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(5),
        })
        .await
        .unwrap();

    let response = ctx
        .post_idempotent("/api/v1/projects", &alice, "held", json!({ "name": "P" }))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error_code(), "IDEMPOTENCY_KEY_IN_USE");
    assert_eq!(project_count(&ctx).await, 0);
}

#[tokio::test]
async fn test_expired_claim_is_taken_over() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;

    let key = IdempotencyKey::parse("abandoned").unwrap();
    let request = RequestContext::new(
        Principal::new(alice.id(), GlobalRole::Member),
        "POST",
        "/api/v1/projects",
    );
    ctx.store
        .create_idempotency_record(NewIdempotencyRecord {
            fingerprint: Fingerprint::new(&request, &key).as_str().to_string(),
            claim_id: Uuid::new_v4(),
            user_id: alice.id(),
            method: "POST".to_string(),
            path: "/api/v1/projects".to_string(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        })
        .await
        .unwrap();

    let response = ctx
        .post_idempotent("/api/v1/projects", &alice, "abandoned", json!({ "name": "P" }))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_invalid_key_is_rejected() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;

    let response = ctx
        .post_idempotent("/api/v1/projects", &alice, "   ", json!({ "name": "P" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "INVALID_IDEMPOTENCY_KEY");

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/v1/projects")
        .header("authorization", format!("Bearer {}", alice.token))
        .header("content-type", "application/json")
        .header("idempotency-key", axum::http::HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap())
        .body(axum::body::Body::from(json!({ "name": "P" }).to_string()))
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(project_count(&ctx).await, 0);
}

#[tokio::test]
async fn test_any_non_blank_key_is_accepted() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;

    let long_key = "k".repeat(300);
    for key in ["cl\u{e9}-1", "tab\tinside", long_key.as_str()] {
        let first = ctx
            .post_idempotent("/api/v1/projects", &alice, key, json!({ "name": "P" }))
            .await;
        assert_eq!(first.status, StatusCode::CREATED, "key {:?}", key);

        let replay = ctx
            .post_idempotent("/api/v1/projects", &alice, key, json!({ "name": "P" }))
            .await;
        assert_eq!(replay.status, StatusCode::OK, "key {:?}", key);
        assert_eq!(id_of(&replay.body["project"]), id_of(&first.body["project"]));
    }

    assert_eq!(project_count(&ctx).await, 3);
}

#[tokio::test]
async fn test_key_is_ignored_on_non_post() {
    let ctx = TestContext::new();
    let alice = ctx.member("alice").await;
    let project = ctx.create_project(&alice, "P").await;

    for _ in 0..2 {
        let response = ctx
            .send(
                Method::PUT,
                &format!("/api/v1/projects/{}", project),
                Some(&alice.token),
                Some(json!({ "name": "Renamed" })),
                Some("put-key"),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    // Blank keys aren't even inspected outside POST
    let response = ctx
        .send(Method::GET, "/api/v1/projects", Some(&alice.token), None, Some("   "))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_key_without_authentication_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, test_config(IdempotencySettings::default()));

    // Mounted without the JWT layer, so no caller identity reaches it
    let app = Router::new()
        .route("/things", post(|| async { StatusCode::CREATED }))
        .layer(from_fn_with_state(state.clone(), idempotency_layer))
        .with_state(state);

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/things")
        .header("idempotency-key", "k")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/things")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}
