//! HTTP tests for the site functions and the cache routes, over in-memory SQLite

mod common;

use axum::{
  body::{to_bytes, Body},
  http::{header, Method, Request, StatusCode},
  Router,
};
use common::{view_url, worker_config, MockFetcher, SEED_URL};
use serde_json::{json, Value};
use std::sync::Arc;
use studio_portal::cache::CacheWorker;
use studio_portal::db::{DatabaseBackend, SqliteBackend};
use studio_portal::server::{build_router, AppState};
use studio_portal::types::DEFAULT_CONTACT_LINK;
use tower::ServiceExt;

struct TestApp {
  router: Router,
  backend: Arc<dyn DatabaseBackend>,
  fetcher: Arc<MockFetcher>,
  worker: Arc<CacheWorker>,
}

async fn setup() -> TestApp {
  let backend: Arc<dyn DatabaseBackend> = Arc::new(SqliteBackend::in_memory().await.unwrap());
  backend.init_schema().await.unwrap();

  let fetcher = MockFetcher::new();
  let worker = Arc::new(CacheWorker::new(
    worker_config("360-view-cache-v3"),
    fetcher.clone(),
  ));

  let state = AppState::new(backend.clone(), worker.clone(), DEFAULT_CONTACT_LINK);
  let router = build_router(state, &["*".to_string()]);
  TestApp {
    router,
    backend,
    fetcher,
    worker,
  }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
  let response = router.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  (status, body.to_vec())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
  let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
  send(router, request).await
}

async fn post_raw(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
  let request = Request::builder()
    .method(Method::POST)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  let (status, bytes) = send(router, request).await;
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
  post_raw(router, uri, &body.to_string()).await
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
  let (status, bytes) = get(router, uri).await;
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

// =============================================================================
// get-project
// =============================================================================

#[tokio::test]
async fn test_get_project_requires_id() {
  let app = setup().await;

  let (status, body) = get_json(&app.router, "/get-project").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body, json!({ "error": "Project ID is required" }));

  let (status, _) = get_json(&app.router, "/get-project?id=").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_project_bad_query_is_json_error() {
  let app = setup().await;
  let (status, body) = get_json(&app.router, "/get-project?id=a&id=b").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].is_string(), "body: {}", body);
}

#[tokio::test]
async fn test_get_project_not_found() {
  let app = setup().await;
  let (status, body) = get_json(&app.router, "/get-project?id=NOPE").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": "Project not found" }));
}

#[tokio::test]
async fn test_update_then_get_round_trip() {
  let app = setup().await;

  let (status, body) = post_json(
    &app.router,
    "/update-project",
    json!({
      "id": "AMAN-001",
      "client": "Mr. Khan",
      "project": "Villa Interior",
      "cost": 1500000,
      "start": "2024-01-10",
      "status": "In Progress",
      "phase": "Design",
      "updated": "2024-02-01",
      "deadline": "2024-06-30",
      "milestone": "3D renders",
      "pending": "500000",
      "downloadLink": "https://drive.example/x"
    }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "message": "Project saved successfully" }));

  let (status, view) = get_json(&app.router, "/get-project?id=AMAN-001").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    view,
    json!({
      "id": "AMAN-001",
      "client": "Mr. Khan",
      "project": "Villa Interior",
      "cost": "1500000",
      "startDate": "2024-01-10",
      "status": "In Progress",
      "phase": "Design",
      "lastUpdated": "2024-02-01",
      "deadline": "2024-06-30",
      "nextMilestone": "3D renders",
      "pendingAmount": "500000",
      "downloadLink": "https://drive.example/x",
      "whatsappLink": DEFAULT_CONTACT_LINK
    })
  );
}

#[tokio::test]
async fn test_update_last_write_wins() {
  let app = setup().await;

  post_json(
    &app.router,
    "/update-project",
    json!({ "id": "P1", "client": "First", "status": "Planning" }),
  )
  .await;
  let (status, _) = post_json(
    &app.router,
    "/update-project",
    json!({ "id": "P1", "status": "Done" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (_, view) = get_json(&app.router, "/get-project?id=P1").await;
  assert_eq!(view["status"], "Done");
  assert_eq!(view["client"], Value::Null, "omitted field is cleared");
}

#[tokio::test]
async fn test_update_project_validation() {
  let app = setup().await;

  let (status, body) = post_json(&app.router, "/update-project", json!({ "client": "x" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body, json!({ "error": "Project ID is required" }));

  let (status, _) = post_json(&app.router, "/update-project", json!([1, 2])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = post_json(
    &app.router,
    "/update-project",
    json!({ "id": "P1", "client": { "nested": true } }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = post_raw(&app.router, "/update-project", "{not json").await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({ "error": "Failed to save project" }));
}

// =============================================================================
// submit-feedback
// =============================================================================

#[tokio::test]
async fn test_submit_feedback_defaults_to_anonymous() {
  let app = setup().await;

  let (status, body) = post_json(
    &app.router,
    "/submit-feedback",
    json!({ "rating": 5, "message": "Great!" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["message"], "Feedback submitted successfully");
  assert!(body["id"].as_i64().unwrap() > 0);

  let rows = app.backend.list_feedback().await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].project_id, "Anonymous");
  assert_eq!(rows[0].client_name, "Anonymous");
  assert_eq!(rows[0].rating, 5);
  assert_eq!(rows[0].message, "Great!");
}

#[tokio::test]
async fn test_submit_feedback_ids_increase() {
  let app = setup().await;
  let payload = json!({ "project": "P1", "client": "Ali", "rating": "4", "message": "ok" });

  let (_, first) = post_json(&app.router, "/submit-feedback", payload.clone()).await;
  let (_, second) = post_json(&app.router, "/submit-feedback", payload).await;
  assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());

  let rows = app.backend.list_feedback().await.unwrap();
  assert_eq!(rows[0].project_id, "P1");
  assert_eq!(rows[0].rating, 4);
}

#[tokio::test]
async fn test_submit_feedback_missing_fields() {
  let app = setup().await;

  for payload in [
    json!({ "message": "no rating" }),
    json!({ "rating": 0, "message": "zero" }),
    json!({ "rating": 5 }),
    json!({ "rating": 5, "message": "" }),
    json!({ "rating": 5, "message": 0 }),
    json!({ "rating": 5, "message": false }),
  ] {
    let (status, body) = post_json(&app.router, "/submit-feedback", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing required fields" }));
  }

  let (status, _) = post_json(
    &app.router,
    "/submit-feedback",
    json!({ "rating": "five", "message": "x" }),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  assert!(app.backend.list_feedback().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_feedback_malformed_body() {
  let app = setup().await;
  let (status, body) = post_raw(&app.router, "/submit-feedback", "rating=5").await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({ "error": "Failed to submit feedback" }));
}

// =============================================================================
// Routing and store failures
// =============================================================================

#[tokio::test]
async fn test_wrong_method_is_405() {
  let app = setup().await;

  let (status, body) = get(&app.router, "/submit-feedback").await;
  assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
  assert_eq!(body, b"Method Not Allowed");

  let (status, _) = get(&app.router, "/update-project").await;
  assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

  let (status, _) = post_json(&app.router, "/get-project", json!({})).await;
  assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_netlify_prefix() {
  let app = setup().await;
  post_json(
    &app.router,
    "/.netlify/functions/update-project",
    json!({ "id": "N1", "client": "Netlify" }),
  )
  .await;
  let (status, view) = get_json(&app.router, "/.netlify/functions/get-project?id=N1").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(view["client"], "Netlify");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
  let app = setup().await;
  let request = Request::builder()
    .uri("/get-project?id=x")
    .header(header::ORIGIN, "https://amandesignpartner.github.io")
    .body(Body::empty())
    .unwrap();
  let response = app.router.clone().oneshot(request).await.unwrap();
  assert_eq!(
    response
      .headers()
      .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
      .unwrap(),
    "*"
  );
}

#[tokio::test]
async fn test_store_failure_is_generic_500() {
  let app = setup().await;
  app.backend.drop_schema().await.unwrap();

  let (status, body) = get_json(&app.router, "/get-project?id=P1").await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({ "error": "Database connection failed" }));

  let (status, body) = post_json(
    &app.router,
    "/submit-feedback",
    json!({ "rating": 5, "message": "x" }),
  )
  .await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({ "error": "Failed to submit feedback" }));

  let (status, body) = post_json(&app.router, "/update-project", json!({ "id": "P1" })).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body, json!({ "error": "Failed to save project" }));
}

#[tokio::test]
async fn test_health_and_ready() {
  let app = setup().await;
  assert_eq!(get(&app.router, "/health").await.0, StatusCode::OK);
  assert_eq!(get(&app.router, "/ready").await.0, StatusCode::OK);
}

// =============================================================================
// 360-view proxy and cache routes
// =============================================================================

#[tokio::test]
async fn test_view_proxy_caches_and_lists() {
  let app = setup().await;
  app.fetcher.respond(SEED_URL, 200, "seed");
  app.fetcher.respond(&view_url("tour/pano.jpg"), 200, "pano");
  app.worker.install().await;
  app.worker.activate().await.unwrap();

  let (status, body) = get(&app.router, "/360views/tour/pano.jpg").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, b"pano");

  let (status, listing) = get_json(&app.router, "/cache/keys").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    listing,
    json!({ "360-view-cache-v3": [SEED_URL, view_url("tour/pano.jpg")] })
  );

  app.fetcher.set_offline(true);
  let (status, body) = get(&app.router, "/360views/tour/pano.jpg").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, b"pano");

  let (status, body) = get(&app.router, "/360views/unknown.jpg").await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body, b"Offline - resource not cached");
  app.worker.settle().await;
}

#[tokio::test]
async fn test_cache_message_route() {
  let app = setup().await;
  app.fetcher.respond(SEED_URL, 200, "seed");
  app.worker.install().await;
  app.worker.activate().await.unwrap();

  let (status, body) = post_json(
    &app.router,
    "/cache/message",
    json!({ "action": "clearCache" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "ok": true }));
  assert!(app.worker.cache_listing().is_empty());

  let (status, _) = post_json(&app.router, "/cache/message", json!({ "action": "cacheAll" })).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(app.worker.cache_listing()["360-view-cache-v3"].len(), 1);

  let (status, _) = post_json(&app.router, "/cache/message", json!({ "action": "explode" })).await;
  assert!(status.is_client_error());

  app.fetcher.set_offline(true);
  let (status, _) = post_json(&app.router, "/cache/message", json!({ "action": "cacheAll" })).await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
}
