use axum::{
  extract::{rejection::JsonRejection, Path, RawQuery, State},
  http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, post},
  Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::handlers::{get_project, method_not_allowed, submit_feedback, update_project};
use crate::cache::{CacheWorker, FetchRequest, FetchResponse, WorkerMessage, WorkerStatus};
use crate::db::DatabaseBackend;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
  pub backend: Arc<dyn DatabaseBackend>,
  pub worker: Arc<CacheWorker>,
  pub contact_link: String,
}

impl AppState {
  pub fn new(
    backend: Arc<dyn DatabaseBackend>,
    worker: Arc<CacheWorker>,
    contact_link: impl Into<String>,
  ) -> Self {
    Self {
      backend,
      worker,
      contact_link: contact_link.into(),
    }
  }
}

/// Site router. The functions are served both at the root and under
/// `/.netlify/functions` so existing front-end URLs keep working.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
  let functions = Router::new()
    .route(
      "/get-project",
      get(get_project).fallback(method_not_allowed),
    )
    .route(
      "/submit-feedback",
      post(submit_feedback).fallback(method_not_allowed),
    )
    .route(
      "/update-project",
      post(update_project).fallback(method_not_allowed),
    );

  Router::new()
    .route("/health", get(health_check))
    .route("/ready", get(readiness_check))
    .route("/360views", get(view_root))
    .route("/360views/", get(view_root))
    .route("/360views/{*path}", get(view_resource))
    .route("/cache/message", post(cache_message))
    .route("/cache/keys", get(cache_keys))
    .route("/cache/status", get(cache_status))
    .merge(functions.clone())
    .nest("/.netlify/functions", functions)
    .layer(cors_layer(cors_origins))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  if origins.is_empty() || origins.iter().any(|o| o == "*") {
    return CorsLayer::new()
      .allow_origin(Any)
      .allow_methods(Any)
      .allow_headers(Any);
  }
  let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
  CorsLayer::new()
    .allow_origin(origins)
    .allow_methods(Any)
    .allow_headers(Any)
}

async fn health_check() -> StatusCode {
  StatusCode::OK
}

/// Readiness probe - 200 if the store answers
async fn readiness_check(State(state): State<AppState>) -> StatusCode {
  match state.backend.ping().await {
    Ok(()) => StatusCode::OK,
    Err(e) => {
      tracing::warn!("Readiness check failed: {:#}", e);
      StatusCode::SERVICE_UNAVAILABLE
    }
  }
}

async fn view_root(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
  proxy_view(&state, "", query.as_deref()).await
}

async fn view_resource(
  State(state): State<AppState>,
  Path(path): Path<String>,
  RawQuery(query): RawQuery,
) -> Response {
  proxy_view(&state, &path, query.as_deref()).await
}

async fn proxy_view(state: &AppState, path: &str, query: Option<&str>) -> Response {
  let url = state.worker.config().upstream_url(path, query);
  let response = state.worker.fetch(FetchRequest::get(url)).await;
  into_http_response(response)
}

async fn cache_message(
  State(state): State<AppState>,
  payload: Result<Json<WorkerMessage>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(message) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  tracing::info!("Cache worker message: {:?}", message);
  state
    .worker
    .message(message)
    .await
    .map_err(|e| ApiError::Upstream(e.to_string()))?;
  Ok(Json(serde_json::json!({ "ok": true })))
}

async fn cache_keys(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<String>>> {
  Json(state.worker.cache_listing())
}

async fn cache_status(State(state): State<AppState>) -> Json<WorkerStatus> {
  Json(state.worker.status())
}

/// Headers that describe the upstream connection rather than the payload
const HOP_BY_HOP: &[&str] = &[
  "connection",
  "keep-alive",
  "transfer-encoding",
  "content-length",
  "upgrade",
];

pub fn into_http_response(response: FetchResponse) -> Response {
  let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
  let mut headers = HeaderMap::new();
  for (name, value) in &response.headers {
    if HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h)) {
      continue;
    }
    if let (Ok(name), Ok(value)) = (
      HeaderName::from_bytes(name.as_bytes()),
      HeaderValue::from_str(value),
    ) {
      headers.append(name, value);
    }
  }
  (status, headers, response.body).into_response()
}
