//! The three site functions: project lookup, feedback, project upsert

use axum::{
  body::Bytes,
  extract::{rejection::QueryRejection, Query, State},
  http::StatusCode,
  Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::routes::AppState;
use crate::types::{FeedbackSubmission, ProjectUpdate, ProjectView, ValidationError};

const LOOKUP_FAILED: &str = "Database connection failed";
const FEEDBACK_FAILED: &str = "Failed to submit feedback";
const SAVE_FAILED: &str = "Failed to save project";

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
  pub id: Option<String>,
}

/// `GET /get-project?id=<id>`
pub async fn get_project(
  State(state): State<AppState>,
  query: Result<Query<ProjectQuery>, QueryRejection>,
) -> Result<Json<ProjectView>, ApiError> {
  let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let id = query
    .id
    .filter(|id| !id.is_empty())
    .ok_or(ValidationError::MissingProjectId)?;

  let project = state
    .backend
    .get_project(&id)
    .await
    .map_err(|e| ApiError::internal(LOOKUP_FAILED, e))?
    .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;

  Ok(Json(ProjectView::new(project, state.contact_link.as_str())))
}

/// `POST /submit-feedback`
pub async fn submit_feedback(
  State(state): State<AppState>,
  body: Bytes,
) -> Result<Json<Value>, ApiError> {
  let submission: FeedbackSubmission = parse_body(&body, FEEDBACK_FAILED)?;
  let feedback = submission.validate()?;

  let id = state
    .backend
    .insert_feedback(&feedback)
    .await
    .map_err(|e| ApiError::internal(FEEDBACK_FAILED, e))?;
  tracing::info!("Feedback {} stored for project {}", id, feedback.project_id);

  Ok(Json(json!({
    "message": "Feedback submitted successfully",
    "id": id,
  })))
}

/// `POST /update-project`. Open to anyone; see DESIGN.md.
pub async fn update_project(
  State(state): State<AppState>,
  body: Bytes,
) -> Result<Json<Value>, ApiError> {
  let update: ProjectUpdate = parse_body(&body, SAVE_FAILED)?;
  let project = update.into_project()?;

  state
    .backend
    .upsert_project(&project)
    .await
    .map_err(|e| ApiError::internal(SAVE_FAILED, e))?;
  tracing::info!("Project {} saved", project.project_id);

  Ok(Json(json!({ "message": "Project saved successfully" })))
}

pub async fn method_not_allowed() -> (StatusCode, &'static str) {
  (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

/// Malformed JSON is a server error; well-formed JSON of the wrong shape is a client error.
fn parse_body<T: DeserializeOwned>(body: &[u8], failure: &'static str) -> Result<T, ApiError> {
  let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::internal(failure, e))?;
  if !value.is_object() {
    return Err(ValidationError::InvalidBody("expected a JSON object".into()).into());
  }
  serde_json::from_value(value).map_err(|e| ValidationError::InvalidBody(e.to_string()).into())
}
