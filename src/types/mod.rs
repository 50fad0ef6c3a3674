mod feedback;
mod project;

pub use feedback::{Feedback, FeedbackSubmission, NewFeedback, ANONYMOUS};
pub use project::{Project, ProjectUpdate, ProjectView, DEFAULT_CONTACT_LINK};

/// Client input that fails validation (maps to a 4xx response)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  #[error("Project ID is required")]
  MissingProjectId,
  #[error("Missing required fields")]
  MissingFields,
  #[error("Rating must be an integer")]
  InvalidRating,
  #[error("Invalid request body: {0}")]
  InvalidBody(String),
}

/// Deserialize a loosely-typed scalar into text.
///
/// Strings pass through, numbers and booleans keep their JSON spelling,
/// null/absent become `None`. Objects and arrays are rejected.
pub(crate) fn lenient_text<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  use serde::de::Error;
  use serde::Deserialize;
  use serde_json::Value;

  match Option::<Value>::deserialize(de)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
    Some(_) => Err(D::Error::custom(
      "expected a string, number or boolean",
    )),
  }
}

/// Treat empty strings like missing values
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
  value.filter(|s| !s.is_empty())
}
