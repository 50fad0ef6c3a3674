use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient_text, non_empty, ValidationError};

/// Placeholder written when a submission omits project or client
pub const ANONYMOUS: &str = "Anonymous";

/// Body of `POST /submit-feedback`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackSubmission {
  #[serde(default, deserialize_with = "lenient_text")]
  pub project: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub client: Option<String>,
  #[serde(default)]
  pub rating: Option<Value>,
  #[serde(default)]
  pub message: Option<Value>,
}

impl FeedbackSubmission {
  /// Check required fields and fill the optional ones with the placeholder
  pub fn validate(self) -> Result<NewFeedback, ValidationError> {
    let rating = parse_rating(self.rating.as_ref())?;
    let message = parse_message(self.message.as_ref())?;
    Ok(NewFeedback {
      project_id: non_empty(self.project).unwrap_or_else(|| ANONYMOUS.to_string()),
      client_name: non_empty(self.client).unwrap_or_else(|| ANONYMOUS.to_string()),
      rating,
      message,
    })
  }
}

/// Absent, null, `0`, `false` and `""` all count as a missing rating.
fn parse_rating(value: Option<&Value>) -> Result<i32, ValidationError> {
  match value {
    None | Some(Value::Null) | Some(Value::Bool(false)) => Err(ValidationError::MissingFields),
    Some(Value::Number(n)) => {
      let rating = n.as_i64().ok_or(ValidationError::InvalidRating)?;
      if rating == 0 {
        return Err(ValidationError::MissingFields);
      }
      i32::try_from(rating).map_err(|_| ValidationError::InvalidRating)
    }
    Some(Value::String(s)) if s.is_empty() => Err(ValidationError::MissingFields),
    Some(Value::String(s)) => s
      .trim()
      .parse::<i32>()
      .map_err(|_| ValidationError::InvalidRating),
    Some(_) => Err(ValidationError::InvalidRating),
  }
}

/// Same falsy rule as the rating: absent, null, `0`, `false` and `""` are missing.
fn parse_message(value: Option<&Value>) -> Result<String, ValidationError> {
  match value {
    None | Some(Value::Null) | Some(Value::Bool(false)) => Err(ValidationError::MissingFields),
    Some(Value::String(s)) if s.is_empty() => Err(ValidationError::MissingFields),
    Some(Value::String(s)) => Ok(s.clone()),
    Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Err(ValidationError::MissingFields),
    Some(v @ (Value::Number(_) | Value::Bool(true))) => Ok(v.to_string()),
    Some(_) => Err(ValidationError::InvalidBody(
      "message must be a string".into(),
    )),
  }
}

/// A validated feedback row ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeedback {
  pub project_id: String,
  pub client_name: String,
  pub rating: i32,
  pub message: String,
}

/// A stored feedback row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
  pub id: i64,
  pub project_id: String,
  pub client_name: String,
  pub rating: i32,
  pub message: String,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn submission(value: Value) -> FeedbackSubmission {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_defaults_to_anonymous() {
    let feedback = submission(json!({"rating": 5, "message": "Great!"}))
      .validate()
      .unwrap();
    assert_eq!(feedback.project_id, ANONYMOUS);
    assert_eq!(feedback.client_name, ANONYMOUS);
    assert_eq!(feedback.rating, 5);
    assert_eq!(feedback.message, "Great!");
  }

  #[test]
  fn test_empty_project_and_client_default() {
    let feedback = submission(json!({
      "project": "",
      "client": "",
      "rating": 4,
      "message": "Nice renders"
    }))
    .validate()
    .unwrap();
    assert_eq!(feedback.project_id, ANONYMOUS);
    assert_eq!(feedback.client_name, ANONYMOUS);
  }

  #[test]
  fn test_missing_rating_or_message() {
    let cases = [
      json!({"message": "hi"}),
      json!({"rating": null, "message": "hi"}),
      json!({"rating": 0, "message": "hi"}),
      json!({"rating": "", "message": "hi"}),
      json!({"rating": 5}),
      json!({"rating": 5, "message": ""}),
      json!({"rating": 5, "message": null}),
      json!({"rating": 5, "message": 0}),
      json!({"rating": 5, "message": 0.0}),
      json!({"rating": 5, "message": false}),
      json!({}),
    ];
    for case in cases {
      assert_eq!(
        submission(case.clone()).validate(),
        Err(ValidationError::MissingFields),
        "case: {}",
        case
      );
    }
  }

  #[test]
  fn test_rating_forms() {
    let from_string = submission(json!({"rating": " 4 ", "message": "ok"}))
      .validate()
      .unwrap();
    assert_eq!(from_string.rating, 4);

    assert_eq!(
      submission(json!({"rating": 4.5, "message": "ok"})).validate(),
      Err(ValidationError::InvalidRating)
    );
    assert_eq!(
      submission(json!({"rating": "five", "message": "ok"})).validate(),
      Err(ValidationError::InvalidRating)
    );
    assert_eq!(
      submission(json!({"rating": [5], "message": "ok"})).validate(),
      Err(ValidationError::InvalidRating)
    );
  }

  #[test]
  fn test_message_forms() {
    let numeric = submission(json!({"rating": 5, "message": 10}))
      .validate()
      .unwrap();
    assert_eq!(numeric.message, "10");

    assert!(matches!(
      submission(json!({"rating": 5, "message": {"text": "hi"}})).validate(),
      Err(ValidationError::InvalidBody(_))
    ));
  }
}
