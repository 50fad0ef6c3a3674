use serde::{Deserialize, Serialize};

use super::{lenient_text, non_empty, ValidationError};

/// Contact link attached to every project lookup
pub const DEFAULT_CONTACT_LINK: &str = "https://wa.me/923010003011";

/// A row of the `projects` table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
  pub project_id: String,
  pub client_name: Option<String>,
  pub project_name: Option<String>,
  pub total_cost: Option<String>,
  pub start_date: Option<String>,
  pub status: Option<String>,
  pub current_phase: Option<String>,
  pub last_updated: Option<String>,
  pub deadline: Option<String>,
  pub next_milestone: Option<String>,
  pub pending_amount: Option<String>,
  pub download_link: Option<String>,
}

/// Body of `POST /update-project`.
///
/// Every field is written as passed; an absent field overwrites the stored
/// value with NULL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
  #[serde(default, deserialize_with = "lenient_text")]
  pub id: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub client: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub project: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub cost: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub start: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub status: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub phase: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub updated: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub deadline: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub milestone: Option<String>,
  #[serde(default, deserialize_with = "lenient_text")]
  pub pending: Option<String>,
  #[serde(default, rename = "downloadLink", deserialize_with = "lenient_text")]
  pub download_link: Option<String>,
}

impl ProjectUpdate {
  /// Convert into a full row, requiring a non-empty id
  pub fn into_project(self) -> Result<Project, ValidationError> {
    let project_id = non_empty(self.id).ok_or(ValidationError::MissingProjectId)?;
    Ok(Project {
      project_id,
      client_name: self.client,
      project_name: self.project,
      total_cost: self.cost,
      start_date: self.start,
      status: self.status,
      current_phase: self.phase,
      last_updated: self.updated,
      deadline: self.deadline,
      next_milestone: self.milestone,
      pending_amount: self.pending,
      download_link: self.download_link,
    })
  }
}

/// External camelCase shape returned by `GET /get-project`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
  pub id: String,
  pub client: Option<String>,
  pub project: Option<String>,
  pub cost: Option<String>,
  pub start_date: Option<String>,
  pub status: Option<String>,
  pub phase: Option<String>,
  pub last_updated: Option<String>,
  pub deadline: Option<String>,
  pub next_milestone: Option<String>,
  pub pending_amount: Option<String>,
  pub download_link: Option<String>,
  pub whatsapp_link: String,
}

impl ProjectView {
  pub fn new(project: Project, contact_link: impl Into<String>) -> Self {
    Self {
      id: project.project_id,
      client: project.client_name,
      project: project.project_name,
      cost: project.total_cost,
      start_date: project.start_date,
      status: project.status,
      phase: project.current_phase,
      last_updated: project.last_updated,
      deadline: project.deadline,
      next_milestone: project.next_milestone,
      pending_amount: project.pending_amount,
      download_link: project.download_link,
      whatsapp_link: contact_link.into(),
    }
  }
}
