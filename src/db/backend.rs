use async_trait::async_trait;

use crate::types::{Feedback, NewFeedback, Project};

/// SQL dialect of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
  Postgres,
  Sqlite,
}

impl std::fmt::Display for SqlDialect {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SqlDialect::Postgres => write!(f, "postgres"),
      SqlDialect::Sqlite => write!(f, "sqlite"),
    }
  }
}

/// Abstract store holding the `projects` and `feedback` tables.
///
/// Every call checks a connection out for the duration of one statement;
/// the connection goes back to the backend when the call returns, whether
/// it succeeded or not.
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
  fn dialect(&self) -> SqlDialect;

  async fn init_schema(&self) -> Result<(), anyhow::Error>;
  async fn drop_schema(&self) -> Result<(), anyhow::Error>;

  /// Cheap round trip used by the readiness probe
  async fn ping(&self) -> Result<(), anyhow::Error>;

  async fn get_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error>;

  /// Insert the row or overwrite every column of the existing one, atomically
  async fn upsert_project(&self, project: &Project) -> Result<(), anyhow::Error>;

  /// Append a feedback row and return its store-assigned id
  async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<i64, anyhow::Error>;

  /// All feedback rows in insertion order. Not exposed over HTTP.
  async fn list_feedback(&self) -> Result<Vec<Feedback>, anyhow::Error>;
}
