use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, types::Type, OptionalExtension};
use tokio_rusqlite::Connection;

use super::backend::{DatabaseBackend, SqlDialect};
use crate::types::{Feedback, NewFeedback, Project};

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    project_id TEXT PRIMARY KEY,
    client_name TEXT,
    project_name TEXT,
    total_cost TEXT,
    start_date TEXT,
    status TEXT,
    current_phase TEXT,
    last_updated TEXT,
    deadline TEXT,
    next_milestone TEXT,
    pending_amount TEXT,
    download_link TEXT
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    client_name TEXT NOT NULL,
    rating INTEGER NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feedback_project ON feedback(project_id);
"#;

const UPSERT_PROJECT: &str = r#"
INSERT INTO projects
    (project_id, client_name, project_name, total_cost, start_date, status,
     current_phase, last_updated, deadline, next_milestone, pending_amount, download_link)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
ON CONFLICT (project_id) DO UPDATE SET
    client_name = excluded.client_name,
    project_name = excluded.project_name,
    total_cost = excluded.total_cost,
    start_date = excluded.start_date,
    status = excluded.status,
    current_phase = excluded.current_phase,
    last_updated = excluded.last_updated,
    deadline = excluded.deadline,
    next_milestone = excluded.next_milestone,
    pending_amount = excluded.pending_amount,
    download_link = excluded.download_link
"#;

pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  pub async fn new(path: &str) -> Result<Self, anyhow::Error> {
    let conn = if path == ":memory:" {
      Connection::open_in_memory().await?
    } else {
      Connection::open(path).await?
    };

    conn
      .call(|conn| conn.execute_batch(PRAGMAS).map_err(|e| e.into()))
      .await?;

    Ok(Self { conn })
  }

  pub async fn in_memory() -> Result<Self, anyhow::Error> {
    Self::new(":memory:").await
  }
}

#[async_trait]
impl DatabaseBackend for SqliteBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Sqlite
  }

  async fn init_schema(&self) -> Result<(), anyhow::Error> {
    self
      .conn
      .call(|conn| conn.execute_batch(SCHEMA).map_err(|e| e.into()))
      .await?;
    tracing::info!("SQLite schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<(), anyhow::Error> {
    self
      .conn
      .call(|conn| {
        conn
          .execute_batch("DROP TABLE IF EXISTS feedback; DROP TABLE IF EXISTS projects;")
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn ping(&self) -> Result<(), anyhow::Error> {
    self
      .conn
      .call(|conn| {
        conn
          .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn get_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error> {
    let id = project_id.to_string();
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT project_id, client_name, project_name, total_cost, start_date, status, current_phase, last_updated, deadline, next_milestone, pending_amount, download_link FROM projects WHERE project_id = ?1",
        )?;
        let project = stmt.query_row(params![id], row_to_project).optional()?;
        Ok(project)
      })
      .await
      .map_err(|e| anyhow::anyhow!("{}", e))
  }

  async fn upsert_project(&self, project: &Project) -> Result<(), anyhow::Error> {
    let p = project.clone();
    self
      .conn
      .call(move |conn| {
        conn
          .execute(
            UPSERT_PROJECT,
            params![
              p.project_id,
              p.client_name,
              p.project_name,
              p.total_cost,
              p.start_date,
              p.status,
              p.current_phase,
              p.last_updated,
              p.deadline,
              p.next_milestone,
              p.pending_amount,
              p.download_link,
            ],
          )
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<i64, anyhow::Error> {
    let f = feedback.clone();
    let now_str = Utc::now().to_rfc3339();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO feedback (project_id, client_name, rating, message, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
          params![f.project_id, f.client_name, f.rating, f.message, now_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await
      .map_err(|e| anyhow::anyhow!("{}", e))
  }

  async fn list_feedback(&self) -> Result<Vec<Feedback>, anyhow::Error> {
    self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT id, project_id, client_name, rating, message, created_at FROM feedback ORDER BY id",
        )?;
        let mut rows = stmt.query([])?;
        let mut feedback = Vec::new();
        while let Some(row) = rows.next()? {
          feedback.push(row_to_feedback(row)?);
        }
        Ok(feedback)
      })
      .await
      .map_err(|e| anyhow::anyhow!("{}", e))
  }
}

fn row_to_project(row: &rusqlite::Row) -> Result<Project, rusqlite::Error> {
  Ok(Project {
    project_id: row.get(0)?,
    client_name: row.get(1)?,
    project_name: row.get(2)?,
    total_cost: row.get(3)?,
    start_date: row.get(4)?,
    status: row.get(5)?,
    current_phase: row.get(6)?,
    last_updated: row.get(7)?,
    deadline: row.get(8)?,
    next_milestone: row.get(9)?,
    pending_amount: row.get(10)?,
    download_link: row.get(11)?,
  })
}

fn row_to_feedback(row: &rusqlite::Row) -> Result<Feedback, rusqlite::Error> {
  let created_str: String = row.get(5)?;
  Ok(Feedback {
    id: row.get(0)?,
    project_id: row.get(1)?,
    client_name: row.get(2)?,
    rating: row.get(3)?,
    message: row.get(4)?,
    created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
      .map(|d| d.with_timezone(&Utc))
      .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
  })
}
