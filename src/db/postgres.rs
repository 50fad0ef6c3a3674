use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::sync::Arc;
use tokio_postgres::config::SslMode;
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

use super::backend::{DatabaseBackend, SqlDialect};
use crate::types::{Feedback, NewFeedback, Project};

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
);

CREATE TABLE IF NOT EXISTS feedback (
    id BIGSERIAL PRIMARY KEY,
    project_id TEXT NOT NULL,
    client_name TEXT NOT NULL,
    rating INTEGER NOT NULL,
    message TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_feedback_project ON feedback(project_id);
"#;

const SELECT_PROJECT: &str = "SELECT project_id, client_name, project_name, total_cost, start_date, status, current_phase, last_updated, deadline, next_milestone, pending_amount, download_link FROM projects WHERE project_id = $1";

const UPSERT_PROJECT: &str = r#"
INSERT INTO projects
    (project_id, client_name, project_name, total_cost, start_date, status,
     current_phase, last_updated, deadline, next_milestone, pending_amount, download_link)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (project_id) DO UPDATE SET
    client_name = EXCLUDED.client_name,
    project_name = EXCLUDED.project_name,
    total_cost = EXCLUDED.total_cost,
    start_date = EXCLUDED.start_date,
    status = EXCLUDED.status,
    current_phase = EXCLUDED.current_phase,
    last_updated = EXCLUDED.last_updated,
    deadline = EXCLUDED.deadline,
    next_milestone = EXCLUDED.next_milestone,
    pending_amount = EXCLUDED.pending_amount,
    download_link = EXCLUDED.download_link
"#;

pub struct PostgresBackend {
  pool: Pool,
}

/// Transport chosen from the connection URL's `sslmode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
  /// `sslmode=disable`
  Plain,
  /// `prefer` (the default) or `require`
  Tls,
}

impl TlsMode {
  pub fn from_url(url: &str) -> Result<Self, anyhow::Error> {
    let config: tokio_postgres::Config = url.parse()?;
    Ok(match config.get_ssl_mode() {
      SslMode::Disable => TlsMode::Plain,
      _ => TlsMode::Tls,
    })
  }
}

impl PostgresBackend {
  /// Pool for `url`. With `verify_certificates` off, any server certificate
  /// is accepted.
  pub fn new(
    url: &str,
    max_connections: usize,
    verify_certificates: bool,
  ) -> Result<Self, anyhow::Error> {
    let mode = TlsMode::from_url(url)?;

    let mut cfg = Config::new();
    cfg.url = Some(url.into());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections.max(1)));

    let pool = match mode {
      TlsMode::Plain => cfg.create_pool(Some(Runtime::Tokio1), NoTls)?,
      TlsMode::Tls => cfg.create_pool(
        Some(Runtime::Tokio1),
        MakeRustlsConnect::new(tls_config(verify_certificates)?),
      )?,
    };
    tracing::info!(
      "PostgreSQL pool ready ({:?}, certificate verification {})",
      mode,
      if verify_certificates { "on" } else { "off" }
    );
    Ok(Self { pool })
  }
}

fn tls_config(verify_certificates: bool) -> Result<ClientConfig, anyhow::Error> {
  let provider = Arc::new(rustls::crypto::ring::default_provider());
  let builder = ClientConfig::builder_with_provider(provider.clone())
    .with_safe_default_protocol_versions()?;

  let config = if verify_certificates {
    let roots = RootCertStore {
      roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    builder.with_root_certificates(roots).with_no_client_auth()
  } else {
    builder
      .dangerous()
      .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
      .with_no_client_auth()
  };
  Ok(config)
}

/// Skips chain and hostname checks but still checks handshake signatures
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
  fn verify_server_cert(
    &self,
    _end_entity: &CertificateDer<'_>,
    _intermediates: &[CertificateDer<'_>],
    _server_name: &ServerName<'_>,
    _ocsp_response: &[u8],
    _now: UnixTime,
  ) -> Result<ServerCertVerified, rustls::Error> {
    Ok(ServerCertVerified::assertion())
  }

  fn verify_tls12_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &DigitallySignedStruct,
  ) -> Result<HandshakeSignatureValid, rustls::Error> {
    verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
  }

  fn verify_tls13_signature(
    &self,
    message: &[u8],
    cert: &CertificateDer<'_>,
    dss: &DigitallySignedStruct,
  ) -> Result<HandshakeSignatureValid, rustls::Error> {
    verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
  }

  fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
    self.0.signature_verification_algorithms.supported_schemes()
  }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Postgres
  }

  async fn init_schema(&self) -> Result<(), anyhow::Error> {
    self.pool.get().await?.batch_execute(SCHEMA).await?;
    tracing::info!("PostgreSQL schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<(), anyhow::Error> {
    self
      .pool
      .get()
      .await?
      .batch_execute("DROP TABLE IF EXISTS feedback; DROP TABLE IF EXISTS projects;")
      .await?;
    Ok(())
  }

  async fn ping(&self) -> Result<(), anyhow::Error> {
    self.pool.get().await?.simple_query("SELECT 1").await?;
    Ok(())
  }

  async fn get_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error> {
    let row = self
      .pool
      .get()
      .await?
      .query_opt(SELECT_PROJECT, &[&project_id])
      .await?;
    Ok(row.map(|r| Project {
      project_id: r.get(0),
      client_name: r.get(1),
      project_name: r.get(2),
      total_cost: r.get(3),
      start_date: r.get(4),
      status: r.get(5),
      current_phase: r.get(6),
      last_updated: r.get(7),
      deadline: r.get(8),
      next_milestone: r.get(9),
      pending_amount: r.get(10),
      download_link: r.get(11),
    }))
  }

  async fn upsert_project(&self, project: &Project) -> Result<(), anyhow::Error> {
    self
      .pool
      .get()
      .await?
      .execute(
        UPSERT_PROJECT,
        &[
          &project.project_id,
          &project.client_name,
          &project.project_name,
          &project.total_cost,
          &project.start_date,
          &project.status,
          &project.current_phase,
          &project.last_updated,
          &project.deadline,
          &project.next_milestone,
          &project.pending_amount,
          &project.download_link,
        ],
      )
      .await?;
    Ok(())
  }

  async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<i64, anyhow::Error> {
    let row = self
      .pool
      .get()
      .await?
      .query_one(
        "INSERT INTO feedback (project_id, client_name, rating, message) VALUES ($1, $2, $3, $4) RETURNING id",
        &[
          &feedback.project_id,
          &feedback.client_name,
          &feedback.rating,
          &feedback.message,
        ],
      )
      .await?;
    Ok(row.get(0))
  }

  async fn list_feedback(&self) -> Result<Vec<Feedback>, anyhow::Error> {
    let rows = self
      .pool
      .get()
      .await?
      .query(
        "SELECT id, project_id, client_name, rating, message, created_at FROM feedback ORDER BY id",
        &[],
      )
      .await?;
    Ok(
      rows
        .into_iter()
        .map(|r| Feedback {
          id: r.get(0),
          project_id: r.get(1),
          client_name: r.get(2),
          rating: r.get(3),
          message: r.get(4),
          created_at: r.get(5),
        })
        .collect(),
    )
  }
}
