use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::cache::WorkerConfig;
use crate::types::DEFAULT_CONTACT_LINK;

fn env_var_regex() -> &'static Regex {
  static ENV_VAR: OnceLock<Regex> = OnceLock::new();
  ENV_VAR.get_or_init(|| {
    Regex::new(r"\$\{([A-Za-z0-9_]+)\}|\$([A-Za-z0-9_]+)").expect("valid env var regex")
  })
}

/// Expand environment variables in a string.
/// Supports $VAR_NAME and ${VAR_NAME} syntax; unset variables expand to "".
pub fn expand_env_vars(input: &str) -> String {
  env_var_regex()
    .replace_all(input, |caps: &Captures| {
      let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
      std::env::var(name).unwrap_or_default()
    })
    .into_owned()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
  #[default]
  Postgres,
  Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub backend: BackendType,
  #[serde(default)]
  pub postgres: PostgresSection,
  #[serde(default)]
  pub sqlite: SqliteSection,
  #[serde(default)]
  pub logging: LoggingSection,
  #[serde(default)]
  pub site: SiteSection,
  #[serde(default)]
  pub cache: WorkerConfig,
  /// Create the tables at startup if they are missing
  #[serde(default = "default_true")]
  pub init_schema: bool,
}

fn default_true() -> bool {
  true
}

impl Default for PortalConfig {
  fn default() -> Self {
    Self {
      server: ServerSection::default(),
      backend: BackendType::default(),
      postgres: PostgresSection::default(),
      sqlite: SqliteSection::default(),
      logging: LoggingSection::default(),
      site: SiteSection::default(),
      cache: WorkerConfig::default(),
      init_schema: true,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// CORS allowed origins. ["*"] (or empty) allows every origin.
  #[serde(default = "default_cors_origins")]
  pub cors_origins: Vec<String>,
}

fn default_host() -> String {
  "0.0.0.0".into()
}
fn default_port() -> u16 {
  8888
}
fn default_cors_origins() -> Vec<String> {
  vec!["*".to_string()]
}

impl Default for ServerSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      cors_origins: default_cors_origins(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSection {
  #[serde(default = "default_pg_url")]
  pub url: String,
  #[serde(default = "default_max_conn")]
  pub max_connections: usize,
  /// Check the server certificate chain when the URL asks for TLS
  #[serde(default)]
  pub tls_verify: bool,
}
fn default_pg_url() -> String {
  "postgres://localhost/portal".into()
}
fn default_max_conn() -> usize {
  10
}
impl Default for PostgresSection {
  fn default() -> Self {
    Self {
      url: default_pg_url(),
      max_connections: default_max_conn(),
      tls_verify: false,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSection {
  #[serde(default = "default_sqlite_path")]
  pub path: String,
}
fn default_sqlite_path() -> String {
  "portal.db".into()
}
impl Default for SqliteSection {
  fn default() -> Self {
    Self {
      path: default_sqlite_path(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}
fn default_level() -> String {
  "info".into()
}
impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSection {
  /// Contact link returned with every project lookup
  #[serde(default = "default_contact_link")]
  pub contact_link: String,
}
fn default_contact_link() -> String {
  DEFAULT_CONTACT_LINK.into()
}
impl Default for SiteSection {
  fn default() -> Self {
    Self {
      contact_link: default_contact_link(),
    }
  }
}

impl PortalConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
    let expanded = expand_env_vars(content);
    Ok(serde_yaml::from_str(&expanded)?)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in ["portal.yaml", "portal.yml"] {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  pub fn address(&self) -> String {
    format!("{}:{}", self.server.host, self.server.port)
  }
}
