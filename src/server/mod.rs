mod config;
mod daemon;
mod error;
mod handlers;
mod routes;

pub use config::{
  expand_env_vars, BackendType, LoggingSection, PortalConfig, PostgresSection, ServerSection,
  SiteSection, SqliteSection,
};
pub use daemon::Daemon;
pub use error::ApiError;
pub use routes::{build_router, into_http_response, AppState};
