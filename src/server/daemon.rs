use std::sync::Arc;
use tokio::sync::broadcast;

use super::routes::{build_router, AppState};
use super::PortalConfig;
use crate::cache::{CacheWorker, SnapshotManager};
use crate::db::DatabaseBackend;

pub struct Daemon {
  config: PortalConfig,
  backend: Arc<dyn DatabaseBackend>,
  worker: Arc<CacheWorker>,
  shutdown_tx: broadcast::Sender<()>,
}

impl Daemon {
  pub fn new(
    config: PortalConfig,
    backend: Arc<dyn DatabaseBackend>,
    worker: Arc<CacheWorker>,
  ) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      config,
      backend,
      worker,
      shutdown_tx,
    }
  }

  /// Trigger graceful shutdown
  pub fn shutdown(&self) {
    tracing::info!("Initiating graceful shutdown...");
    let _ = self.shutdown_tx.send(());
  }

  pub async fn run(&self) -> Result<(), anyhow::Error> {
    if self.config.init_schema {
      tracing::info!("Initializing {} schema...", self.backend.dialect());
      self.backend.init_schema().await?;
    }

    let snapshots = self
      .config
      .cache
      .snapshot_path
      .as_ref()
      .map(SnapshotManager::new);
    if let Some(snapshots) = &snapshots {
      if let Err(e) = snapshots.load(self.worker.storage()).await {
        tracing::warn!("Ignoring unreadable cache snapshot: {}", e);
      }
    }

    self.worker.install().await;
    let deleted = self.worker.activate().await?;
    if !deleted.is_empty() {
      tracing::info!("Removed {} stale cache generation(s)", deleted.len());
    }

    let state = AppState::new(
      self.backend.clone(),
      self.worker.clone(),
      self.config.site.contact_link.clone(),
    );
    let app = build_router(state, &self.config.server.cors_origins);

    let addr = self.config.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Portal listening on http://{}", addr);

    let mut shutdown_rx = self.shutdown_tx.subscribe();
    axum::serve(listener, app)
      .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        tracing::info!("HTTP server shutting down");
      })
      .await?;

    let refreshed = self.worker.settle().await;
    tracing::debug!("Drained {} background refreshes", refreshed);
    if let Some(snapshots) = &snapshots {
      if let Err(e) = snapshots.save(self.worker.storage()).await {
        tracing::error!("Failed to save cache snapshot: {}", e);
      }
    }

    tracing::info!("Shutdown complete");
    Ok(())
  }
}
