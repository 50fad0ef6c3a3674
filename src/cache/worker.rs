//! Fetch-interception policy for the 360-view origin

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::config::WorkerConfig;
use super::fetcher::{FetchRequest, FetchResponse, Fetcher};
use super::storage::{Cache, CacheStorage};
use super::CacheError;

/// Lifecycle of a worker generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
  #[default]
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
}

/// Commands posted to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum WorkerMessage {
  /// Activate without waiting for existing clients to go away
  SkipWaiting,
  /// Delete the current generation's cache
  ClearCache,
  /// Fetch and store the seed document again
  CacheAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
  pub state: WorkerState,
  pub cache_name: String,
  pub skip_waiting: bool,
  pub controls_clients: bool,
  pub pending_refreshes: usize,
}

pub struct CacheWorker {
  config: WorkerConfig,
  caches: Arc<CacheStorage>,
  fetcher: Arc<dyn Fetcher>,
  state: RwLock<WorkerState>,
  skip_waiting: AtomicBool,
  controls_clients: AtomicBool,
  refreshes: Mutex<Vec<JoinHandle<()>>>,
}

impl CacheWorker {
  pub fn new(config: WorkerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
    Self::with_storage(config, fetcher, Arc::new(CacheStorage::new()))
  }

  /// Worker sharing an existing cache storage (e.g. one left by an older generation)
  pub fn with_storage(
    config: WorkerConfig,
    fetcher: Arc<dyn Fetcher>,
    caches: Arc<CacheStorage>,
  ) -> Self {
    Self {
      config,
      caches,
      fetcher,
      state: RwLock::new(WorkerState::Parsed),
      skip_waiting: AtomicBool::new(false),
      controls_clients: AtomicBool::new(false),
      refreshes: Mutex::new(Vec::new()),
    }
  }

  pub fn config(&self) -> &WorkerConfig {
    &self.config
  }

  pub fn storage(&self) -> &Arc<CacheStorage> {
    &self.caches
  }

  pub fn state(&self) -> WorkerState {
    *self.state.read()
  }

  pub fn status(&self) -> WorkerStatus {
    WorkerStatus {
      state: self.state(),
      cache_name: self.config.cache_name.clone(),
      skip_waiting: self.skip_waiting.load(Ordering::SeqCst),
      controls_clients: self.controls_clients.load(Ordering::SeqCst),
      pending_refreshes: self.pending_refreshes(),
    }
  }

  /// Installed but still waiting for the old generation to release its clients
  pub fn is_waiting(&self) -> bool {
    self.state() == WorkerState::Installed && !self.skip_waiting.load(Ordering::SeqCst)
  }

  pub fn is_protected(&self, url: &str) -> bool {
    url.contains(&self.config.protected)
  }

  /// Open the generation cache and seed it. A failed seed is logged, not fatal.
  pub async fn install(&self) {
    *self.state.write() = WorkerState::Installing;
    tracing::info!(
      "Cache worker installing, seeding {} into {}",
      self.config.seed_url,
      self.config.cache_name
    );

    let cache = self.caches.open(&self.config.cache_name);
    if let Err(e) = self.add(&cache, &self.config.seed_url).await {
      tracing::warn!("Error caching seed document: {}", e);
    }

    *self.state.write() = WorkerState::Installed;
    self.skip_waiting.store(true, Ordering::SeqCst);
  }

  /// Delete every cache but the current generation, then claim clients.
  /// Returns the names of the deleted caches.
  pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
    match self.state() {
      WorkerState::Installed | WorkerState::Activated => {}
      _ => return Err(CacheError::NotInstalled),
    }
    *self.state.write() = WorkerState::Activating;

    let mut deleted = Vec::new();
    for name in self.caches.keys() {
      if name != self.config.cache_name {
        tracing::info!("Deleting old cache: {}", name);
        self.caches.delete(&name);
        deleted.push(name);
      }
    }

    *self.state.write() = WorkerState::Activated;
    self.controls_clients.store(true, Ordering::SeqCst);
    tracing::info!("Cache worker activated: {}", self.config.cache_name);
    Ok(deleted)
  }

  /// Answer a request. Network failures never escape; they become a
  /// synthesized 503 (protected origin) or 408 (everything else).
  pub async fn fetch(&self, request: FetchRequest) -> FetchResponse {
    if self.is_protected(&request.url) {
      return self.fetch_protected(request).await;
    }

    match self.fetcher.fetch(&request).await {
      Ok(response) => response,
      Err(e) => {
        tracing::debug!("Network error for {}: {}", request.url, e);
        FetchResponse::synthesized(408, "Request Timeout", "Network error")
      }
    }
  }

  async fn fetch_protected(&self, request: FetchRequest) -> FetchResponse {
    let cache = self.caches.open(&self.config.cache_name);

    if let Some(cached) = cache.match_request(&request) {
      tracing::debug!("Serving from cache: {}", request.url);
      self.spawn_refresh(cache, request);
      return cached;
    }

    tracing::debug!("Fetching and caching: {}", request.url);
    match self.fetcher.fetch(&request).await {
      Ok(response) => {
        if response.ok() && request.is_cacheable() {
          match cache.put(&request, response.clone()) {
            Ok(()) => tracing::debug!("Cached new resource: {}", request.url),
            Err(e) => tracing::debug!("Not caching {}: {}", request.url, e),
          }
        }
        response
      }
      Err(e) => {
        tracing::warn!("Fetch failed: {} {}", request.url, e);
        FetchResponse::synthesized(503, "Service Unavailable", "Offline - resource not cached")
      }
    }
  }

  /// Re-fetch in the background so the next hit sees a fresh copy
  fn spawn_refresh(&self, cache: Arc<Cache>, request: FetchRequest) {
    let fetcher = self.fetcher.clone();
    let handle = tokio::spawn(async move {
      match fetcher.fetch(&request).await {
        Ok(response) if response.ok() => {
          if let Err(e) = cache.put(&request, response) {
            tracing::debug!("Background refresh not stored for {}: {}", request.url, e);
          }
        }
        Ok(response) => {
          tracing::debug!(
            "Background refresh for {} returned {}",
            request.url,
            response.status
          );
        }
        Err(e) => {
          tracing::debug!("Background refresh failed for {}: {}", request.url, e);
        }
      }
    });

    let mut refreshes = self.refreshes.lock();
    refreshes.retain(|h| !h.is_finished());
    refreshes.push(handle);
  }

  pub fn pending_refreshes(&self) -> usize {
    self
      .refreshes
      .lock()
      .iter()
      .filter(|h| !h.is_finished())
      .count()
  }

  /// Wait for every background refresh started so far
  pub async fn settle(&self) -> usize {
    let handles = std::mem::take(&mut *self.refreshes.lock());
    let count = handles.len();
    for handle in handles {
      if let Err(e) = handle.await {
        tracing::warn!("Background refresh task failed: {}", e);
      }
    }
    count
  }

  pub async fn message(&self, message: WorkerMessage) -> Result<(), CacheError> {
    match message {
      WorkerMessage::SkipWaiting => {
        self.skip_waiting.store(true, Ordering::SeqCst);
      }
      WorkerMessage::ClearCache => {
        self.caches.delete(&self.config.cache_name);
        tracing::info!("Cache cleared: {}", self.config.cache_name);
      }
      WorkerMessage::CacheAll => {
        tracing::info!("Force caching seed document");
        let cache = self.caches.open(&self.config.cache_name);
        self.add(&cache, &self.config.seed_url).await?;
      }
    }
    Ok(())
  }

  /// Cache name to cached URLs, for every cache in storage
  pub fn cache_listing(&self) -> BTreeMap<String, Vec<String>> {
    self
      .caches
      .keys()
      .into_iter()
      .filter_map(|name| self.caches.get(&name).map(|c| (name, c.keys())))
      .collect()
  }

  async fn add(&self, cache: &Cache, url: &str) -> Result<(), CacheError> {
    let request = FetchRequest::get(url);
    let response = self.fetcher.fetch(&request).await?;
    if !response.ok() {
      return Err(CacheError::BadStatus {
        url: url.to_string(),
        status: response.status,
      });
    }
    cache.put(&request, response)
  }
}
