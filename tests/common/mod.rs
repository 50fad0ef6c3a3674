#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use studio_portal::cache::{CacheError, FetchRequest, FetchResponse, Fetcher, WorkerConfig};
use tokio::sync::Semaphore;

pub const SEED_URL: &str = "https://amandesignpartner.github.io/360views/";

/// Scripted network: fixed responses per URL, optional outage, optional hold
pub struct MockFetcher {
  responses: Mutex<HashMap<String, FetchResponse>>,
  calls: AtomicUsize,
  offline: AtomicBool,
  hold: AtomicBool,
  gate: Semaphore,
}

impl MockFetcher {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      responses: Mutex::new(HashMap::new()),
      calls: AtomicUsize::new(0),
      offline: AtomicBool::new(false),
      hold: AtomicBool::new(false),
      gate: Semaphore::new(0),
    })
  }

  pub fn respond(&self, url: &str, status: u16, body: &str) {
    self
      .responses
      .lock()
      .insert(url.to_string(), FetchResponse::new(status, body));
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  /// Make every following fetch wait until `release` is called
  pub fn hold(&self) {
    self.hold.store(true, Ordering::SeqCst);
  }

  pub fn release(&self) {
    self.hold.store(false, Ordering::SeqCst);
    self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for MockFetcher {
  async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, CacheError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.hold.load(Ordering::SeqCst) {
      let permit = self
        .gate
        .acquire()
        .await
        .map_err(|e| CacheError::Network(e.to_string()))?;
      permit.forget();
    }
    if self.offline.load(Ordering::SeqCst) {
      return Err(CacheError::Network("connection refused".into()));
    }
    Ok(
      self
        .responses
        .lock()
        .get(request.cache_key())
        .cloned()
        .unwrap_or_else(|| FetchResponse::new(404, "not found")),
    )
  }
}

pub fn worker_config(cache_name: &str) -> WorkerConfig {
  WorkerConfig {
    cache_name: cache_name.to_string(),
    ..Default::default()
  }
}

pub fn view_url(path: &str) -> String {
  format!("{}{}", SEED_URL, path)
}
