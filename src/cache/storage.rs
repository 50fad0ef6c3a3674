//! Named response caches

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::fetcher::{FetchRequest, FetchResponse};
use super::CacheError;

/// A stored response and when it was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub response: FetchResponse,
  pub cached_at: DateTime<Utc>,
}

/// One named cache: request URL to complete response
#[derive(Debug, Default)]
pub struct Cache {
  name: String,
  entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Cache {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      entries: RwLock::new(HashMap::new()),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Exact match on the request URL (fragment ignored)
  pub fn match_request(&self, request: &FetchRequest) -> Option<FetchResponse> {
    if !request.is_cacheable() {
      return None;
    }
    self
      .entries
      .read()
      .get(request.cache_key())
      .map(|e| e.response.clone())
  }

  pub fn entry(&self, url: &str) -> Option<CacheEntry> {
    self.entries.read().get(url).cloned()
  }

  /// Store a response, replacing any previous one for the same URL
  pub fn put(&self, request: &FetchRequest, response: FetchResponse) -> Result<(), CacheError> {
    if !request.is_cacheable() {
      return Err(CacheError::NotCacheable(request.method.to_string()));
    }
    self.entries.write().insert(
      request.cache_key().to_string(),
      CacheEntry {
        response,
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  pub fn delete(&self, request: &FetchRequest) -> bool {
    self.entries.write().remove(request.cache_key()).is_some()
  }

  /// Cached URLs, sorted
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
    keys.sort();
    keys
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }
}

/// Serialized form of a whole [`CacheStorage`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSnapshot {
  pub caches: BTreeMap<String, BTreeMap<String, CacheEntry>>,
}

/// All caches of the worker, keyed by generation name
#[derive(Debug, Default)]
pub struct CacheStorage {
  caches: RwLock<HashMap<String, Arc<Cache>>>,
}

impl CacheStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get the named cache, creating it if needed
  pub fn open(&self, name: &str) -> Arc<Cache> {
    if let Some(cache) = self.caches.read().get(name) {
      return cache.clone();
    }
    self
      .caches
      .write()
      .entry(name.to_string())
      .or_insert_with(|| Arc::new(Cache::new(name)))
      .clone()
  }

  pub fn get(&self, name: &str) -> Option<Arc<Cache>> {
    self.caches.read().get(name).cloned()
  }

  pub fn has(&self, name: &str) -> bool {
    self.caches.read().contains_key(name)
  }

  /// Remove a cache. Handles already given out keep working but are orphaned.
  pub fn delete(&self, name: &str) -> bool {
    self.caches.write().remove(name).is_some()
  }

  /// Cache names, sorted
  pub fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.caches.read().keys().cloned().collect();
    keys.sort();
    keys
  }

  pub fn snapshot(&self) -> StorageSnapshot {
    let caches = self
      .caches
      .read()
      .iter()
      .map(|(name, cache)| {
        let entries = cache
          .entries
          .read()
          .iter()
          .map(|(url, entry)| (url.clone(), entry.clone()))
          .collect();
        (name.clone(), entries)
      })
      .collect();
    StorageSnapshot { caches }
  }

  /// Replace every cache with the snapshot contents
  pub fn restore(&self, snapshot: StorageSnapshot) {
    let restored = snapshot
      .caches
      .into_iter()
      .map(|(name, entries)| {
        let cache = Cache {
          name: name.clone(),
          entries: RwLock::new(entries.into_iter().collect()),
        };
        (name, Arc::new(cache))
      })
      .collect();
    *self.caches.write() = restored;
  }
}
