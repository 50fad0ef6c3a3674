//! Cache worker configuration

use serde::{Deserialize, Serialize};

/// Configuration for the 360-view cache worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
  /// Cache generation name. Activation deletes every other cache.
  #[serde(default = "default_cache_name")]
  pub cache_name: String,

  /// Document fetched and stored on install and on `cacheAll`
  #[serde(default = "default_seed_url")]
  pub seed_url: String,

  /// Requests whose URL contains this substring use the cache
  #[serde(default = "default_protected")]
  pub protected: String,

  /// Optional file the cache storage is persisted to
  #[serde(default)]
  pub snapshot_path: Option<String>,
}

fn default_cache_name() -> String {
  "360-view-cache-v3".into()
}

fn default_seed_url() -> String {
  "https://amandesignpartner.github.io/360views/".into()
}

fn default_protected() -> String {
  "amandesignpartner.github.io/360views".into()
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      cache_name: default_cache_name(),
      seed_url: default_seed_url(),
      protected: default_protected(),
      snapshot_path: None,
    }
  }
}

impl WorkerConfig {
  /// Resolve a path below the seed document, keeping any query string
  pub fn upstream_url(&self, path: &str, query: Option<&str>) -> String {
    let base = self.seed_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let mut url = format!("{}/{}", base, path);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
      url.push('?');
      url.push_str(q);
    }
    url
  }
}
