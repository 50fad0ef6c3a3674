//! Stale-while-revalidate cache for the 360-view origin
//!
//! Models the page's cache worker:
//! - install seeds a versioned cache with the viewer's root document
//! - activate garbage-collects every other cache generation
//! - fetch serves protected URLs from cache and refreshes them in the background
//! - a small message protocol (`skipWaiting`, `clearCache`, `cacheAll`)

pub mod config;
mod fetcher;
mod snapshot;
mod storage;
mod worker;

pub use config::WorkerConfig;
pub use fetcher::{FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use snapshot::{SnapshotError, SnapshotManager};
pub use storage::{Cache, CacheEntry, CacheStorage, StorageSnapshot};
pub use worker::{CacheWorker, WorkerMessage, WorkerState, WorkerStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
  #[error("network error: {0}")]
  Network(String),
  #[error("unexpected status {status} for {url}")]
  BadStatus { url: String, status: u16 },
  #[error("{0} requests cannot be cached")]
  NotCacheable(String),
  #[error("worker is not installed")]
  NotInstalled,
}
