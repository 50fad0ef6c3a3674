//! Network side of the cache worker

use async_trait::async_trait;
use http::Method;
use serde::{Deserialize, Serialize};

use super::CacheError;

/// An outbound request seen by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub method: Method,
  pub url: String,
}

impl FetchRequest {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::GET, url)
  }

  /// Cache key: the full URL without its fragment
  pub fn cache_key(&self) -> &str {
    match self.url.find('#') {
      Some(idx) => &self.url[..idx],
      None => &self.url,
    }
  }

  /// Only GET responses can be stored
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::GET
  }
}

/// A complete response: status line, headers and body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl FetchResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    let status_text = http::StatusCode::from_u16(status)
      .ok()
      .and_then(|s| s.canonical_reason())
      .unwrap_or_default()
      .to_string();
    Self {
      status,
      status_text,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// Response produced locally when the network is unreachable
  pub fn synthesized(status: u16, status_text: &str, body: &str) -> Self {
    Self {
      status,
      status_text: status_text.to_string(),
      headers: vec![(
        "content-type".to_string(),
        "text/plain; charset=utf-8".to_string(),
      )],
      body: body.as_bytes().to_vec(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// 2xx status
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Performs real network requests on behalf of the worker
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, CacheError>;
}

/// `reqwest`-backed fetcher
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, CacheError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("studio-portal/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| CacheError::Network(e.to_string()))?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, CacheError> {
    let response = self
      .client
      .request(request.method.clone(), &request.url)
      .send()
      .await
      .map_err(|e| CacheError::Network(e.to_string()))?;

    let status = response.status();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| CacheError::Network(e.to_string()))?;

    Ok(FetchResponse {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
    })
  }
}
