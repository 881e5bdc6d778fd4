//! Thin HTTP client for the daemon facade.
//!
//! Hook processes must never block the agent: every call carries a hard
//! timeout and the silent variants turn any failure into a no-op. The base
//! URL comes from the config, with the `AOA_URL` environment variable
//! taking precedence.

use std::time::Duration;
use tracing::debug;

pub struct ApiClient {
  http: Option<reqwest::Client>,
  base: String,
}

impl ApiClient {
  /// Build a client with the given per-request timeout. A failed builder
  /// degrades to a client whose calls all silently no-op.
  pub fn new(base: impl Into<String>, timeout: Duration) -> Self {
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .inspect_err(|e| debug!("HTTP client build failed: {}", e))
      .ok();

    Self {
      http,
      base: base.into(),
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base, path)
  }

  /// Fire-and-forget POST; true when the daemon acknowledged
  pub async fn post_silent(&self, path: &str, body: &serde_json::Value) -> bool {
    let Some(http) = &self.http else {
      return false;
    };
    match http.post(self.url(path)).json(body).send().await {
      Ok(response) => response.status().is_success(),
      Err(e) => {
        debug!("POST {} failed: {}", path, e);
        false
      }
    }
  }

  /// GET returning the JSON body; None on any failure or non-2xx
  pub async fn get_json(&self, path_and_query: &str) -> Option<serde_json::Value> {
    let http = self.http.as_ref()?;
    let response = http.get(self.url(path_and_query)).send().await.ok()?;
    if !response.status().is_success() {
      return None;
    }
    response.json().await.ok()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_unreachable_daemon_is_silent() {
    // Nothing listens here; every call degrades to a no-op
    let client = ApiClient::new("http://127.0.0.1:1", Duration::from_millis(100));

    assert!(!client.post_silent("/intent", &serde_json::json!({})).await);
    assert!(client.get_json("/metrics").await.is_none());
  }
}
