//! Hook client processes.
//!
//! These run once per agent hook event, read the event payload from stdin,
//! talk to the daemon with hard timeouts, and exit 0 no matter what: a
//! missing daemon or a malformed payload must never surface to the agent.

use crate::client::ApiClient;
use aoa_core::{Config, DomainState, PatternLibrary, ProjectHome};
use extract::{enrich_file_sizes, extract_keywords, infer_tags, parse_envelope};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Hard ceiling on hook-side calls
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Read the hook payload from stdin; empty or malformed input becomes `{}`
pub fn read_hook_input() -> serde_json::Value {
  use std::io::Read;

  let mut input = String::new();
  if std::io::stdin().read_to_string(&mut input).is_err() || input.trim().is_empty() {
    return serde_json::json!({});
  }

  serde_json::from_str(input.trim()).unwrap_or_else(|_| serde_json::json!({}))
}

/// The effective pattern library for a project: the loaded document plus
/// any learned domains from the domain-state document
fn effective_library(project_root: &Path) -> PatternLibrary {
  let state = DomainState::load(&DomainState::state_path(project_root));
  PatternLibrary::load(project_root).effective(&state)
}

fn now_epoch() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

/// PostToolUse: capture the tool call as an intent record
pub async fn tool_event(config: &Config, project_root: &Path) {
  let envelope = read_hook_input();
  let parsed = parse_envelope(&envelope);

  let library = effective_library(project_root);
  let tags = infer_tags(&parsed.tool, &parsed.files, &library, parsed.search_tag.as_deref());

  let project_id = ProjectHome::load(project_root)
    .map(|home| home.project_id)
    .unwrap_or_default();

  let mut record = parsed.into_record(now_epoch(), project_id);
  for tag in tags {
    record.push_tag(tag);
  }
  enrich_file_sizes(&mut record);

  if record.files.is_empty() && record.tags.is_empty() {
    debug!("Nothing to capture");
    return;
  }

  let body = serde_json::json!({
    "session_id": record.session_id,
    "project_id": record.project_id,
    "tool": record.tool.as_str(),
    "files": record.files,
    "tags": record.tags,
    "tool_use_id": record.tool_use_id,
    "file_sizes": record.file_sizes,
    "output_size": record.output_size,
  });

  let client = ApiClient::new(config.base_url(), WRITE_TIMEOUT);
  client.post_silent("/intent", &body).await;
}

/// UserPromptSubmit: print predicted files as extra context and log the
/// prediction for hit tracking
pub async fn prompt_event(config: &Config, project_root: &Path) {
  let payload = read_hook_input();
  let session_id = payload
    .get("session_id")
    .and_then(|v| v.as_str())
    .unwrap_or("default")
    .to_string();
  let prompt = payload.get("prompt").and_then(|v| v.as_str()).unwrap_or("");

  let keywords = extract_keywords(prompt, config.predict.max_keywords);
  if keywords.is_empty() {
    return;
  }

  let client = ApiClient::new(config.base_url(), READ_TIMEOUT);
  let query = format!(
    "/predict?keywords={}&limit={}",
    keywords.join(","),
    config.predict.default_limit
  );
  let Some(response) = client.get_json(&query).await else {
    return;
  };

  let files = response
    .get("files")
    .and_then(|v| v.as_array())
    .cloned()
    .unwrap_or_default();
  if files.is_empty() {
    return;
  }

  let mut predicted = Vec::new();
  let mut confidence_sum = 0.0;
  println!("Files you may need next:");
  for file in &files {
    let path = file.get("path").and_then(|v| v.as_str()).unwrap_or("");
    let confidence = file.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.0);
    if path.is_empty() {
      continue;
    }
    println!("  {} ({:.2})", path, confidence);
    predicted.push(path.to_string());
    confidence_sum += confidence;
  }

  if predicted.is_empty() {
    return;
  }
  let avg_confidence = confidence_sum / predicted.len() as f64;

  client
    .post_silent(
      "/predict/log",
      &serde_json::json!({
        "session_id": session_id,
        "predicted_files": predicted,
        "tags": keywords,
        "trigger_file": "prompt",
        "confidence": avg_confidence,
      }),
    )
    .await;

  // Learning notice: lets the agent know the synthesizer has work waiting
  if let Some(stats) = client.get_json("/domains/stats").await
    && stats.get("learning_pending").and_then(|v| v.as_bool()) == Some(true)
  {
    println!("Domain learning pending: new semantic domains can be proposed.");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_effective_library_without_state_files() {
    let temp = tempfile::TempDir::new().unwrap();
    let library = effective_library(temp.path());
    // Falls back to the builtin library
    assert!(!library.is_empty());
  }
}
