//! The durable intent log and its derived indices.
//!
//! Records live in a single JSON document rewritten on append and truncated
//! to the retained cap. The in-memory state is the source of truth: an
//! append updates the indices before it returns so that an immediate
//! predict sees it, and disk failures are recorded as a health warning but
//! never surface to the caller. A corrupt document loads as an empty store.

use aoa_core::{IntentRecord, is_path_token, strip_line_range};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Persisted document shape
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDoc {
  records: Vec<IntentRecord>,
  file_counts: HashMap<String, u64>,
  tag_counts: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct StoreInner {
  /// Recency window, oldest first
  records: VecDeque<IntentRecord>,
  /// Access count per path (line ranges stripped; `pattern:`/`cmd:` excluded)
  file_counts: HashMap<String, u64>,
  tag_counts: HashMap<String, u64>,
  /// Last write failure, surfaced through `/health`
  write_warning: Option<String>,
}

/// Aggregate store statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
  pub total_records: usize,
  pub unique_files: usize,
  pub unique_tags: usize,
  pub top_files: Vec<(String, u64)>,
  pub top_tags: Vec<(String, u64)>,
}

/// Per-path activity over the retained window, consumed by the predictor
#[derive(Debug, Clone, Default)]
pub struct FileActivity {
  pub count: u64,
  pub last_access: u64,
  pub tags: HashSet<String>,
}

/// Append-only intent store with derived frequency indices
pub struct IntentStore {
  path: PathBuf,
  max_records: usize,
  inner: RwLock<StoreInner>,
}

impl IntentStore {
  /// Open the store at `path`, loading any existing document. Corruption
  /// yields an empty store, not an error.
  pub fn open(path: impl Into<PathBuf>, max_records: usize) -> Self {
    let path = path.into();
    let mut inner = StoreInner::default();

    match std::fs::read_to_string(&path) {
      Ok(content) => match serde_json::from_str::<StoreDoc>(&content) {
        Ok(doc) => {
          inner.records = doc.records.into();
          inner.file_counts = doc.file_counts;
          inner.tag_counts = doc.tag_counts;
          debug!("Loaded {} intent records from {:?}", inner.records.len(), path);
        }
        Err(e) => {
          warn!("Corrupt intent log at {:?}, starting empty: {}", path, e);
        }
      },
      Err(_) => {
        debug!("No intent log at {:?}, starting empty", path);
      }
    }

    Self {
      path,
      max_records,
      inner: RwLock::new(inner),
    }
  }

  /// Append a record: update the indices, truncate past the cap, persist.
  /// Returns once the in-memory state reflects the record; disk errors are
  /// logged and recorded as a warning, never returned.
  pub async fn append(&self, record: IntentRecord) {
    let mut inner = self.inner.write().await;

    for token in &record.files {
      if is_path_token(token) {
        *inner.file_counts.entry(strip_line_range(token).to_string()).or_insert(0) += 1;
      }
    }
    for tag in &record.tags {
      *inner.tag_counts.entry(tag.clone()).or_insert(0) += 1;
    }
    inner.records.push_back(record);

    // Bounded-size policy: drop the head, keeping the counts in lockstep
    // with the retained records
    let mut rotated = false;
    while inner.records.len() > self.max_records {
      rotated = true;
      if let Some(dropped) = inner.records.pop_front() {
        for token in &dropped.files {
          if is_path_token(token) {
            let path = strip_line_range(token);
            if let Some(count) = inner.file_counts.get_mut(path) {
              *count = count.saturating_sub(1);
              if *count == 0 {
                inner.file_counts.remove(path);
              }
            }
          }
        }
        for tag in &dropped.tags {
          if let Some(count) = inner.tag_counts.get_mut(tag) {
            *count = count.saturating_sub(1);
            if *count == 0 {
              inner.tag_counts.remove(tag);
            }
          }
        }
      }
    }

    if let Err(e) = persist(&self.path, &inner, rotated) {
      warn!("Intent log write failed (capture continues): {}", e);
      inner.write_warning = Some(e.to_string());
    } else {
      inner.write_warning = None;
    }
  }

  /// Newest-first records, optionally filtered by project
  pub async fn recent(&self, limit: usize, project_id: Option<&str>) -> Vec<IntentRecord> {
    let inner = self.inner.read().await;
    inner
      .records
      .iter()
      .rev()
      .filter(|r| project_id.is_none_or(|p| r.project_id == p))
      .take(limit)
      .cloned()
      .collect()
  }

  pub async fn total_records(&self) -> usize {
    self.inner.read().await.records.len()
  }

  pub async fn stats(&self) -> StoreStats {
    let inner = self.inner.read().await;
    StoreStats {
      total_records: inner.records.len(),
      unique_files: inner.file_counts.len(),
      unique_tags: inner.tag_counts.len(),
      top_files: top_of(&inner.file_counts, 5),
      top_tags: top_of(&inner.tag_counts, 10),
    }
  }

  /// Files accessed since `cutoff`, ranked by in-window access count
  pub async fn files_since(&self, cutoff: u64, limit: usize) -> Vec<(String, u64)> {
    let inner = self.inner.read().await;
    let mut counts: HashMap<String, u64> = HashMap::new();

    for record in inner.records.iter().rev() {
      if record.timestamp < cutoff {
        break;
      }
      for token in &record.files {
        if is_path_token(token) {
          *counts.entry(strip_line_range(token).to_string()).or_insert(0) += 1;
        }
      }
    }

    top_of(&counts, limit)
  }

  /// Files co-occurring with `tag`, ranked by co-occurrence count
  pub async fn files_by_tag(&self, tag: &str, limit: usize) -> Vec<(String, u64)> {
    let inner = self.inner.read().await;
    let mut counts: HashMap<String, u64> = HashMap::new();

    for record in &inner.records {
      if !record.tags.iter().any(|t| t == tag) {
        continue;
      }
      for token in &record.files {
        if is_path_token(token) {
          *counts.entry(strip_line_range(token).to_string()).or_insert(0) += 1;
        }
      }
    }

    top_of(&counts, limit)
  }

  /// Per-path activity across the retained window: lifetime count,
  /// last-access time, and the union of tags on records touching the path
  pub async fn file_activity(&self) -> HashMap<String, FileActivity> {
    let inner = self.inner.read().await;
    let mut activity: HashMap<String, FileActivity> = HashMap::new();

    for record in &inner.records {
      for token in &record.files {
        if !is_path_token(token) {
          continue;
        }
        let path = strip_line_range(token);
        let entry = activity.entry(path.to_string()).or_default();
        entry.last_access = entry.last_access.max(record.timestamp);
        entry.tags.extend(record.tags.iter().cloned());
      }
    }

    for (path, entry) in activity.iter_mut() {
      entry.count = inner.file_counts.get(path).copied().unwrap_or(0);
    }

    activity
  }

  /// All distinct tags across the retained window, newest records first
  pub async fn recent_tags(&self, limit: usize) -> Vec<String> {
    let inner = self.inner.read().await;
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    for record in inner.records.iter().rev() {
      for tag in &record.tags {
        if seen.insert(tag.clone()) {
          tags.push(tag.clone());
          if tags.len() >= limit {
            return tags;
          }
        }
      }
    }

    tags
  }

  /// The last write failure, if the most recent persist attempt failed
  pub async fn write_warning(&self) -> Option<String> {
    self.inner.read().await.write_warning.clone()
  }

  /// Persist the current state (used at shutdown)
  pub async fn flush(&self) {
    let mut inner = self.inner.write().await;
    if let Err(e) = persist(&self.path, &inner, true) {
      warn!("Intent log flush failed: {}", e);
      inner.write_warning = Some(e.to_string());
    }
  }
}

fn persist(path: &Path, inner: &StoreInner, sync: bool) -> crate::Result<()> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }

  let doc = StoreDoc {
    records: inner.records.iter().cloned().collect(),
    file_counts: inner.file_counts.clone(),
    tag_counts: inner.tag_counts.clone(),
  };

  let mut file = std::fs::File::create(path)?;
  file.write_all(serde_json::to_string(&doc)?.as_bytes())?;
  if sync {
    file.sync_all()?;
  }

  Ok(())
}

fn top_of(counts: &HashMap<String, u64>, limit: usize) -> Vec<(String, u64)> {
  let mut entries: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
  entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  entries.truncate(limit);
  entries
}

#[cfg(test)]
mod tests {
  use super::*;
  use aoa_core::{ToolName, cmd_token, pattern_token};
  use tempfile::TempDir;

  fn record(timestamp: u64, files: &[&str], tags: &[&str]) -> IntentRecord {
    let mut r = IntentRecord::new(timestamp, "s1", ToolName::Read);
    for f in files {
      r.push_file(*f);
    }
    for t in tags {
      r.push_tag(*t);
    }
    r
  }

  fn store(temp: &TempDir) -> IntentStore {
    IntentStore::open(temp.path().join("intent-data.json"), 500)
  }

  #[tokio::test]
  async fn test_append_updates_indices() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.append(record(1, &["/repo/a.py:10-30"], &["#reading"])).await;
    store.append(record(2, &["/repo/a.py:5+"], &["#reading"])).await;

    let stats = store.stats().await;
    assert_eq!(stats.total_records, 2);
    // Line-range variants accumulate under one path
    assert_eq!(stats.unique_files, 1);
    assert_eq!(stats.top_files[0], ("/repo/a.py".to_string(), 2));
    assert_eq!(stats.top_tags[0], ("#reading".to_string(), 2));
  }

  #[tokio::test]
  async fn test_pattern_and_cmd_tokens_not_counted() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store
      .append(record(
        1,
        &[&pattern_token("*.py"), &cmd_token("indexed", "aoa grep x", 1, 2)],
        &["#searching"],
      ))
      .await;

    let stats = store.stats().await;
    assert_eq!(stats.unique_files, 0);
  }

  #[tokio::test]
  async fn test_recent_newest_first_with_project_filter() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let mut a = record(1, &["/repo/a.py"], &[]);
    a.project_id = "p1".to_string();
    let mut b = record(2, &["/repo/b.py"], &[]);
    b.project_id = "p2".to_string();
    store.append(a).await;
    store.append(b).await;

    let recent = store.recent(10, None).await;
    assert_eq!(recent[0].files, vec!["/repo/b.py"]);
    assert_eq!(recent[1].files, vec!["/repo/a.py"]);

    let filtered = store.recent(10, Some("p1")).await;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].files, vec!["/repo/a.py"]);
  }

  #[tokio::test]
  async fn test_truncation_decrements_counts() {
    let temp = TempDir::new().unwrap();
    let store = IntentStore::open(temp.path().join("intent.json"), 3);

    for i in 0..5u64 {
      store.append(record(i, &["/repo/hot.py"], &["#reading"])).await;
    }

    let stats = store.stats().await;
    assert_eq!(stats.total_records, 3);
    // Counts stay in lockstep with retained records
    assert_eq!(stats.top_files[0].1, 3);
    assert_eq!(stats.top_tags[0].1, 3);
  }

  #[tokio::test]
  async fn test_persistence_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("intent.json");

    {
      let store = IntentStore::open(&path, 500);
      store.append(record(1, &["/repo/a.py"], &["#reading"])).await;
    }

    let reloaded = IntentStore::open(&path, 500);
    assert_eq!(reloaded.total_records().await, 1);
    let stats = reloaded.stats().await;
    assert_eq!(stats.top_files[0].0, "/repo/a.py");
  }

  #[tokio::test]
  async fn test_corrupt_document_loads_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("intent.json");
    std::fs::write(&path, "{{{ not json").unwrap();

    let store = IntentStore::open(&path, 500);
    assert_eq!(store.total_records().await, 0);
  }

  #[tokio::test]
  async fn test_files_since_cutoff() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.append(record(100, &["/repo/old.py"], &[])).await;
    store.append(record(200, &["/repo/new.py"], &[])).await;
    store.append(record(201, &["/repo/new.py"], &[])).await;

    let since = store.files_since(150, 10).await;
    assert_eq!(since, vec![("/repo/new.py".to_string(), 2)]);
  }

  #[tokio::test]
  async fn test_files_by_tag() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.append(record(1, &["/repo/auth.py"], &["#authentication"])).await;
    store.append(record(2, &["/repo/auth.py"], &["#authentication"])).await;
    store.append(record(3, &["/repo/other.py"], &["#caching"])).await;

    let by_tag = store.files_by_tag("#authentication", 10).await;
    assert_eq!(by_tag, vec![("/repo/auth.py".to_string(), 2)]);
  }

  #[tokio::test]
  async fn test_file_activity() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.append(record(10, &["/repo/a.py:1-5"], &["#reading"])).await;
    store.append(record(20, &["/repo/a.py"], &["#editing"])).await;

    let activity = store.file_activity().await;
    let a = activity.get("/repo/a.py").unwrap();
    assert_eq!(a.count, 2);
    assert_eq!(a.last_access, 20);
    assert!(a.tags.contains("#reading"));
    assert!(a.tags.contains("#editing"));
  }

  #[tokio::test]
  async fn test_recent_tags() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    store.append(record(1, &[], &["#old"])).await;
    store.append(record(2, &[], &["#new", "#old"])).await;

    let tags = store.recent_tags(10).await;
    assert_eq!(tags, vec!["#new", "#old"]);
  }
}
