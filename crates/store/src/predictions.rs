//! Prediction log and rolling accuracy window.
//!
//! Every prediction the daemon hands out is logged here with an expiry.
//! Later file accesses in the same session credit hits (at most once per
//! entry and file); expired entries are folded into a rolling window of
//! evaluated predictions from which the accuracy metrics derive. The log is
//! in-memory only and rebuilt empty on restart, and it carries its own lock
//! so hit checks never contend with hot intent appends.

use aoa_core::{TrackerConfig, strip_line_range};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

/// One logged prediction set
#[derive(Debug, Clone)]
pub struct PredictionEntry {
  pub id: String,
  pub session_id: String,
  /// The event that produced the prediction (prompt text, trigger file, ...)
  pub trigger: String,
  pub predicted: Vec<String>,
  pub tags_used: Vec<String>,
  pub avg_confidence: f64,
  pub issued_at: u64,
  pub expires_at: u64,
  pub hits: u32,
  /// Paths already credited, so replayed checks stay idempotent
  pub hit_paths: HashSet<String>,
}

impl PredictionEntry {
  fn hit_in_top5(&self) -> bool {
    self.predicted.iter().take(5).any(|p| self.hit_paths.contains(p))
  }
}

#[derive(Debug, Clone, Copy)]
struct Evaluated {
  hit_in_top5: bool,
}

/// Rolling accuracy over the evaluated window
#[derive(Debug, Clone, Serialize)]
pub struct RollingMetrics {
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hit_at_5_pct: Option<f64>,
  pub evaluated: usize,
}

#[derive(Default)]
struct LogInner {
  outstanding: Vec<PredictionEntry>,
  window: VecDeque<Evaluated>,
}

/// In-memory prediction log with expiry and a rolling evaluated window
pub struct PredictionLog {
  expiry_secs: u64,
  window: usize,
  min_evaluated: usize,
  max_outstanding: usize,
  inner: RwLock<LogInner>,
}

impl PredictionLog {
  pub fn new(config: &TrackerConfig) -> Self {
    Self {
      expiry_secs: config.expiry_secs,
      window: config.window,
      min_evaluated: config.min_evaluated,
      max_outstanding: config.max_outstanding,
      inner: RwLock::new(LogInner::default()),
    }
  }

  /// Log a prediction set; returns the entry id
  pub async fn log(
    &self,
    session_id: impl Into<String>,
    trigger: impl Into<String>,
    predicted: Vec<String>,
    tags_used: Vec<String>,
    avg_confidence: f64,
    now: u64,
  ) -> String {
    let entry = PredictionEntry {
      id: uuid::Uuid::new_v4().to_string(),
      session_id: session_id.into(),
      trigger: trigger.into(),
      predicted,
      tags_used,
      avg_confidence,
      issued_at: now,
      expires_at: now + self.expiry_secs,
      hits: 0,
      hit_paths: HashSet::new(),
    };
    let id = entry.id.clone();

    let mut inner = self.inner.write().await;
    inner.outstanding.push(entry);

    // Hard ceiling: evaluate the oldest entries out early rather than grow
    while inner.outstanding.len() > self.max_outstanding {
      let oldest = inner.outstanding.remove(0);
      push_evaluated(&mut inner, self.window, &oldest);
    }

    id
  }

  /// Credit an accessed file against outstanding predictions for a session.
  /// Line ranges are stripped; a file counts at most once per entry.
  /// Returns the number of entries credited.
  pub async fn check(&self, session_id: &str, file: &str, now: u64) -> usize {
    let path = strip_line_range(file);
    let mut credited = 0;

    let mut inner = self.inner.write().await;
    for entry in inner.outstanding.iter_mut() {
      if entry.session_id != session_id || entry.expires_at <= now {
        continue;
      }
      if entry.predicted.iter().any(|p| p == path) && entry.hit_paths.insert(path.to_string()) {
        entry.hits += 1;
        credited += 1;
        debug!("Prediction hit: {} in session {}", path, session_id);
      }
    }

    credited
  }

  /// Fold expired entries into the rolling window; returns how many expired
  pub async fn sweep(&self, now: u64) -> usize {
    let mut inner = self.inner.write().await;
    let mut expired = 0;

    let mut index = 0;
    while index < inner.outstanding.len() {
      if inner.outstanding[index].expires_at <= now {
        let entry = inner.outstanding.remove(index);
        push_evaluated(&mut inner, self.window, &entry);
        expired += 1;
      } else {
        index += 1;
      }
    }

    expired
  }

  /// Evaluate everything outstanding (final flush at shutdown)
  pub async fn flush_all(&self) -> usize {
    let mut inner = self.inner.write().await;
    let drained: Vec<PredictionEntry> = inner.outstanding.drain(..).collect();
    for entry in &drained {
      push_evaluated(&mut inner, self.window, entry);
    }
    drained.len()
  }

  pub async fn metrics(&self) -> RollingMetrics {
    let inner = self.inner.read().await;
    let evaluated = inner.window.len();

    if evaluated < self.min_evaluated {
      return RollingMetrics {
        status: "calibrating".to_string(),
        hit_at_5_pct: None,
        evaluated,
      };
    }

    let hits = inner.window.iter().filter(|e| e.hit_in_top5).count();
    RollingMetrics {
      status: "ok".to_string(),
      hit_at_5_pct: Some(hits as f64 / evaluated as f64 * 100.0),
      evaluated,
    }
  }

  pub async fn outstanding(&self) -> usize {
    self.inner.read().await.outstanding.len()
  }

  /// Hits recorded on a specific entry (test and inspection hook)
  pub async fn hits_for(&self, id: &str) -> Option<u32> {
    let inner = self.inner.read().await;
    inner.outstanding.iter().find(|e| e.id == id).map(|e| e.hits)
  }

  /// Total hits across a session's outstanding entries
  pub async fn session_hits(&self, session_id: &str) -> u32 {
    let inner = self.inner.read().await;
    inner
      .outstanding
      .iter()
      .filter(|e| e.session_id == session_id)
      .map(|e| e.hits)
      .sum()
  }
}

fn push_evaluated(inner: &mut LogInner, window: usize, entry: &PredictionEntry) {
  inner.window.push_back(Evaluated {
    hit_in_top5: entry.hit_in_top5(),
  });
  while inner.window.len() > window {
    inner.window.pop_front();
  }
}
