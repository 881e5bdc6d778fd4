//! File prediction scoring.
//!
//! Ranks files observed in the intent store against a keyword set. The raw
//! score blends a direct path-substring match, tag overlap, and a
//! frequency-times-recency component; confidences are the raw scores
//! normalized to the top candidate. Deterministic for a fixed store state.

use aoa_core::PredictConfig;
use serde::Serialize;
use std::io::Read;
use store::IntentStore;

/// One ranked prediction
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
  pub path: String,
  pub confidence: f64,
  pub snippet: String,
}

/// Rank files for a keyword set. Returns an empty list below the
/// minimum-data gate.
pub async fn predict(
  store: &IntentStore,
  config: &PredictConfig,
  keywords: &[String],
  limit: usize,
  snippet_lines: usize,
  now: u64,
) -> Vec<Prediction> {
  if store.total_records().await < config.min_records {
    return Vec::new();
  }

  let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
  let activity = store.file_activity().await;

  let mut scored: Vec<(f64, u64, String)> = Vec::with_capacity(activity.len());
  for (path, act) in activity {
    let path_lower = path.to_lowercase();

    let direct = if keywords.iter().any(|k| path_lower.contains(k.as_str())) {
      1.0
    } else {
      0.0
    };

    let tag_overlap = keywords.iter().filter(|k| act.tags.contains(&format!("#{}", k))).count() as f64;

    let elapsed = now.saturating_sub(act.last_access) as f64;
    let recency = 0.5f64.powf(elapsed / config.half_life_secs as f64);

    let raw = config.direct_weight * direct
      + config.tag_weight * tag_overlap
      + config.freq_weight * (1.0 + act.count as f64).ln() * recency;

    scored.push((raw, act.last_access, path));
  }

  // Highest score first; ties broken by most recent access, then path
  scored.sort_by(|a, b| {
    b.0
      .partial_cmp(&a.0)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| b.1.cmp(&a.1))
      .then_with(|| a.2.cmp(&b.2))
  });

  let top_raw = match scored.first() {
    Some((raw, _, _)) if *raw > 0.0 => *raw,
    _ => return Vec::new(),
  };

  scored
    .into_iter()
    .take(limit)
    .map(|(raw, _, path)| {
      let snippet = read_snippet(&path, snippet_lines, config.snippet_max_bytes);
      Prediction {
        path,
        confidence: raw / top_raw,
        snippet,
      }
    })
    .collect()
}

/// First `lines` lines of a file, truncated to `max_bytes`. A missing or
/// unreadable file yields an empty snippet.
fn read_snippet(path: &str, lines: usize, max_bytes: usize) -> String {
  let Ok(mut file) = std::fs::File::open(path) else {
    return String::new();
  };

  let mut buf = vec![0u8; max_bytes];
  let mut read = 0;
  while read < max_bytes {
    match file.read(&mut buf[read..]) {
      Ok(0) => break,
      Ok(n) => read += n,
      Err(_) => return String::new(),
    }
  }

  let text = String::from_utf8_lossy(&buf[..read]);
  text.lines().take(lines).collect::<Vec<_>>().join("\n")
}
