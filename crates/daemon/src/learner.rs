//! Domain learning: activity counters, orphan accounting, the
//! learning-pending trigger, and the math-only tuning pass.
//!
//! The loaded pattern library never changes; everything the learner decides
//! lands in the domain-state document, and the *effective* library (loaded
//! minus pruned terms, plus learned domains) is rebuilt and swapped
//! atomically whenever that state changes. Appends only bump counters under
//! a short lock, so learning never blocks capture.

use aoa_core::{
  DomainState, IntentRecord, LearnedDomain, LearnerConfig, LearningSnapshot, PatternLibrary, ProposedDomain,
  is_path_token, strip_line_range, validate_proposed,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use store::{DomainStore, IntentStore};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Tool-action tags are never orphans
const ACTION_TAGS: &[&str] = &[
  "#reading", "#editing", "#creating", "#executing", "#searching", "#delegating", "#predicting",
];

/// Learning flags and counters for `/domains/stats`
#[derive(Debug, Clone, Serialize)]
pub struct LearnerStats {
  pub domains: usize,
  pub learning_pending: bool,
  pub tune_count: u64,
  pub tuning_pending: bool,
  pub orphan_count: usize,
}

/// Result of a math-only tuning pass
#[derive(Debug, Clone, Serialize)]
pub struct TuneOutcome {
  pub success: bool,
  pub terms_pruned: usize,
  pub domains_active: usize,
  pub domains_flagged_stale: usize,
  pub domains_deprecated: usize,
}

pub struct DomainLearner {
  config: LearnerConfig,
  /// The library as loaded at startup; immutable
  base: PatternLibrary,
  domains: DomainStore,
  /// Base folded with the current domain state; swapped on state changes
  effective: RwLock<Arc<PatternLibrary>>,
}

impl DomainLearner {
  pub fn new(config: LearnerConfig, base: PatternLibrary, domains: DomainStore) -> Self {
    let effective = Arc::new(base.clone());
    Self {
      config,
      base,
      domains,
      effective: RwLock::new(effective),
    }
  }

  /// Rebuild the effective library from the base and the given state
  async fn rebuild_effective(&self, state: &DomainState) {
    let rebuilt = Arc::new(self.base.effective(state));
    *self.effective.write().await = rebuilt;
  }

  /// Fold persisted state into the effective library (call once at startup)
  pub async fn warm(&self) {
    let state = self.domains.snapshot().await;
    self.rebuild_effective(&state).await;
  }

  /// The current effective pattern library
  pub async fn library(&self) -> Arc<PatternLibrary> {
    self.effective.read().await.clone()
  }

  /// Account for an appended record: bump the cycle counters, record orphan
  /// tags, and flag learning when both thresholds are crossed. The frozen
  /// snapshot is taken from the store at flag time.
  pub async fn note_append(&self, record: &IntentRecord, store: &IntentStore, now: u64) {
    let library = self.library().await;

    let orphan_tags: Vec<String> = record
      .tags
      .iter()
      .filter(|tag| !ACTION_TAGS.contains(&tag.as_str()) && !library.is_domain_tag(tag))
      .cloned()
      .collect();

    let should_flag = self
      .domains
      .mutate(|state| {
        state.since_last_cycle += 1;
        state.since_last_tune += 1;
        for tag in &orphan_tags {
          *state.orphans.entry(tag.clone()).or_insert(0) += 1;
        }
        !state.learning_pending
          && state.since_last_cycle >= self.config.learn_threshold
          && state.orphans.len() >= self.config.min_orphans
      })
      .await;

    if should_flag {
      let recent_tags = store.recent_tags(30).await;
      let recent_files: Vec<String> = store
        .files_since(now.saturating_sub(3600), 20)
        .await
        .into_iter()
        .map(|(path, _)| path)
        .collect();

      self
        .domains
        .mutate(|state| {
          state.learning_pending = true;
          state.since_last_cycle = 0;
          state.snapshot = Some(LearningSnapshot {
            recent_tags,
            recent_files,
            top_orphans: state.top_orphans(10),
            frozen_at: now,
          });
        })
        .await;
      info!("Learning cycle flagged: enough activity and orphan tags accumulated");
    }
  }

  pub async fn stats(&self) -> LearnerStats {
    let library = self.library().await;
    let state = self.domains.snapshot().await;
    LearnerStats {
      domains: library.domains().len(),
      learning_pending: state.learning_pending,
      tune_count: state.since_last_tune,
      tuning_pending: state.since_last_tune >= self.config.tune_threshold,
      orphan_count: state.orphans.len(),
    }
  }

  /// Orphan tags ranked by observation count
  pub async fn orphans(&self, limit: usize) -> Vec<(String, u64)> {
    let state = self.domains.snapshot().await;
    let mut orphans: Vec<(String, u64)> = state.orphans.into_iter().collect();
    orphans.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    orphans.truncate(limit);
    orphans
  }

  /// The frozen snapshot, when learning is pending
  pub async fn snapshot(&self) -> Option<LearningSnapshot> {
    self.domains.read(|state| state.snapshot.clone()).await
  }

  /// Active domains, loaded ones first, then learned
  pub async fn list(&self, limit: usize) -> Vec<serde_json::Value> {
    let state = self.domains.snapshot().await;
    let learned_names: HashSet<&str> = state.learned.iter().map(|d| d.name.as_str()).collect();
    let library = self.library().await;

    library
      .domains()
      .iter()
      .take(limit)
      .map(|domain| {
        let terms: Vec<&str> = domain.matches().collect();
        let learned = learned_names.contains(domain.name.as_str());
        serde_json::json!({
          "name": domain.name,
          "terms": terms,
          "source": if learned { "learned" } else { "library" },
        })
      })
      .collect()
  }

  /// Accept proposed domains. Validation failures reject the whole
  /// submission; on success the state and effective index update atomically
  /// and the pending flag clears.
  pub async fn accept(&self, proposals: Vec<ProposedDomain>) -> Result<usize, String> {
    let library = self.library().await;
    let existing_terms = library.all_terms();
    let existing_names: HashSet<String> = library.domains().iter().map(|d| d.name.clone()).collect();

    validate_proposed(&proposals, &existing_terms, &existing_names)?;

    let added = proposals.len();
    let state = self
      .domains
      .mutate(|state| {
        for proposal in &proposals {
          let name = proposal.name.trim_start_matches('@').to_string();
          let terms: Vec<String> = proposal.terms.iter().map(|t| t.to_lowercase()).collect();

          // Tags covered by the new domain stop being orphans
          state
            .orphans
            .retain(|tag, _| {
              let bare = tag.trim_start_matches('#');
              bare != name && !terms.iter().any(|t| t == bare)
            });

          state.learned.push(LearnedDomain {
            name,
            terms,
            added_at: chrono::Utc::now(),
            last_matched_at: None,
            stale_cycles: 0,
          });
        }
        state.learning_pending = false;
        state.snapshot = None;
        state.clone()
      })
      .await;

    self.rebuild_effective(&state).await;
    info!("Accepted {} learned domains", added);
    Ok(added)
  }

  /// Clear the pending flag without accepting anything
  pub async fn mark_learned(&self) {
    let state = self
      .domains
      .mutate(|state| {
        state.learning_pending = false;
        state.snapshot = None;
        state.clone()
      })
      .await;
    self.rebuild_effective(&state).await;
  }

  /// Math-only tuning: prune terms matching more than the configured share
  /// of all retained records, flag learned domains whose terms matched none
  /// of the last `tune_threshold` records as stale, and deprecate domains
  /// stale for two consecutive cycles.
  pub async fn tune(&self, store: &IntentStore) -> TuneOutcome {
    let records = store.recent(usize::MAX, None).await;
    let texts: Vec<String> = records.iter().map(record_text).collect();
    let total = texts.len();

    // recent() is newest-first, so the stale window is a prefix of texts
    let stale_window = texts.len().min(self.config.tune_threshold as usize);
    let recent_texts = &texts[..stale_window];

    let library = self.library().await;
    let mut to_prune: Vec<String> = Vec::new();

    if total > 0 {
      for domain in library.domains() {
        for term in domain.matches() {
          let matched = texts.iter().filter(|t| t.contains(term)).count();
          if matched as f64 > total as f64 * self.config.prune_match_rate {
            to_prune.push(term.to_string());
          }
        }
      }
    }

    let terms_pruned = to_prune.len();
    let now = chrono::Utc::now();

    let (state, flagged, deprecated) = self
      .domains
      .mutate(|state| {
        for term in &to_prune {
          if !state.pruned_terms.contains(term) {
            state.pruned_terms.push(term.clone());
          }
        }

        let mut flagged = 0;
        for learned in state.learned.iter_mut() {
          let matched = recent_texts
            .iter()
            .any(|text| learned.terms.iter().any(|term| text.contains(term.as_str())));
          if matched {
            learned.stale_cycles = 0;
            learned.last_matched_at = Some(now);
          } else {
            learned.stale_cycles += 1;
            flagged += 1;
          }
        }

        let before = state.learned.len();
        state.learned.retain(|d| d.stale_cycles < 2);
        let deprecated = before - state.learned.len();

        state.since_last_tune = 0;
        (state.clone(), flagged, deprecated)
      })
      .await;

    self.rebuild_effective(&state).await;

    let active = self.library().await.domains().len();
    debug!(
      "Tuning pass: pruned={} stale={} deprecated={} active={}",
      terms_pruned, flagged, deprecated, active
    );

    TuneOutcome {
      success: true,
      terms_pruned,
      domains_active: active,
      domains_flagged_stale: flagged,
      domains_deprecated: deprecated,
    }
  }

  /// Whether enough appends accumulated to justify a tuning pass
  pub async fn tuning_pending(&self) -> bool {
    self.domains.read(|state| state.since_last_tune).await >= self.config.tune_threshold
  }
}

/// The lowercased path text of a record, used for term match-rate checks
fn record_text(record: &IntentRecord) -> String {
  record
    .files
    .iter()
    .filter(|t| is_path_token(t))
    .map(|t| strip_line_range(t))
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}
