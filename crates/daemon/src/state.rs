//! Shared daemon state.
//!
//! The service owns three long-lived singletons (intent store, prediction
//! log, domain learner) with explicit lifecycles; handlers reach them
//! through one `Arc<AppState>` rather than ambient globals.

use crate::learner::DomainLearner;
use aoa_core::Config;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use store::{IntentStore, PredictionLog};

pub struct AppState {
  pub config: Config,
  pub project_id: String,
  pub store: Arc<IntentStore>,
  pub predictions: Arc<PredictionLog>,
  pub learner: Arc<DomainLearner>,
}

impl AppState {
  pub fn new(
    config: Config,
    project_id: impl Into<String>,
    store: Arc<IntentStore>,
    predictions: Arc<PredictionLog>,
    learner: Arc<DomainLearner>,
  ) -> Self {
    Self {
      config,
      project_id: project_id.into(),
      store,
      predictions,
      learner,
    }
  }
}

/// Seconds since the Unix epoch
pub fn now_epoch() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}
