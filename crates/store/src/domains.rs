//! Persistence wrapper for the domain-learning state.
//!
//! The learner mutates [`DomainState`] through this store; every mutation is
//! written back so pending learning survives restarts. Disk failures are
//! logged and swallowed, mirroring the intent log's best-effort policy.

use aoa_core::DomainState;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::warn;

pub struct DomainStore {
  path: PathBuf,
  state: RwLock<DomainState>,
}

impl DomainStore {
  /// Open the state document at `path`; missing or corrupt yields defaults
  pub fn open(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    let state = DomainState::load(&path);
    Self {
      path,
      state: RwLock::new(state),
    }
  }

  /// Read access to the current state
  pub async fn read<R>(&self, f: impl FnOnce(&DomainState) -> R) -> R {
    let state = self.state.read().await;
    f(&state)
  }

  pub async fn snapshot(&self) -> DomainState {
    self.state.read().await.clone()
  }

  /// Mutate the state and persist it. Write failures never propagate.
  pub async fn mutate<R>(&self, f: impl FnOnce(&mut DomainState) -> R) -> R {
    let mut state = self.state.write().await;
    let result = f(&mut state);
    if let Err(e) = state.save(&self.path) {
      warn!("Domain state write failed (state kept in memory): {}", e);
    }
    result
  }
}
