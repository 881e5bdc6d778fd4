pub mod domains;
pub mod intent;
pub mod predictions;

pub use domains::DomainStore;
pub use intent::{FileActivity, IntentStore, StoreStats};
pub use predictions::{PredictionEntry, PredictionLog, RollingMetrics};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
