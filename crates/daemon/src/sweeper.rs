//! Background sweeper for the prediction log.
//!
//! Expired prediction entries are folded into the rolling accuracy window on
//! a fixed tick. On shutdown the sweeper performs a final flush so the
//! window reflects everything that was outstanding.

use crate::state::now_epoch;
use std::sync::Arc;
use std::time::Duration;
use store::PredictionLog;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info};

/// Spawn the sweeper as a background task
pub fn spawn_sweeper(
  predictions: Arc<PredictionLog>,
  sweep_secs: u64,
  mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
  tokio::spawn(async move {
    let mut timer = interval(Duration::from_secs(sweep_secs.max(1)));
    timer.tick().await; // skip the immediate tick

    loop {
      tokio::select! {
        _ = timer.tick() => {
          let expired = predictions.sweep(now_epoch()).await;
          if expired > 0 {
            debug!("Swept {} expired predictions into the rolling window", expired);
          }
        }
        _ = shutdown_rx.recv() => {
          let flushed = predictions.flush_all().await;
          info!("Sweeper shut down, finalized {} outstanding predictions", flushed);
          break;
        }
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use aoa_core::TrackerConfig;

  #[tokio::test]
  async fn test_shutdown_flushes_outstanding() {
    let predictions = Arc::new(PredictionLog::new(&TrackerConfig::default()));
    predictions
      .log("s1", "prompt", vec!["/repo/a.py".to_string()], vec![], 0.5, now_epoch())
      .await;

    let (tx, rx) = broadcast::channel(1);
    let handle = spawn_sweeper(Arc::clone(&predictions), 3600, rx);

    tx.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(predictions.outstanding().await, 0);
    assert_eq!(predictions.metrics().await.evaluated, 1);
  }
}
