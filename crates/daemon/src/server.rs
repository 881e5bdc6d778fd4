//! Loopback HTTP server with graceful shutdown.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Server shutdown")]
  Shutdown,
}

/// Handle to signal server shutdown
#[derive(Clone)]
pub struct ShutdownHandle {
  tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
  pub fn shutdown(&self) {
    let _ = self.tx.send(());
  }

  pub fn subscribe(&self) -> broadcast::Receiver<()> {
    self.tx.subscribe()
  }
}

/// HTTP server for the daemon facade
pub struct Server {
  router: axum::Router,
  port: u16,
  grace: Duration,
  shutdown_tx: broadcast::Sender<()>,
}

impl Server {
  pub fn new(router: axum::Router, port: u16, grace_secs: u64) -> Self {
    let (shutdown_tx, _) = broadcast::channel(1);
    Self {
      router,
      port,
      grace: Duration::from_secs(grace_secs),
      shutdown_tx,
    }
  }

  /// Get a shutdown handle to signal server shutdown
  pub fn shutdown_handle(&self) -> ShutdownHandle {
    ShutdownHandle {
      tx: self.shutdown_tx.clone(),
    }
  }

  /// Run the server until shutdown is signaled, then stop accepting and
  /// drain in-flight handlers within the grace deadline.
  pub async fn run(self) -> Result<(), ServerError> {
    let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("Daemon listening on http://{}", local);

    let mut drain_rx = self.shutdown_tx.subscribe();
    let mut signal_rx = self.shutdown_tx.subscribe();

    let serve = axum::serve(listener, self.router).with_graceful_shutdown(async move {
      let _ = signal_rx.recv().await;
    });
    let mut serving = tokio::spawn(async move { serve.await });

    tokio::select! {
      // Shutdown signaled: stop accepting, drain within the grace deadline
      _ = drain_rx.recv() => {
        match tokio::time::timeout(self.grace, &mut serving).await {
          Ok(joined) => {
            joined.map_err(|e| ServerError::Io(std::io::Error::other(e)))??;
          }
          Err(_) => {
            warn!("Drain deadline exceeded, aborting in-flight handlers");
            serving.abort();
          }
        }
      }
      // The accept loop ended on its own (error or listener closed)
      joined = &mut serving => {
        joined.map_err(|e| ServerError::Io(std::io::Error::other(e)))??;
      }
    }

    info!("Daemon stopped");
    Ok(())
  }
}
