//! Daemon lifecycle: wire the singletons together, serve, shut down clean.

use crate::learner::DomainLearner;
use crate::routes::router;
use crate::server::Server;
use crate::state::AppState;
use crate::sweeper::spawn_sweeper;
use aoa_core::{Config, DomainState, PatternLibrary, ProjectHome, data_dir};
use std::path::PathBuf;
use std::sync::Arc;
use store::{DomainStore, IntentStore, PredictionLog};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LifecycleError {
  #[error("Config error: {0}")]
  Config(String),
  #[error("Server error: {0}")]
  Server(#[from] crate::server::ServerError),
}

/// Daemon lifecycle manager: one process per project
pub struct Daemon {
  config: Config,
  state: Arc<AppState>,
}

impl Daemon {
  /// Assemble the daemon for a project root. Fails only when the project
  /// identity cannot be established (the one configuration-load failure
  /// that warrants a non-zero exit).
  pub fn new(project_root: PathBuf, config: Config) -> Result<Self, LifecycleError> {
    let home = ProjectHome::load_or_init(&project_root)
      .map_err(|e| LifecycleError::Config(format!("project home at {:?}: {}", project_root, e)))?;

    let aoa_dir = data_dir(&project_root);
    let store = Arc::new(IntentStore::open(
      aoa_dir.join("intent-data.json"),
      config.store.max_records,
    ));
    let predictions = Arc::new(PredictionLog::new(&config.tracker));

    let library = PatternLibrary::load(&project_root);
    let domains = DomainStore::open(DomainState::state_path(&project_root));
    let learner = Arc::new(DomainLearner::new(config.learner.clone(), library, domains));

    let state = Arc::new(AppState::new(
      config.clone(),
      home.project_id,
      store,
      predictions,
      learner,
    ));

    Ok(Self { config, state })
  }

  pub fn state(&self) -> Arc<AppState> {
    Arc::clone(&self.state)
  }

  /// Run until ctrl-c/SIGTERM, then drain, flush, and finalize
  pub async fn run(&self) -> Result<(), LifecycleError> {
    info!("Starting aoa daemon for project {}", self.state.project_id);

    // Fold persisted learned domains into the matcher before serving
    self.state.learner.warm().await;

    let server = Server::new(
      router(self.state()),
      self.config.server.port,
      self.config.server.shutdown_grace_secs,
    );
    let shutdown = server.shutdown_handle();

    let sweeper = spawn_sweeper(
      Arc::clone(&self.state.predictions),
      self.config.tracker.sweep_secs,
      shutdown.subscribe(),
    );

    let signal_handle = shutdown.clone();
    tokio::spawn(async move {
      wait_for_signal().await;
      info!("Shutdown signal received");
      signal_handle.shutdown();
    });

    let result = server.run().await;

    // Final flush: the store document and the hit/miss window
    self.state.store.flush().await;
    if let Err(e) = sweeper.await {
      warn!("Sweeper task ended abnormally: {}", e);
    }

    result.map_err(LifecycleError::from)
  }
}

async fn wait_for_signal() {
  let ctrl_c = async {
    let _ = tokio::signal::ctrl_c().await;
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut signal) => {
        signal.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }
}
