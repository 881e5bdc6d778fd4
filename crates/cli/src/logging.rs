//! Logging setup for CLI commands, hook clients, and the daemon.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Console logging for interactive commands. Diagnostics go to stderr so
/// command output stays clean.
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .with_writer(std::io::stderr)
    .init();
}

/// Near-silent logging for hook clients: their stdout is consumed by the
/// agent, and they must stay quiet unless RUST_LOG asks otherwise.
pub fn init_hook_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::ERROR.into()))
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

/// Daemon logging: console in foreground mode, a daily-rolled file under
/// the project's data directory otherwise.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_daemon_logging(project_root: &Path, foreground: bool) -> Option<WorkerGuard> {
  let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

  if foreground {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_ansi(true)
      .init();
    return None;
  }

  let log_dir = aoa_core::data_dir(project_root);
  if std::fs::create_dir_all(&log_dir).is_err() {
    init_cli_logging();
    return None;
  }

  let file_appender = tracing_appender::rolling::daily(&log_dir, "aoa.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}
