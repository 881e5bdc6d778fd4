//! Configuration with per-project overrides.
//!
//! Config priority: project-relative (.aoa/aoa.toml) > user (~/.config/aoa/config.toml) > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// HTTP facade settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Loopback port the daemon listens on (default: 8080)
  pub port: u16,

  /// Bounded drain deadline for in-flight handlers at shutdown (default: 5)
  pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: 8080,
      shutdown_grace_secs: 5,
    }
  }
}

/// Intent store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Retained record cap; the head of the log is truncated past this (default: 500)
  pub max_records: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self { max_records: 500 }
  }
}

/// Predictor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
  /// Below this many stored records, predictions are empty (default: 5)
  pub min_records: usize,

  /// Candidates returned per prediction (default: 3)
  pub default_limit: usize,

  /// Keywords considered per prompt (default: 10)
  pub max_keywords: usize,

  /// Snippet length in lines (default: 15)
  pub snippet_lines: usize,

  /// Snippet byte ceiling (default: 4096)
  pub snippet_max_bytes: usize,

  /// Recency half-life in seconds (default: 3600)
  pub half_life_secs: u64,

  /// Direct path-substring match weight (α)
  pub direct_weight: f64,

  /// Tag-overlap weight (β)
  pub tag_weight: f64,

  /// Frequency-times-recency weight (γ)
  pub freq_weight: f64,
}

impl Default for PredictConfig {
  fn default() -> Self {
    Self {
      min_records: 5,
      default_limit: 3,
      max_keywords: 10,
      snippet_lines: 15,
      snippet_max_bytes: 4096,
      half_life_secs: 3600,
      direct_weight: 5.0,
      tag_weight: 2.0,
      freq_weight: 1.0,
    }
  }
}

/// Hit/miss tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
  /// Prediction window before an entry is evaluated (default: 900 = 15 min)
  pub expiry_secs: u64,

  /// Rolling window of evaluated predictions (default: 50)
  pub window: usize,

  /// Below this many evaluated predictions, metrics report calibrating (default: 3)
  pub min_evaluated: usize,

  /// Hard ceiling on outstanding prediction-log entries (default: 200)
  pub max_outstanding: usize,

  /// Sweeper tick interval (default: 30)
  pub sweep_secs: u64,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      expiry_secs: 900,
      window: 50,
      min_evaluated: 3,
      max_outstanding: 200,
      sweep_secs: 30,
    }
  }
}

/// Domain learner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
  /// Appends per learning cycle (default: 100)
  pub learn_threshold: u64,

  /// Orphan tags required before learning is flagged (default: 5)
  pub min_orphans: usize,

  /// Appends per tuning pass (default: 50)
  pub tune_threshold: u64,

  /// Match-rate above which a term is pruned as too broad (default: 0.3)
  pub prune_match_rate: f64,
}

impl Default for LearnerConfig {
  fn default() -> Self {
    Self {
      learn_threshold: 100,
      min_orphans: 5,
      tune_threshold: 50,
      prune_match_rate: 0.3,
    }
  }
}

/// aoa configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,

  #[serde(default)]
  pub store: StoreConfig,

  #[serde(default)]
  pub predict: PredictConfig,

  #[serde(default)]
  pub tracker: TrackerConfig,

  #[serde(default)]
  pub learner: LearnerConfig,
}

impl Config {
  /// Load config for a project, with fallback to user config, then defaults
  pub fn load_for_project(project_path: &Path) -> Self {
    let project_config = Self::project_config_path(project_path);
    if project_config.exists()
      && let Ok(content) = std::fs::read_to_string(&project_config)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(content) = std::fs::read_to_string(&user_config_path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }

    Self::default()
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AOA_CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("aoa").join("config.toml"))
  }

  /// Get the project-relative config path
  pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join(".aoa").join("aoa.toml")
  }

  /// Base URL clients use to reach the daemon; `AOA_URL` overrides the
  /// configured loopback port.
  pub fn base_url(&self) -> String {
    if let Ok(url) = std::env::var("AOA_URL") {
      return url.trim_end_matches('/').to_string();
    }
    format!("http://127.0.0.1:{}", self.server.port)
  }
}
