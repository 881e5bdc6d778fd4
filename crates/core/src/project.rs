//! Project identity and on-disk layout.
//!
//! A project is rooted at its git root (or the starting directory when no
//! git repository is found) and owns a `.aoa/` directory holding the home
//! document, the intent log, the domain state, and optional overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Find the git root directory by walking upward from the given path
pub fn find_git_root(path: &Path) -> Option<PathBuf> {
  let mut current = path.to_path_buf();

  loop {
    if current.join(".git").exists() {
      return Some(current);
    }

    if !current.pop() {
      return None;
    }
  }
}

/// Get the project root path, preferring git root over the given path
pub fn resolve_project_path(path: &Path) -> PathBuf {
  let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
  find_git_root(&canonical).unwrap_or(canonical)
}

/// The per-project data directory
pub fn data_dir(project_root: &Path) -> PathBuf {
  project_root.join(".aoa")
}

/// The project home document, written once by `aoa init` and read at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectHome {
  pub project_id: String,
  pub name: String,
  pub created_at: DateTime<Utc>,
}

impl ProjectHome {
  pub fn home_path(project_root: &Path) -> PathBuf {
    data_dir(project_root).join("home.json")
  }

  /// Read the home document; None when absent or unparseable
  pub fn load(project_root: &Path) -> Option<Self> {
    let content = std::fs::read_to_string(Self::home_path(project_root)).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Load the home document, creating it with a fresh id when absent.
  /// Idempotent: an existing document is returned untouched.
  pub fn load_or_init(project_root: &Path) -> crate::Result<Self> {
    if let Some(existing) = Self::load(project_root) {
      return Ok(existing);
    }

    let name = project_root
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| "project".to_string());

    let home = Self {
      project_id: uuid::Uuid::new_v4().to_string(),
      name,
      created_at: Utc::now(),
    };

    let path = Self::home_path(project_root);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_string_pretty(&home)?)?;

    Ok(home)
  }
}
