pub mod config;
pub mod error;
pub mod library;
pub mod project;
pub mod record;

pub use config::{Config, LearnerConfig, PredictConfig, ServerConfig, StoreConfig, TrackerConfig};
pub use error::{Error, Result};
pub use library::{
  Domain, DomainState, LearnedDomain, LearningSnapshot, PatternLibrary, ProposedDomain, validate_proposed,
};
pub use project::{ProjectHome, data_dir, find_git_root, resolve_project_path};
pub use record::{
  ALLOWED_EXTENSIONS, IntentRecord, MAX_FILES, ToolName, cmd_token, escape_cmd, has_allowed_extension, is_path_token,
  line_range_suffix, pattern_token, strip_line_range, unescape_cmd,
};
