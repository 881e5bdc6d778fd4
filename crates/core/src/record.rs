//! Intent records: the normalized observation of one tool invocation.
//!
//! A record's `files` list carries *file tokens*: absolute paths (optionally
//! suffixed with a `:START-END` or `:START+` line range), `pattern:<glob>`
//! search patterns, or `cmd:aoa:...` tokens describing a wrapped search
//! invocation. Helpers here own the token grammar so every crate formats and
//! strips tokens the same way.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum file tokens kept on a single record
pub const MAX_FILES: usize = 20;

/// Extensions recognized as source files when scanning commands and output
pub const ALLOWED_EXTENSIONS: &[&str] = &[
  "py", "js", "ts", "tsx", "jsx", "go", "rs", "java", "cpp", "c", "h", "md", "json", "yaml", "yml", "sh", "sql",
];

/// Tool names from the agent's closed set, with a catch-all for the rest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ToolName {
  Read,
  Edit,
  Write,
  Bash,
  Grep,
  Glob,
  Task,
  Predict,
  Other(String),
}

impl ToolName {
  /// The tool-action tag for this tool, if one is defined
  pub fn action_tag(&self) -> Option<&'static str> {
    match self {
      ToolName::Read => Some("#reading"),
      ToolName::Edit => Some("#editing"),
      ToolName::Write => Some("#creating"),
      ToolName::Bash => Some("#executing"),
      ToolName::Grep | ToolName::Glob => Some("#searching"),
      ToolName::Task => Some("#delegating"),
      ToolName::Predict => Some("#predicting"),
      ToolName::Other(_) => None,
    }
  }

  /// Whether this tool reads or writes files directly (drives hit tracking)
  pub fn accesses_files(&self) -> bool {
    matches!(self, ToolName::Read | ToolName::Edit | ToolName::Write)
  }

  pub fn as_str(&self) -> &str {
    match self {
      ToolName::Read => "Read",
      ToolName::Edit => "Edit",
      ToolName::Write => "Write",
      ToolName::Bash => "Bash",
      ToolName::Grep => "Grep",
      ToolName::Glob => "Glob",
      ToolName::Task => "Task",
      ToolName::Predict => "Predict",
      ToolName::Other(name) => name,
    }
  }
}

impl Default for ToolName {
  fn default() -> Self {
    ToolName::Other("unknown".to_string())
  }
}

impl From<String> for ToolName {
  fn from(s: String) -> Self {
    match s.as_str() {
      "Read" => ToolName::Read,
      "Edit" => ToolName::Edit,
      "Write" => ToolName::Write,
      "Bash" => ToolName::Bash,
      "Grep" => ToolName::Grep,
      "Glob" => ToolName::Glob,
      "Task" => ToolName::Task,
      "Predict" => ToolName::Predict,
      _ => ToolName::Other(s),
    }
  }
}

impl From<ToolName> for String {
  fn from(tool: ToolName) -> Self {
    tool.as_str().to_string()
  }
}

impl std::fmt::Display for ToolName {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One tool invocation, normalized. Append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
  /// Seconds since epoch, non-decreasing within a single writer
  pub timestamp: u64,
  pub session_id: String,
  #[serde(default)]
  pub project_id: String,
  pub tool: ToolName,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tool_use_id: Option<String>,
  /// Ordered, deduplicated file tokens, capped at [`MAX_FILES`]
  #[serde(default)]
  pub files: Vec<String>,
  /// `#`-prefixed tags: at most one tool-action tag plus semantic tags
  #[serde(default)]
  pub tags: Vec<String>,
  /// Byte size per file token at observation time (absent when unreadable)
  #[serde(default, skip_serializing_if = "HashMap::is_empty")]
  pub file_sizes: HashMap<String, u64>,
  /// Bytes the tool returned to the agent (0 when unknown)
  #[serde(default)]
  pub output_size: u64,
}

impl IntentRecord {
  pub fn new(timestamp: u64, session_id: impl Into<String>, tool: ToolName) -> Self {
    Self {
      timestamp,
      session_id: session_id.into(),
      project_id: String::new(),
      tool,
      tool_use_id: None,
      files: Vec::new(),
      tags: Vec::new(),
      file_sizes: HashMap::new(),
      output_size: 0,
    }
  }

  /// Push a file token, preserving order, skipping duplicates, honoring the cap
  pub fn push_file(&mut self, token: impl Into<String>) {
    let token = token.into();
    if token.is_empty() || self.files.len() >= MAX_FILES || self.files.contains(&token) {
      return;
    }
    self.files.push(token);
  }

  /// Push a tag, skipping duplicates and empty strings
  pub fn push_tag(&mut self, tag: impl Into<String>) {
    let tag = tag.into();
    if tag.is_empty() || tag == "#" || self.tags.contains(&tag) {
      return;
    }
    self.tags.push(tag);
  }
}

/// Whether a token is a plain path (not a `pattern:` or `cmd:` token)
pub fn is_path_token(token: &str) -> bool {
  !token.starts_with("pattern:") && !token.starts_with("cmd:")
}

/// Format the line-range suffix for an offset and optional limit
pub fn line_range_suffix(offset: u64, limit: Option<u64>) -> String {
  match limit {
    Some(limit) => format!(":{}-{}", offset, offset + limit),
    None => format!(":{}+", offset),
  }
}

/// Strip a trailing `:START-END` or `:START+` line range, if present
pub fn strip_line_range(token: &str) -> &str {
  let Some(idx) = token.rfind(':') else {
    return token;
  };
  let suffix = &token[idx + 1..];
  if suffix.is_empty() {
    return token;
  }
  let is_range = match suffix.strip_suffix('+') {
    Some(start) => !start.is_empty() && start.bytes().all(|b| b.is_ascii_digit()),
    None => match suffix.split_once('-') {
      Some((start, end)) => {
        !start.is_empty()
          && !end.is_empty()
          && start.bytes().all(|b| b.is_ascii_digit())
          && end.bytes().all(|b| b.is_ascii_digit())
      }
      None => false,
    },
  };
  if is_range { &token[..idx] } else { token }
}

/// Escape a command string for embedding in a colon-delimited `cmd:` token
pub fn escape_cmd(command: &str) -> String {
  command.replace('\\', "\\\\").replace(':', "\\:")
}

/// Reverse [`escape_cmd`]
pub fn unescape_cmd(escaped: &str) -> String {
  let mut out = String::with_capacity(escaped.len());
  let mut chars = escaped.chars();
  while let Some(ch) = chars.next() {
    if ch == '\\' {
      match chars.next() {
        Some(next) => out.push(next),
        None => out.push(ch),
      }
    } else {
      out.push(ch);
    }
  }
  out
}

/// Compose a `cmd:aoa:<type>:<command>:<hits>:<ms>` token
pub fn cmd_token(search_type: &str, command: &str, hits: u64, time_ms: u64) -> String {
  format!("cmd:aoa:{}:{}:{}:{}", search_type, escape_cmd(command), hits, time_ms)
}

/// Compose a `pattern:<glob>` token
pub fn pattern_token(pattern: &str) -> String {
  format!("pattern:{}", pattern)
}

/// Whether a path (line range already stripped) ends in an allowed extension
pub fn has_allowed_extension(path: &str) -> bool {
  let Some(idx) = path.rfind('.') else {
    return false;
  };
  let ext = path[idx + 1..].to_ascii_lowercase();
  ALLOWED_EXTENSIONS.contains(&ext.as_str())
}
