//! Tool-call envelope parsing.
//!
//! Turns the raw JSON envelope a hook process receives (`tool_name`,
//! `session_id`, `tool_input`, optional `tool_response`) into file tokens
//! and an output size. Parsing is pure and total: malformed envelopes yield
//! an empty parse, never an error. File-size enrichment is the one impure
//! step and lives in its own helper so callers can skip it.

use crate::search::{parse_search_stats, result_paths, sanitize_term, scan_wrapped_search};
use aoa_core::{
  IntentRecord, MAX_FILES, ToolName, cmd_token, has_allowed_extension, is_path_token, line_range_suffix,
  pattern_token, strip_line_range,
};
use regex::Regex;
use std::sync::LazyLock;

/// `tool_input` keys that may carry a single path value, in scan order
const PATH_KEYS: &[&str] = &["file_path", "path", "file", "notebook_path"];

static COMMAND_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
  // Absolute paths with at least one embedded separator beyond the root
  Regex::new(r"(/[^\s:'\x22]+/[^\s:'\x22]+)").unwrap()
});

/// The result of parsing one envelope
#[derive(Debug, Clone, Default)]
pub struct ParsedEnvelope {
  pub tool: ToolName,
  pub session_id: String,
  pub tool_use_id: Option<String>,
  /// Ordered, deduplicated file tokens (capped at [`MAX_FILES`])
  pub files: Vec<String>,
  /// `#term` tag captured from a wrapped-search invocation
  pub search_tag: Option<String>,
  pub output_size: u64,
}

impl ParsedEnvelope {
  fn push_file(&mut self, token: impl Into<String>) {
    let token = token.into();
    if token.is_empty() || self.files.len() >= MAX_FILES || self.files.contains(&token) {
      return;
    }
    self.files.push(token);
  }

  /// Build an intent record from this parse
  pub fn into_record(self, timestamp: u64, project_id: impl Into<String>) -> IntentRecord {
    let mut record = IntentRecord::new(timestamp, self.session_id, self.tool);
    record.project_id = project_id.into();
    record.tool_use_id = self.tool_use_id;
    record.files = self.files;
    record.output_size = self.output_size;
    record
  }
}

/// Parse a tool-call envelope into file tokens and metadata
pub fn parse_envelope(envelope: &serde_json::Value) -> ParsedEnvelope {
  let mut parsed = ParsedEnvelope {
    tool: ToolName::from(
      envelope
        .get("tool_name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string(),
    ),
    session_id: envelope
      .get("session_id")
      .and_then(|v| v.as_str())
      .unwrap_or("default")
      .to_string(),
    tool_use_id: envelope
      .get("tool_use_id")
      .and_then(|v| v.as_str())
      .map(String::from),
    ..Default::default()
  };

  let empty = serde_json::json!({});
  let input = envelope.get("tool_input").unwrap_or(&empty);
  let response = envelope.get("tool_response");

  parsed.output_size = response.and_then(response_text).map(|t| t.len() as u64).unwrap_or(0);

  // Single-path keys, with a line-range suffix from sibling offset/limit
  let offset = input.get("offset").and_then(|v| v.as_u64());
  let limit = input.get("limit").and_then(|v| v.as_u64());
  for key in PATH_KEYS {
    if let Some(path) = input.get(*key).and_then(|v| v.as_str())
      && !path.is_empty()
    {
      match offset {
        Some(offset) => parsed.push_file(format!("{}{}", path, line_range_suffix(offset, limit))),
        None => parsed.push_file(path),
      }
    }
  }

  // Path sequences
  if let Some(paths) = input.get("paths").and_then(|v| v.as_array()) {
    for path in paths.iter().filter_map(|v| v.as_str()) {
      parsed.push_file(path);
    }
  }

  // Shell commands: wrapped-search capture plus bare source paths
  if let Some(command) = input.get("command").and_then(|v| v.as_str()) {
    let response_body = response.and_then(response_text).unwrap_or_default();

    if let Some(search) = scan_wrapped_search(command) {
      let (hits, time_ms) = parse_search_stats(&response_body);
      parsed.push_file(cmd_token(&search.search_type, command, hits, time_ms));

      if hits > 0 {
        for path in result_paths(&response_body, MAX_FILES) {
          parsed.push_file(path);
        }
      }
      if let Some(term) = search.term.as_deref() {
        let sanitized = sanitize_term(term);
        if !sanitized.is_empty() {
          parsed.search_tag = Some(format!("#{}", sanitized));
        }
      }
    }

    for caps in COMMAND_PATH_RE.captures_iter(command) {
      let path = caps[1].trim_end_matches(['.', ',', ';', ')']);
      if has_allowed_extension(path) {
        parsed.push_file(path);
      }
    }
  }

  // Search patterns
  if let Some(pattern) = input.get("pattern").and_then(|v| v.as_str())
    && (pattern.contains('/') || pattern.contains('*'))
  {
    parsed.push_file(pattern_token(pattern));
  }

  parsed
}

/// The textual body of a tool response: the string itself, a string
/// `content` field, or the canonical JSON encoding of anything else.
pub fn response_text(response: &serde_json::Value) -> Option<String> {
  match response {
    serde_json::Value::String(s) => Some(s.clone()),
    serde_json::Value::Null => None,
    other => match other.get("content").and_then(|v| v.as_str()) {
      Some(content) => Some(content.to_string()),
      None => Some(other.to_string()),
    },
  }
}

/// Stat each plain path token and record its byte size on the record.
/// Unreadable paths are omitted; nothing here can fail the caller.
pub fn enrich_file_sizes(record: &mut IntentRecord) {
  for token in &record.files {
    if !is_path_token(token) {
      continue;
    }
    let path = strip_line_range(token);
    if !path.starts_with('/') {
      continue;
    }
    if let Ok(meta) = std::fs::metadata(path) {
      record.file_sizes.insert(token.clone(), meta.len());
    }
  }
}
