//! Semantic tag inference.
//!
//! Derives `#`-prefixed tags for a parsed record from its tool, its file
//! tokens, and the pattern library. Deterministic: the same record and
//! library always produce the same tag list.

use aoa_core::{PatternLibrary, ToolName, is_path_token, strip_line_range};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Class-name suffixes that hint at a file's role. At most one suffix tag
/// is contributed per file token.
const CLASS_SUFFIXES: &[(&str, &str)] = &[
  ("service", "#services"),
  ("controller", "#api"),
  ("handler", "#api"),
  ("repository", "#data"),
  ("manager", "#services"),
  ("factory", "#services"),
  ("provider", "#services"),
  ("component", "#frontend"),
  ("widget", "#frontend"),
  ("helper", "#utilities"),
  ("util", "#utilities"),
  ("test", "#testing"),
  ("spec", "#testing"),
];

/// Broad-category fallback, consulted only when nothing semantic matched.
/// The first matching row contributes its tags and iteration stops.
static FALLBACK_PATTERNS: LazyLock<Vec<(Regex, &'static [&'static str])>> = LazyLock::new(|| {
  let rows: &[(&str, &[&str])] = &[
    (r"auth|login|session|oauth|jwt|password", &["#authentication", "#security"]),
    (r"test[s]?[/_]|_test\.|\bspec[s]?\b|pytest|unittest", &["#testing"]),
    (r"config|settings|\.env|\.yaml|\.yml|\.json", &["#configuration"]),
    (r"api|endpoint|route|handler|controller", &["#api"]),
    (r"index|search|query|grep|find", &["#search"]),
    (r"model|schema|entity|db|database|migration|sql", &["#data"]),
    (r"component|view|template|page|ui|style|css|html", &["#frontend"]),
    (r"deploy|docker|k8s|ci|cd|pipeline|github", &["#devops"]),
    (r"error|exception|catch|throw|raise|fail", &["#errors"]),
    (r"log|debug|trace|print|console", &["#logging"]),
    (r"cache|redis|memory|store", &["#caching"]),
    (r"async|await|promise|thread|concurrent", &["#async"]),
    (r"hook|plugin|extension|middleware", &["#hooks"]),
    (r"doc|readme|comment|docstring", &["#documentation"]),
    (r"util|helper|common|shared|lib", &["#utilities"]),
  ];
  rows
    .iter()
    .map(|(pattern, tags)| (Regex::new(pattern).unwrap(), *tags))
    .collect()
});

/// Infer the tag set for a record
pub fn infer_tags(
  tool: &ToolName,
  files: &[String],
  library: &PatternLibrary,
  search_tag: Option<&str>,
) -> Vec<String> {
  let mut tags: Vec<String> = Vec::new();
  let push = |tags: &mut Vec<String>, tag: String| {
    if !tag.is_empty() && tag != "#" && !tags.contains(&tag) {
      tags.push(tag);
    }
  };

  if let Some(action) = tool.action_tag() {
    push(&mut tags, action.to_string());
  }

  let paths: Vec<&str> = files
    .iter()
    .map(String::as_str)
    .filter(|t| is_path_token(t))
    .map(strip_line_range)
    .collect();

  // Token-level reverse-index probes
  for token in tokenize_paths(&paths) {
    if let Some(domain) = library.domain_of_token(&token) {
      push(&mut tags, PatternLibrary::tag_of(domain));
    }
  }

  // Substring scan over the joined token text catches multi-word matches
  // that token splitting breaks apart
  let joined = paths.join(" ").to_lowercase();
  for domain in library.domains_in_text(&joined) {
    push(&mut tags, PatternLibrary::tag_of(domain));
  }

  // Class-suffix hints, one per file
  for path in &paths {
    if let Some(tag) = suffix_tag(path) {
      push(&mut tags, tag.to_string());
    }
  }

  // Fallback: only the tool-action tag so far means nothing semantic matched
  let only_action = tags.len() <= 1;
  if only_action && !joined.is_empty() {
    for (regex, fallback_tags) in FALLBACK_PATTERNS.iter() {
      if regex.is_match(&joined) {
        for tag in *fallback_tags {
          push(&mut tags, tag.to_string());
        }
        break;
      }
    }
  }

  if let Some(term_tag) = search_tag {
    push(&mut tags, term_tag.to_string());
  }

  tags
}

/// Split path tokens into lowercase word tokens: separators first
/// (`/ _ - . whitespace`), then CamelCase runs. First-seen order.
fn tokenize_paths(paths: &[&str]) -> Vec<String> {
  let mut seen = HashSet::new();
  let mut tokens = Vec::new();

  for path in paths {
    for part in path.split(['/', '_', '-', '.', ' ', '\t']) {
      if part.is_empty() {
        continue;
      }
      for word in split_camel(part) {
        let word = word.to_lowercase();
        if word.len() >= 2 && seen.insert(word.clone()) {
          tokens.push(word);
        }
      }
    }
  }

  tokens
}

/// Split a CamelCase run into its words; plain words pass through
fn split_camel(word: &str) -> Vec<String> {
  let mut words = Vec::new();
  let mut current = String::new();

  for ch in word.chars() {
    if ch.is_uppercase() && !current.is_empty() {
      words.push(std::mem::take(&mut current));
    }
    current.push(ch);
  }
  if !current.is_empty() {
    words.push(current);
  }

  words
}

/// The suffix tag for a file token's basename, extension stripped
fn suffix_tag(path: &str) -> Option<&'static str> {
  let basename = path.rsplit('/').next().unwrap_or(path);
  let stem = basename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(basename);
  let stem = stem.to_lowercase();

  CLASS_SUFFIXES
    .iter()
    .find(|(suffix, _)| stem.ends_with(suffix) && !stem.is_empty())
    .map(|(_, tag)| *tag)
}
