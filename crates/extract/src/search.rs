//! Wrapped-search command scanning.
//!
//! Bash records may invoke the `aoa` search wrapper; those invocations are
//! captured as `cmd:aoa:...` tokens instead of raw command text, and the
//! search results in the tool response contribute file tokens and a `#term`
//! search tag.

use aoa_core::has_allowed_extension;
use regex::Regex;
use std::sync::LazyLock;

/// Subcommands of the search wrapper that get captured
pub const SEARCH_SUBCOMMANDS: &[&str] = &[
  "grep", "egrep", "find", "tree", "locate", "head", "tail", "lines", "hot", "touched", "focus", "predict", "outline",
  "search", "multi", "pattern",
];

static WRAPPED_RE: LazyLock<Regex> = LazyLock::new(|| {
  let subcommands = SEARCH_SUBCOMMANDS.join("|");
  Regex::new(&format!(
    r#"\baoa\s+({})\b(?:\s+(-\w)\b)?(?:\s+("[^"\n]{{1,60}}"|'[^'\n]{{1,60}}'|[^\s;|&<>]{{1,60}}))?"#,
    subcommands
  ))
  .unwrap()
});

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap());

static HITS_BAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*hits\s*[│|]\s*(\d+)\s*ms").unwrap());

static HITS_MATCHED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*matched,\s*(\d+)\s*ms").unwrap());

static RESULT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s+([^\s:]+):(\d+)").unwrap());

/// A wrapped-search invocation found in a shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedSearch {
  pub search_type: String,
  pub term: Option<String>,
}

/// Scan a shell command for the *last* wrapped-search invocation
pub fn scan_wrapped_search(command: &str) -> Option<WrappedSearch> {
  let caps = WRAPPED_RE.captures_iter(command).last()?;

  let subcommand = caps.get(1)?.as_str();
  let flag = caps.get(2).map(|m| m.as_str());
  let term = caps.get(3).map(|m| {
    let raw = m.as_str().trim_matches(|c| c == '"' || c == '\'');
    raw.chars().take(40).collect::<String>()
  });
  let term = term.filter(|t| !t.is_empty());

  Some(WrappedSearch {
    search_type: classify_search(subcommand, flag, term.as_deref()),
    term,
  })
}

/// Classify a wrapped-search invocation into its search type
pub fn classify_search(subcommand: &str, flag: Option<&str>, term: Option<&str>) -> String {
  match subcommand {
    "grep" => {
      if flag == Some("-a") {
        "multi-and"
      } else if flag == Some("-E") {
        "regex"
      } else if term.is_some_and(|t| t.contains(' ') || t.contains('|')) {
        "multi-or"
      } else {
        "indexed"
      }
    }
    "egrep" => "regex",
    "multi" => "multi-and",
    other => other,
  }
  .to_string()
}

/// Remove ANSI escape sequences
pub fn strip_ansi(text: &str) -> String {
  ANSI_RE.replace_all(text, "").into_owned()
}

/// Parse `(hits, time_ms)` from a wrapper's response summary line, accepting
/// either `N hits │ Tms` or `N matched, Tms`. Defaults to zero.
pub fn parse_search_stats(response: &str) -> (u64, u64) {
  let clean = strip_ansi(response);

  for re in [&*HITS_BAR_RE, &*HITS_MATCHED_RE] {
    if let Some(caps) = re.captures(&clean) {
      let hits = caps[1].parse().unwrap_or(0);
      let ms = caps[2].parse().unwrap_or(0);
      return (hits, ms);
    }
  }

  (0, 0)
}

/// Collect result paths from a wrapper response: indented `path:linenum`
/// lines whose path ends in an allowed extension. First-seen order, capped.
pub fn result_paths(response: &str, cap: usize) -> Vec<String> {
  let clean = strip_ansi(response);
  let mut paths = Vec::new();

  for caps in RESULT_LINE_RE.captures_iter(&clean) {
    let path = &caps[1];
    if !has_allowed_extension(path) {
      continue;
    }
    if !paths.iter().any(|p| p == path) {
      paths.push(path.to_string());
      if paths.len() >= cap {
        break;
      }
    }
  }

  paths
}

/// Sanitize a search term into tag form: word characters only, at most 20
pub fn sanitize_term(term: &str) -> String {
  term
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
    .take(20)
    .collect::<String>()
    .to_lowercase()
}
