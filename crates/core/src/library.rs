//! Pattern library and domain-learning state.
//!
//! The library maps semantic domains to lowercase match strings and is
//! immutable after load. Learned domains, pruned terms, orphan tags, and the
//! learning counters live in a separate [`DomainState`] document that
//! supplements the loaded library; [`PatternLibrary::effective`] folds the
//! two together into the index used for matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// One named cluster of semantic terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
  pub name: String,
  /// `semantic_term -> [match strings]`, all lowercase
  pub terms: BTreeMap<String, Vec<String>>,
}

impl Domain {
  pub fn new(name: impl Into<String>, terms: BTreeMap<String, Vec<String>>) -> Self {
    Self { name: name.into(), terms }
  }

  /// All match strings for this domain, in term order
  pub fn matches(&self) -> impl Iterator<Item = &str> {
    self.terms.values().flatten().map(String::as_str)
  }
}

/// Loaded pattern library with a derived reverse index.
///
/// The reverse index is laid out as parallel arrays with a hash probe into
/// them, so exact lookups are single probes and prefix/substring scans walk
/// a flat string table.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
  domains: Vec<Domain>,
  matches: Vec<String>,
  match_domains: Vec<usize>,
  index: HashMap<String, usize>,
}

impl PatternLibrary {
  /// Build a library from domains, lowercasing matches and resolving
  /// collisions in favor of the first domain defined.
  pub fn from_domains(domains: Vec<Domain>) -> Self {
    let mut library = Self {
      domains: Vec::with_capacity(domains.len()),
      matches: Vec::new(),
      match_domains: Vec::new(),
      index: HashMap::new(),
    };

    for mut domain in domains {
      domain.name = normalize_domain_name(&domain.name);
      if domain.name.is_empty() {
        continue;
      }
      for matches in domain.terms.values_mut() {
        for m in matches.iter_mut() {
          *m = m.to_lowercase();
        }
        matches.retain(|m| !m.is_empty());
      }

      let domain_idx = library.domains.len();
      for m in domain.matches() {
        if library.index.contains_key(m) {
          continue; // first domain wins
        }
        library.index.insert(m.to_string(), library.matches.len());
        library.matches.push(m.to_string());
        library.match_domains.push(domain_idx);
      }
      library.domains.push(domain);
    }

    library
  }

  /// The compiled-in default library
  pub fn builtin() -> Self {
    Self::from_domains(builtin_domains())
  }

  /// Load the library document from the ordered search path: project config
  /// directory, then user config directory, then the compiled-in defaults.
  /// Unreadable or malformed documents fall through to the next source.
  pub fn load(project_root: &Path) -> Self {
    let candidates = [
      Some(project_root.join(".aoa").join("patterns.json")),
      user_patterns_path(),
    ];

    for path in candidates.into_iter().flatten() {
      if !path.exists() {
        continue;
      }
      if let Ok(content) = std::fs::read_to_string(&path)
        && let Ok(doc) = serde_json::from_str::<serde_json::Value>(&content)
        && let Some(domains) = parse_library_doc(&doc)
      {
        return Self::from_domains(domains);
      }
    }

    Self::builtin()
  }

  /// Fold domain state into this library: learned domains are appended and
  /// pruned terms are removed. Returns a fresh library with a rebuilt index.
  pub fn effective(&self, state: &DomainState) -> Self {
    let pruned: HashSet<&str> = state.pruned_terms.iter().map(String::as_str).collect();

    let mut domains: Vec<Domain> = self
      .domains
      .iter()
      .map(|d| {
        let terms = d
          .terms
          .iter()
          .map(|(term, matches)| {
            let kept: Vec<String> = matches.iter().filter(|m| !pruned.contains(m.as_str())).cloned().collect();
            (term.clone(), kept)
          })
          .filter(|(_, matches)| !matches.is_empty())
          .collect();
        Domain::new(d.name.clone(), terms)
      })
      .filter(|d| !d.terms.is_empty())
      .collect();

    for learned in &state.learned {
      let terms = learned
        .terms
        .iter()
        .filter(|t| !pruned.contains(t.as_str()))
        .map(|t| (t.clone(), vec![t.clone()]))
        .collect::<BTreeMap<_, _>>();
      if !terms.is_empty() {
        domains.push(Domain::new(learned.name.clone(), terms));
      }
    }

    Self::from_domains(domains)
  }

  pub fn domains(&self) -> &[Domain] {
    &self.domains
  }

  pub fn is_empty(&self) -> bool {
    self.domains.is_empty()
  }

  pub fn has_domain(&self, name: &str) -> bool {
    let name = normalize_domain_name(name);
    self.domains.iter().any(|d| d.name == name)
  }

  /// Every match string across every domain (for global-uniqueness checks)
  pub fn all_terms(&self) -> HashSet<String> {
    self.matches.iter().cloned().collect()
  }

  /// Resolve a lowercase token to a domain: exact probe first, then the
  /// first match string that is a prefix of the token.
  pub fn domain_of_token(&self, token: &str) -> Option<&str> {
    if let Some(&idx) = self.index.get(token) {
      return Some(&self.domains[self.match_domains[idx]].name);
    }
    self
      .matches
      .iter()
      .position(|m| token.starts_with(m.as_str()))
      .map(|idx| self.domains[self.match_domains[idx]].name.as_str())
  }

  /// Domains whose match strings appear as substrings of the given
  /// (pre-lowercased) text, in library order, deduplicated.
  pub fn domains_in_text(&self, text: &str) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for (idx, m) in self.matches.iter().enumerate() {
      if text.contains(m.as_str()) {
        let name = self.domains[self.match_domains[idx]].name.as_str();
        if seen.insert(name) {
          found.push(name);
        }
      }
    }
    found
  }

  /// The tag contributed by a domain (`caching` -> `#caching`)
  pub fn tag_of(name: &str) -> String {
    format!("#{}", normalize_domain_name(name))
  }

  /// Whether a `#tag` corresponds to a domain in this library
  pub fn is_domain_tag(&self, tag: &str) -> bool {
    tag
      .strip_prefix('#')
      .map(|name| self.domains.iter().any(|d| d.name == name))
      .unwrap_or(false)
  }
}

/// Strip `@`/`#` decoration and lowercase
fn normalize_domain_name(name: &str) -> String {
  name.trim_start_matches(['@', '#']).to_lowercase()
}

fn user_patterns_path() -> Option<PathBuf> {
  if let Ok(dir) = std::env::var("AOA_CONFIG_DIR") {
    return Some(PathBuf::from(dir).join("patterns.json"));
  }
  dirs::config_dir().map(|p| p.join("aoa").join("patterns.json"))
}

/// Parse either library document shape: a bare array of `{name, terms}` or
/// an object `{domains: [...], _meta: ...}`. `terms` may be a map
/// `term -> [matches]` or a flat list of matches.
fn parse_library_doc(doc: &serde_json::Value) -> Option<Vec<Domain>> {
  let entries = match doc {
    serde_json::Value::Array(entries) => entries,
    serde_json::Value::Object(obj) => obj.get("domains")?.as_array()?,
    _ => return None,
  };

  let mut domains = Vec::new();
  for entry in entries {
    let Some(name) = entry.get("name").and_then(|v| v.as_str()) else {
      continue;
    };
    let mut terms = BTreeMap::new();
    match entry.get("terms") {
      Some(serde_json::Value::Object(map)) => {
        for (term, matches) in map {
          let matches: Vec<String> = match matches {
            serde_json::Value::Array(items) => items
              .iter()
              .filter_map(|v| v.as_str())
              .map(|s| s.to_lowercase())
              .collect(),
            serde_json::Value::String(s) => vec![s.to_lowercase()],
            _ => continue,
          };
          if !matches.is_empty() {
            terms.insert(term.to_lowercase(), matches);
          }
        }
      }
      Some(serde_json::Value::Array(items)) => {
        for item in items.iter().filter_map(|v| v.as_str()) {
          let m = item.to_lowercase();
          terms.insert(m.clone(), vec![m]);
        }
      }
      _ => {}
    }
    if !terms.is_empty() {
      domains.push(Domain::new(name, terms));
    }
  }

  if domains.is_empty() { None } else { Some(domains) }
}

fn domain(name: &str, terms: &[(&str, &[&str])]) -> Domain {
  Domain::new(
    name,
    terms
      .iter()
      .map(|(term, matches)| (term.to_string(), matches.iter().map(|m| m.to_string()).collect()))
      .collect(),
  )
}

/// Default domains shipped with the daemon. Broad developer vocabulary;
/// project- and user-level documents replace this wholesale.
fn builtin_domains() -> Vec<Domain> {
  vec![
    domain(
      "authentication",
      &[
        ("identity", &["auth", "login", "credential"]),
        ("tokens", &["oauth", "jwt", "password"]),
      ],
    ),
    domain(
      "testing",
      &[("tests", &["test", "spec", "fixture"]), ("runners", &["pytest", "unittest"])],
    ),
    domain("configuration", &[("config", &["config", "settings", "dotenv"])]),
    domain(
      "api",
      &[
        ("surface", &["api", "endpoint", "route"]),
        ("dispatch", &["handler", "controller"]),
      ],
    ),
    domain(
      "search",
      &[("lookup", &["search", "query", "index"]), ("tools", &["grep", "glob"])],
    ),
    domain(
      "data",
      &[
        ("modeling", &["model", "schema", "entity"]),
        ("storage", &["database", "migration", "sql"]),
      ],
    ),
    domain(
      "frontend",
      &[
        ("structure", &["component", "view", "template", "page"]),
        ("styling", &["style", "css", "html"]),
      ],
    ),
    domain(
      "devops",
      &[
        ("containers", &["docker", "kubernetes"]),
        ("delivery", &["deploy", "pipeline", "workflow"]),
      ],
    ),
    domain("errors", &[("failures", &["error", "exception", "panic", "fail"])]),
    domain("logging", &[("output", &["logging", "logger", "trace"])]),
    domain("caching", &[("caches", &["cache", "redis", "memcache", "lru"])]),
    domain(
      "async",
      &[("tasks", &["async", "await", "concurrent"]), ("sync", &["thread", "mutex"])],
    ),
    domain("hooks", &[("extension", &["hook", "plugin", "middleware"])]),
    domain("documentation", &[("docs", &["readme", "docs", "changelog"])]),
    domain("utilities", &[("shared", &["util", "helper", "common", "shared"])]),
  ]
}

// ============================================================================
// Domain-learning state
// ============================================================================

/// A domain accepted from the external synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedDomain {
  /// Stored without the `@` prefix
  pub name: String,
  pub terms: Vec<String>,
  pub added_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_matched_at: Option<DateTime<Utc>>,
  /// Consecutive tuning cycles with zero matches
  #[serde(default)]
  pub stale_cycles: u32,
}

/// Frozen activity summary exposed while learning is pending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningSnapshot {
  pub recent_tags: Vec<String>,
  pub recent_files: Vec<String>,
  pub top_orphans: Vec<String>,
  pub frozen_at: u64,
}

/// Mutable domain-learning state, persisted per project.
///
/// Counters here are monotonic within a cycle: they are owned by this
/// document rather than derived from the (truncatable) recency window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainState {
  #[serde(default)]
  pub learned: Vec<LearnedDomain>,
  /// Tag -> observation count for tags unmapped to any domain
  #[serde(default)]
  pub orphans: HashMap<String, u64>,
  #[serde(default)]
  pub since_last_cycle: u64,
  #[serde(default)]
  pub since_last_tune: u64,
  #[serde(default)]
  pub learning_pending: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub snapshot: Option<LearningSnapshot>,
  /// Match strings suppressed by tuning (too broad)
  #[serde(default)]
  pub pruned_terms: Vec<String>,
}

impl DomainState {
  pub fn state_path(project_root: &Path) -> PathBuf {
    project_root.join(".aoa").join("domains.json")
  }

  /// Load state from disk; missing or corrupt documents yield the default
  pub fn load(path: &Path) -> Self {
    match std::fs::read_to_string(path) {
      Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
      Err(_) => Self::default(),
    }
  }

  pub fn save(&self, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }

  /// The top orphan tags by observation count
  pub fn top_orphans(&self, limit: usize) -> Vec<String> {
    let mut orphans: Vec<(&String, &u64)> = self.orphans.iter().collect();
    orphans.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    orphans.into_iter().take(limit).map(|(tag, _)| tag.clone()).collect()
  }
}

/// A domain proposed by the external synthesizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedDomain {
  pub name: String,
  pub terms: Vec<String>,
}

/// Validate a batch of proposed domains. Any violation rejects the whole
/// submission; the returned message names the first offending domain.
pub fn validate_proposed(
  proposals: &[ProposedDomain],
  existing_terms: &HashSet<String>,
  existing_names: &HashSet<String>,
) -> std::result::Result<(), String> {
  if proposals.is_empty() {
    return Err("no domains proposed".to_string());
  }

  let mut seen_terms: HashSet<String> = existing_terms.iter().map(|t| t.to_lowercase()).collect();
  let mut seen_names: HashSet<String> = existing_names.iter().map(|n| normalize_domain_name(n)).collect();

  for proposal in proposals {
    let name = &proposal.name;
    let Some(bare) = name.strip_prefix('@') else {
      return Err(format!("domain name must begin with '@': {}", name));
    };
    if bare.is_empty() {
      return Err("domain name is empty".to_string());
    }
    if bare.chars().any(|c| c.is_whitespace() || c.is_uppercase()) {
      return Err(format!("domain name must be lowercase with no whitespace: {}", name));
    }
    if !seen_names.insert(bare.to_string()) {
      return Err(format!("domain already exists: {}", name));
    }

    if proposal.terms.len() < 3 || proposal.terms.len() > 7 {
      return Err(format!("domain {} must have 3-7 terms, got {}", name, proposal.terms.len()));
    }
    for term in &proposal.terms {
      if term.chars().count() < 3 {
        return Err(format!("term too short in {}: {}", name, term));
      }
      if !seen_terms.insert(term.to_lowercase()) {
        return Err(format!("term already used by another domain: {}", term));
      }
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_builtin_reverse_index() {
    let library = PatternLibrary::builtin();
    assert_eq!(library.domain_of_token("auth"), Some("authentication"));
    assert_eq!(library.domain_of_token("cache"), Some("caching"));
    assert_eq!(library.domain_of_token("nonexistent"), None);
  }

  #[test]
  fn test_prefix_match() {
    let library = PatternLibrary::builtin();
    // "authentication" starts with the match string "auth"
    assert_eq!(library.domain_of_token("authentication"), Some("authentication"));
    assert_eq!(library.domain_of_token("caches"), Some("caching"));
  }

  #[test]
  fn test_collision_first_domain_wins() {
    let domains = vec![
      domain("first", &[("terms", &["shared"])]),
      domain("second", &[("terms", &["shared", "unique"])]),
    ];
    let library = PatternLibrary::from_domains(domains);
    assert_eq!(library.domain_of_token("shared"), Some("first"));
    assert_eq!(library.domain_of_token("unique"), Some("second"));
  }

  #[test]
  fn test_domains_in_text() {
    let library = PatternLibrary::builtin();
    let found = library.domains_in_text("/repo/svc/auth_controller.py");
    assert!(found.contains(&"authentication"));
    assert!(found.contains(&"api"));
  }

  #[test]
  fn test_parse_array_doc() {
    let doc = serde_json::json!([
      {"name": "@render", "terms": {"drawing": ["paint", "draw"], "timing": ["frame"]}},
      {"name": "audio", "terms": ["mixer", "codec"]},
    ]);
    let domains = parse_library_doc(&doc).unwrap();
    let library = PatternLibrary::from_domains(domains);
    assert_eq!(library.domain_of_token("paint"), Some("render"));
    assert_eq!(library.domain_of_token("mixer"), Some("audio"));
  }

  #[test]
  fn test_parse_object_doc() {
    let doc = serde_json::json!({
      "domains": [{"name": "render", "terms": {"drawing": ["paint"]}}],
      "_meta": {"version": 2},
    });
    let domains = parse_library_doc(&doc).unwrap();
    assert_eq!(domains.len(), 1);
    assert_eq!(domains[0].name, "render");
  }

  #[test]
  fn test_effective_appends_learned_and_prunes() {
    let library = PatternLibrary::builtin();
    let mut state = DomainState::default();
    state.learned.push(LearnedDomain {
      name: "render".to_string(),
      terms: vec!["paint".to_string(), "draw".to_string(), "frame".to_string()],
      added_at: Utc::now(),
      last_matched_at: None,
      stale_cycles: 0,
    });
    state.pruned_terms.push("cache".to_string());

    let effective = library.effective(&state);
    assert_eq!(effective.domain_of_token("paint"), Some("render"));
    assert_eq!(effective.domain_of_token("cache"), None);
    // Other caching matches survive the prune
    assert_eq!(effective.domain_of_token("redis"), Some("caching"));
  }

  #[test]
  fn test_validate_proposed_accepts_valid() {
    let proposals = vec![ProposedDomain {
      name: "@render".to_string(),
      terms: vec!["paint".to_string(), "draw".to_string(), "frame".to_string()],
    }];
    assert!(validate_proposed(&proposals, &HashSet::new(), &HashSet::new()).is_ok());
  }

  #[test]
  fn test_validate_proposed_rejects_bad_name() {
    let cases = ["render", "@Render", "@ren der", "@"];
    for name in cases {
      let proposals = vec![ProposedDomain {
        name: name.to_string(),
        terms: vec!["aaa".to_string(), "bbb".to_string(), "ccc".to_string()],
      }];
      assert!(
        validate_proposed(&proposals, &HashSet::new(), &HashSet::new()).is_err(),
        "should reject name {:?}",
        name
      );
    }
  }

  #[test]
  fn test_validate_proposed_rejects_bad_terms() {
    // Too few terms
    let proposals = vec![ProposedDomain {
      name: "@render".to_string(),
      terms: vec!["paint".to_string(), "draw".to_string()],
    }];
    assert!(validate_proposed(&proposals, &HashSet::new(), &HashSet::new()).is_err());

    // Term too short
    let proposals = vec![ProposedDomain {
      name: "@render".to_string(),
      terms: vec!["pa".to_string(), "draw".to_string(), "frame".to_string()],
    }];
    assert!(validate_proposed(&proposals, &HashSet::new(), &HashSet::new()).is_err());

    // Term collides with an existing library term
    let existing: HashSet<String> = ["paint".to_string()].into_iter().collect();
    let proposals = vec![ProposedDomain {
      name: "@render".to_string(),
      terms: vec!["paint".to_string(), "draw".to_string(), "frame".to_string()],
    }];
    assert!(validate_proposed(&proposals, &existing, &HashSet::new()).is_err());
  }

  #[test]
  fn test_validate_rejects_whole_submission() {
    // One good domain plus one bad one: the whole batch fails
    let proposals = vec![
      ProposedDomain {
        name: "@render".to_string(),
        terms: vec!["paint".to_string(), "draw".to_string(), "frame".to_string()],
      },
      ProposedDomain {
        name: "bad".to_string(),
        terms: vec!["aaa".to_string(), "bbb".to_string(), "ccc".to_string()],
      },
    ];
    assert!(validate_proposed(&proposals, &HashSet::new(), &HashSet::new()).is_err());
  }

  #[test]
  fn test_domain_state_roundtrip() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join(".aoa").join("domains.json");

    let mut state = DomainState::default();
    state.since_last_cycle = 42;
    state.learning_pending = true;
    state.orphans.insert("#widget".to_string(), 7);
    state.save(&path).unwrap();

    let loaded = DomainState::load(&path);
    assert_eq!(loaded.since_last_cycle, 42);
    assert!(loaded.learning_pending);
    assert_eq!(loaded.orphans.get("#widget"), Some(&7));
  }

  #[test]
  fn test_domain_state_corrupt_load_is_default() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("domains.json");
    std::fs::write(&path, "{not json").unwrap();

    let state = DomainState::load(&path);
    assert!(!state.learning_pending);
    assert!(state.learned.is_empty());
  }

  #[test]
  fn test_top_orphans_ordering() {
    let mut state = DomainState::default();
    state.orphans.insert("#aaa".to_string(), 2);
    state.orphans.insert("#bbb".to_string(), 9);
    state.orphans.insert("#ccc".to_string(), 5);

    assert_eq!(state.top_orphans(2), vec!["#bbb", "#ccc"]);
  }
}
