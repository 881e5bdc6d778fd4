//! Prompt keyword extraction for the predictor.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

static FILE_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"[\w./-]*?([\w-]+\.(?:py|js|ts|tsx|jsx|go|rs|java|cpp|c|h|md|json|yaml|yml|sh|sql))\b").unwrap()
});

/// Function words and common request verbs dropped from prompts
const STOPWORDS: &[&str] = &[
  "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be", "because",
  "been", "before", "being", "below", "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing",
  "down", "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her", "here",
  "hers", "him", "his", "how", "if", "in", "into", "is", "it", "its", "just", "let", "me", "more", "most", "my", "no",
  "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same", "she",
  "should", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
  "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where",
  "which", "while", "who", "why", "will", "with", "would", "you", "your",
  // Common request verbs that carry no file signal
  "add", "change", "check", "create", "find", "fix", "get", "help", "implement", "look", "make", "need", "new",
  "please", "run", "see", "set", "show", "update", "use", "want", "write",
];

/// Extract up to `max` ranked keywords from a free-text prompt.
///
/// Identifier-like words survive a stopword list and a 3-character floor;
/// file-like fragments additionally contribute their bare basename. Order is
/// first-seen, duplicates dropped.
pub fn extract_keywords(prompt: &str, max: usize) -> Vec<String> {
  let mut seen = HashSet::new();
  let mut keywords = Vec::new();
  let mut push = |word: String| {
    if keywords.len() < max && seen.insert(word.clone()) {
      keywords.push(word);
    }
  };

  for m in WORD_RE.find_iter(prompt) {
    let word = m.as_str().to_lowercase();
    if word.len() < 3 || STOPWORDS.contains(&word.as_str()) {
      continue;
    }
    push(word);
  }

  for caps in FILE_FRAGMENT_RE.captures_iter(prompt) {
    push(caps[1].to_lowercase());
  }

  keywords
}
