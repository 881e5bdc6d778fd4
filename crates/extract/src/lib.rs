pub mod envelope;
pub mod keywords;
pub mod search;
pub mod tags;

pub use envelope::{ParsedEnvelope, enrich_file_sizes, parse_envelope, response_text};
pub use keywords::extract_keywords;
pub use search::{WrappedSearch, classify_search, parse_search_stats, result_paths, sanitize_term, scan_wrapped_search, strip_ansi};
pub use tags::infer_tags;
