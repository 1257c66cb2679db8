//! URL helpers for Sumi-Harvest
//!
//! Acquisition targets are usually URLs. Rate limiting is keyed by the
//! target's host, and per-domain quota overrides are matched with the same
//! wildcard patterns the configuration accepts.

mod domain;

pub use domain::{extract_domain, matches_domain_pattern, rate_limit_key};

/// Parses a target list: one target per line
///
/// Blank lines and lines starting with `#` are skipped, surrounding
/// whitespace is trimmed, and repeated targets keep their first position.
pub fn parse_target_list(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}
