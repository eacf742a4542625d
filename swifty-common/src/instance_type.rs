//! Instance-type tier helpers.
//!
//! Game servers must run on dedicated-CPU plans.

// Linode plan codes look like `g6-dedicated-2`, `g6-standard-2`, `g6-nanode-1`.
pub const DEDICATED_INSTANCE_TYPE_PATTERNS: &str = "*-DEDICATED-*";

/// Shared tiers are rejected even if a pattern above would accept them.
pub const SHARED_INSTANCE_TYPE_MARKERS: &[&str] = &["-STANDARD-", "-NANODE-", "-SHARED-"];

/// Parse comma-separated patterns.
///
/// - Trims whitespace
/// - Drops empty entries
/// - If input is empty/None, returns the dedicated-tier defaults
pub fn parse_instance_type_patterns(raw: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = raw
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    if out.is_empty() {
        out = DEDICATED_INSTANCE_TYPE_PATTERNS
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();
    }

    out
}

/// Return true if `instance_type` matches at least one pattern.
///
/// Pattern rules:
/// - Case-insensitive
/// - `*` matches any substring (including empty)
pub fn instance_type_matches_patterns(instance_type: &str, patterns: &[String]) -> bool {
    let it = instance_type.trim().to_ascii_uppercase();
    if it.is_empty() {
        return false;
    }

    patterns.iter().any(|pat| {
        let p = pat.trim().to_ascii_uppercase();
        !p.is_empty() && wildcard_match(&it, &p)
    })
}

fn wildcard_match(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return text == pattern;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || !text[first.len()..].ends_with(last) {
        return false;
    }

    // Middle parts must appear in order between the prefix and the suffix.
    let mut idx = first.len();
    let end = text.len() - last.len();
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match text[idx..end].find(part) {
            Some(pos) => idx += pos + part.len(),
            None => return false,
        }
    }
    idx <= end
}

/// True when `instance_type` matches `patterns` and is not a shared tier.
pub fn is_dedicated_instance_type(instance_type: &str, patterns: &[String]) -> bool {
    let upper = instance_type.trim().to_ascii_uppercase();
    if SHARED_INSTANCE_TYPE_MARKERS
        .iter()
        .any(|marker| upper.contains(marker))
    {
        return false;
    }
    instance_type_matches_patterns(&upper, patterns)
}
