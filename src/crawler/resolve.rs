// src/crawler/resolve.rs
// =============================================================================
// Turns a raw href value into an absolute URL.
//
// Steps:
// 1. Drop the fragment (`#` and everything after it)
// 2. Parse the base URL of the page the link was found on
// 3. Resolve the href against the base per standard reference-resolution
//    rules (relative paths, scheme-relative, absolute overrides)
//
// Any parse failure makes the link unresolvable and it is simply dropped.
// =============================================================================

use url::Url;

// Resolves a possibly-relative, fragment-bearing link against a base URL
//
// Returns: Some(absolute_url) in canonical string form, or None if either
// the base or the link cannot be parsed
pub fn resolve_link(raw: &str, base: &str) -> Option<String> {
    let raw = match raw.find('#') {
        Some(index) => &raw[..index],
        None => raw,
    };

    let base = Url::parse(base).ok()?;
    let resolved = base.join(raw).ok()?;
    Some(resolved.to_string())
}
