//! Path template scanning.
//!
//! Templates look like `/v2/files/{fileID}`; every `{placeholder}` must be
//! consumed by a path-located execution parameter before a request may go
//! out.

use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern compiles"));

/// All `{placeholder}` names in a template, in order of appearance.
#[must_use]
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// First placeholder still present after substitution, if any.
#[must_use]
pub fn first_unresolved(path: &str) -> Option<&str> {
    PLACEHOLDER
        .captures(path)
        .and_then(|c| c.get(1).map(|m| m.as_str()))
}
