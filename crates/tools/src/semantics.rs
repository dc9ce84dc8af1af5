//! Method-derived tool annotations.
//!
//! The public catalog listing advertises MCP `ToolAnnotations` inferred from
//! RFC 9110 method semantics, so callers can tell a read from a mutation
//! without seeing the HTTP binding itself.

use reqwest::Method;
use rmcp::model::ToolAnnotations;

/// Annotations for one HTTP method.
///
/// `openWorldHint` is always true: every tool here talks to an external
/// system. Extension methods get only that hint; their other semantics are
/// unknown.
#[must_use]
pub fn annotations_for_method(method: &Method) -> ToolAnnotations {
    let (read_only, destructive, idempotent) = match method.as_str() {
        "GET" | "HEAD" | "OPTIONS" => (Some(true), Some(false), Some(true)),
        "POST" => (Some(false), Some(false), Some(false)),
        "PUT" | "DELETE" => (Some(false), Some(true), Some(true)),
        // PATCH may or may not be idempotent; do not guess.
        "PATCH" => (Some(false), Some(true), None),
        _ => (None, None, None),
    };

    ToolAnnotations {
        title: None,
        read_only_hint: read_only,
        destructive_hint: destructive,
        idempotent_hint: idempotent,
        open_world_hint: Some(true),
    }
}

#[cfg(test)]
mod tests {
    use super::annotations_for_method;
    use reqwest::Method;

    #[test]
    fn every_method_is_open_world() {
        for m in [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ] {
            assert_eq!(annotations_for_method(&m).open_world_hint, Some(true));
        }

        let custom: Method = "PROPFIND".parse().expect("valid method token");
        assert_eq!(annotations_for_method(&custom).open_world_hint, Some(true));
    }

    #[test]
    fn get_is_readonly_and_idempotent() {
        let a = annotations_for_method(&Method::GET);
        assert_eq!(a.read_only_hint, Some(true));
        assert_eq!(a.destructive_hint, Some(false));
        assert_eq!(a.idempotent_hint, Some(true));
    }

    #[test]
    fn delete_is_destructive_and_idempotent() {
        let a = annotations_for_method(&Method::DELETE);
        assert_eq!(a.read_only_hint, Some(false));
        assert_eq!(a.destructive_hint, Some(true));
        assert_eq!(a.idempotent_hint, Some(true));
    }

    #[test]
    fn patch_leaves_idempotence_unknown() {
        let a = annotations_for_method(&Method::PATCH);
        assert_eq!(a.destructive_hint, Some(true));
        assert_eq!(a.idempotent_hint, None);
    }

    #[test]
    fn extension_method_only_sets_open_world() {
        let custom: Method = "PROPFIND".parse().expect("valid method token");
        let a = annotations_for_method(&custom);
        assert_eq!(a.read_only_hint, None);
        assert_eq!(a.destructive_hint, None);
        assert_eq!(a.idempotent_hint, None);
    }
}
