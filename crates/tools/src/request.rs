//! Builds the outbound request from a Tool Definition, validated arguments,
//! and resolved security fragments.
//!
//! Construction is pure and deterministic: no I/O happens here, and the
//! same inputs always produce the same `RequestSpec`. Placement is driven
//! entirely by `executionParameters`; arguments without a placement entry
//! are left alone (they may still ride along inside the body payload).

use reqwest::Method;
use rmcp::model::JsonObject;
use serde_json::Value;
use url::Url;

use crate::definition::{ParamLocation, REQUEST_BODY_FIELD, ToolDefinition};
use crate::error::{InvokeError, InvokeResult};
use crate::security::SecurityFragments;
use crate::template;

/// Body payload plus the content type declared for it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub content_type: String,
    pub payload: Value,
}

/// A fully-specified outbound request. Header names are lowercase and the
/// query string is already encoded into the URL.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Construct the request. `base_url` is joined in front of the resolved
/// path when configured; without one the path template must already be an
/// absolute URL.
///
/// # Errors
///
/// `PathResolution` when a `{placeholder}` survives substitution, `Setup`
/// when the final URL does not parse.
pub fn build(
    definition: &ToolDefinition,
    arguments: &JsonObject,
    security: &SecurityFragments,
    base_url: Option<&str>,
) -> InvokeResult<RequestSpec> {
    let path = resolve_path(definition, arguments)?;
    let mut query = query_pairs(definition, arguments);
    let mut headers = header_pairs(definition, arguments);
    let body = body_payload(definition, arguments, &mut headers);
    merge_security(security, &mut headers, &mut query);
    let url = assemble_url(&path, &query, base_url)?;

    Ok(RequestSpec {
        method: definition.method.clone(),
        url,
        headers,
        body,
    })
}

/// A `null` argument counts as absent everywhere in the builder.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn resolve_path(definition: &ToolDefinition, arguments: &JsonObject) -> InvokeResult<String> {
    let mut path = definition.path_template.clone();
    for param in definition.parameters_at(ParamLocation::Path) {
        if let Some(value) = present(arguments.get(&param.name)) {
            let encoded = encode_component(&value_to_string(value));
            path = path.replace(&format!("{{{}}}", param.name), &encoded);
        }
    }

    if let Some(placeholder) = template::first_unresolved(&path) {
        return Err(InvokeError::PathResolution {
            template: definition.path_template.clone(),
            placeholder: placeholder.to_string(),
        });
    }
    Ok(path)
}

fn query_pairs(definition: &ToolDefinition, arguments: &JsonObject) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for param in definition.parameters_at(ParamLocation::Query) {
        let Some(value) = present(arguments.get(&param.name)) else {
            continue;
        };
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push((param.name.clone(), value_to_string(item)));
                }
            }
            other => pairs.push((param.name.clone(), value_to_string(other))),
        }
    }
    pairs
}

fn header_pairs(definition: &ToolDefinition, arguments: &JsonObject) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for param in definition.parameters_at(ParamLocation::Header) {
        if let Some(value) = present(arguments.get(&param.name)) {
            headers.push((param.name.to_ascii_lowercase(), value_to_string(value)));
        }
    }
    headers
}

/// A body is attached only when the definition declares a content type AND
/// the caller supplied the nested payload field.
fn body_payload(
    definition: &ToolDefinition,
    arguments: &JsonObject,
    headers: &mut Vec<(String, String)>,
) -> Option<RequestBody> {
    let content_type = definition.request_body_content_type.as_ref()?;
    let payload = present(arguments.get(REQUEST_BODY_FIELD))?.clone();
    headers.push(("content-type".to_string(), content_type.clone()));
    Some(RequestBody {
        content_type: content_type.clone(),
        payload,
    })
}

/// Scheme-applied values win over same-named execution parameters. Cookie
/// fragments are folded into a single `cookie` header, after any cookie
/// header the caller set through an execution parameter.
fn merge_security(
    security: &SecurityFragments,
    headers: &mut Vec<(String, String)>,
    query: &mut Vec<(String, String)>,
) {
    for (name, value) in &security.headers {
        headers.retain(|(existing, _)| existing != name);
        headers.push((name.clone(), value.clone()));
    }
    for (name, value) in &security.query {
        query.retain(|(existing, _)| existing != name);
        query.push((name.clone(), value.clone()));
    }
    if !security.cookies.is_empty() {
        let joined = security
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        match headers.iter_mut().find(|(name, _)| name == "cookie") {
            Some((_, existing)) => {
                existing.push_str("; ");
                existing.push_str(&joined);
            }
            None => headers.push(("cookie".to_string(), joined)),
        }
    }
}

fn assemble_url(
    path: &str,
    query: &[(String, String)],
    base_url: Option<&str>,
) -> InvokeResult<Url> {
    let absolute = match base_url {
        Some(base) => {
            let path = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            };
            format!("{}{}", base.trim_end_matches('/'), path)
        }
        None => path.to_string(),
    };

    let mut url =
        Url::parse(&absolute).map_err(|e| InvokeError::Setup(format!("Invalid URL: {e}")))?;

    if !query.is_empty() {
        let mut encoded = String::new();
        for (i, (key, value)) in query.iter().enumerate() {
            if i > 0 {
                encoded.push('&');
            }
            encoded.push_str(&encode_component(key));
            encoded.push('=');
            encoded.push_str(&encode_component(value));
        }
        url.set_query(Some(&encoded));
    }

    Ok(url)
}

/// Percent-encode everything outside the unreserved set, '&' and '='
/// included, so pairs can be joined textually.
fn encode_component(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}
