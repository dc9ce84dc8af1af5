//! Performs the outbound HTTP call and classifies the outcome.
//!
//! The executor is the pipeline's only suspension point. Success is a
//! rendered text body; every failure maps onto one of the invoke-error
//! families so the caller always sees exactly one terminal outcome.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use mime::Mime;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

use crate::error::{InvokeError, InvokeResult};
use crate::request::{RequestBody, RequestSpec};

/// Outbound call limits and defaults.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Per-request timeout covering connect through body completion.
    /// `None` disables the deadline.
    pub timeout: Option<Duration>,
    /// Upper bound on response body size. `None` disables the check.
    pub max_response_bytes: Option<usize>,
    /// Preview length for non-2xx bodies carried in the error result.
    pub error_body_preview_bytes: usize,
    /// Headers attached to every outbound request before per-call headers.
    pub default_headers: Vec<(String, String)>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_response_bytes: Some(4 * 1024 * 1024),
            error_body_preview_bytes: 2048,
            default_headers: Vec::new(),
        }
    }
}

pub struct Executor {
    client: reqwest::Client,
    config: ExecutorConfig,
}

impl Executor {
    #[must_use]
    pub fn new(client: reqwest::Client, config: ExecutorConfig) -> Self {
        Self { client, config }
    }

    /// Send the request and render the response.
    ///
    /// # Errors
    ///
    /// `Api` for non-2xx responses, `Network` when no usable response
    /// arrived, `Setup` when the request could not be dispatched at all.
    pub async fn execute(&self, spec: &RequestSpec) -> InvokeResult<String> {
        let mut request = self.client.request(spec.method.clone(), spec.url.clone());
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }
        for (name, value) in &self.config.default_headers {
            request = request.header(name, value);
        }
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &spec.body {
            request = request.body(serialize_body(body)?);
        }

        let response = request.send().await.map_err(|e| classify_send_error(&e))?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let bytes = read_body_limited(response, self.config.max_response_bytes).await?;

        if status.is_success() {
            Ok(render_success(status, &bytes, content_type.as_deref()))
        } else {
            Err(InvokeError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
                body: preview(&bytes, self.config.error_body_preview_bytes),
            })
        }
    }
}

fn serialize_body(body: &RequestBody) -> InvokeResult<String> {
    let rendered = if is_json_content_type(Some(&body.content_type)) {
        serde_json::to_string(&body.payload)
    } else {
        match &body.payload {
            Value::String(s) => return Ok(s.clone()),
            other => serde_json::to_string(other),
        }
    };
    rendered.map_err(|e| InvokeError::Setup(format!("failed to serialize request body: {e}")))
}

fn classify_send_error(e: &reqwest::Error) -> InvokeError {
    let message = sanitize_reqwest_error(e);
    if e.is_timeout() {
        InvokeError::Network {
            code: Some("timeout".to_string()),
            message,
        }
    } else if e.is_connect() {
        InvokeError::Network {
            code: Some("connect".to_string()),
            message,
        }
    } else if e.is_builder() || e.is_request() {
        InvokeError::Setup(message)
    } else {
        InvokeError::Network {
            code: None,
            message,
        }
    }
}

fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    if let Some(url) = e.url() {
        message = message.replace(url.as_str(), &redact_url(url));
    }
    message
}

pub(crate) fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

async fn read_body_limited(
    mut response: reqwest::Response,
    max_bytes: Option<usize>,
) -> InvokeResult<Vec<u8>> {
    let Some(max) = max_bytes else {
        let bytes = response.bytes().await.map_err(|e| InvokeError::Network {
            code: None,
            message: sanitize_reqwest_error(&e),
        })?;
        return Ok(bytes.to_vec());
    };

    if let Some(len) = response.content_length()
        && len > max as u64
    {
        return Err(response_too_large(max));
    }

    let mut out: Vec<u8> = Vec::new();
    loop {
        let chunk = response.chunk().await.map_err(|e| InvokeError::Network {
            code: None,
            message: sanitize_reqwest_error(&e),
        })?;
        let Some(chunk) = chunk else {
            return Ok(out);
        };
        if out.len().saturating_add(chunk.len()) > max {
            return Err(response_too_large(max));
        }
        out.extend_from_slice(&chunk);
    }
}

fn response_too_large(max: usize) -> InvokeError {
    InvokeError::Network {
        code: Some("response-too-large".to_string()),
        message: format!("response exceeded the {max} byte limit"),
    }
}

fn render_success(status: StatusCode, bytes: &[u8], content_type: Option<&str>) -> String {
    if bytes.is_empty() {
        return format!("(status {} - no content)", status.as_u16());
    }

    if is_json_content_type(content_type)
        && let Ok(parsed) = serde_json::from_slice::<Value>(bytes)
    {
        return match parsed {
            Value::String(s) => s,
            doc @ (Value::Object(_) | Value::Array(_)) => {
                serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string())
            }
            scalar => scalar.to_string(),
        };
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": BASE64.encode(bytes),
        })
        .to_string(),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(ct) = content_type else {
        return false;
    };
    let Ok(m) = ct.parse::<Mime>() else {
        return false;
    };
    m.subtype() == mime::JSON || m.suffix().is_some_and(|s| s == mime::JSON)
}

/// Lossy-decode and truncate to `limit` bytes on a char boundary.
fn preview(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
