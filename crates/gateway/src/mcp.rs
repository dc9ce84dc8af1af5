//! MCP streamable HTTP endpoint.
//!
//! One route, three verbs. POST carries client JSON-RPC messages and
//! answers requests with a single-message SSE body; notifications and
//! client responses get `202 Accepted` with no body. GET attaches the
//! standalone server-to-client stream. DELETE terminates the session.
//!
//! Tool failures never surface as JSON-RPC errors here. The invoker folds
//! them into `CallToolResult` envelopes with `isError: true`; protocol
//! errors (bad params, unknown methods) are the only `error` replies.

use axum::Extension;
use axum::Router;
use axum::extract::Json;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::stream;
use rmcp::model::{ErrorCode, ErrorData};
use serde_json::{Value, json};
use std::convert::Infallible;

use crate::AppState;
use crate::session::{SessionHandle, SessionState};
use toolbridge_tools::credentials::CallContext;

/// Header carrying the server-assigned session id, lowercase per HTTP/2.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Protocol revision offered when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub fn router() -> Router {
    Router::new().route("/mcp", post(post_mcp).get(get_mcp).delete(delete_mcp))
}

async fn post_mcp(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(message): Json<Value>,
) -> Response {
    let session_header = header_session_id(&headers);
    let method = message
        .get("method")
        .and_then(Value::as_str)
        .map(str::to_owned);

    // Initialize is the one message that arrives without a session and
    // mints one.
    if method.as_deref() == Some("initialize") {
        if session_header.is_some() {
            return plain_error(
                StatusCode::BAD_REQUEST,
                "initialize must not carry a session id",
            );
        }
        let Some(id) = request_id(&message) else {
            return plain_error(
                StatusCode::BAD_REQUEST,
                "initialize must be a request with an id",
            );
        };
        let handle = state.sessions.create();
        let reply = jsonrpc_ok(&id, &initialize_result(&message));
        return sse_single_message(&reply, Some(handle.id()));
    }

    let Some(session_id) = session_header else {
        return plain_error(StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header");
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return plain_error(StatusCode::NOT_FOUND, "unknown or terminated session");
    };

    let Some(method) = method else {
        // Client responses to server-initiated requests; nothing awaits
        // these.
        return StatusCode::ACCEPTED.into_response();
    };

    let Some(id) = request_id(&message) else {
        handle_notification(&session, &method);
        return StatusCode::ACCEPTED.into_response();
    };

    tracing::debug!(session = %session.id(), method = %method, id = %id, "dispatching request");
    let reply = match method.as_str() {
        "tools/list" => jsonrpc_ok(&id, &json!({ "tools": state.invoker.list_tools() })),
        "tools/call" => match call_tool(&state, &headers, &message).await {
            Ok(result) => jsonrpc_ok(&id, &result),
            Err(error) => jsonrpc_err(&id, &error),
        },
        "ping" => jsonrpc_ok(&id, &json!({})),
        other => jsonrpc_err(
            &id,
            &ErrorData::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("method '{other}' is not supported"),
                None,
            ),
        ),
    };
    sse_single_message(&reply, None)
}

async fn get_mcp(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = header_session_id(&headers) else {
        return plain_error(StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header");
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return plain_error(StatusCode::NOT_FOUND, "unknown or terminated session");
    };
    if session.state() != SessionState::Active {
        return plain_error(StatusCode::CONFLICT, "session is not initialized yet");
    }

    let rx = session.attach_stream();
    tracing::debug!(session = %session.id(), "standalone stream attached");
    // The stream owns only the receiver. Closing the session drops the
    // sender, which ends the SSE body.
    let body = stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        let event = Event::default().event("message").data(message.to_string());
        Some((Ok::<_, Infallible>(event), rx))
    });
    Sse::new(body).keep_alive(KeepAlive::default()).into_response()
}

async fn delete_mcp(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = header_session_id(&headers) else {
        return plain_error(StatusCode::BAD_REQUEST, "missing Mcp-Session-Id header");
    };
    if state.sessions.close(&session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        plain_error(StatusCode::NOT_FOUND, "unknown or terminated session")
    }
}

fn handle_notification(session: &SessionHandle, method: &str) {
    if method == "notifications/initialized" {
        session.activate();
        tracing::debug!(session = %session.id(), "session initialized");
    } else {
        tracing::debug!(session = %session.id(), method = %method, "ignoring notification");
    }
}

async fn call_tool(
    state: &AppState,
    headers: &HeaderMap,
    message: &Value,
) -> Result<Value, ErrorData> {
    let params = message.get("params").and_then(Value::as_object);
    let Some(name) = params.and_then(|p| p.get("name")).and_then(Value::as_str) else {
        return Err(ErrorData::new(
            ErrorCode::INVALID_PARAMS,
            "tools/call requires a string params.name",
            None,
        ));
    };
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .and_then(Value::as_object)
        .cloned();
    let context = CallContext {
        bearer_token: bearer_from_headers(headers),
    };
    let result = state.invoker.call_tool(name, arguments, context).await;
    serde_json::to_value(&result).map_err(|e| {
        ErrorData::new(
            ErrorCode::INTERNAL_ERROR,
            format!("failed to serialize tool result: {e}"),
            None,
        )
    })
}

fn initialize_result(message: &Value) -> Value {
    let requested = message
        .get("params")
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": requested,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "toolbridge-gateway",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn request_id(message: &Value) -> Option<Value> {
    message.get("id").filter(|id| !id.is_null()).cloned()
}

fn jsonrpc_ok(id: &Value, result: &Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn jsonrpc_err(id: &Value, error: &ErrorData) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

/// Render one JSON-RPC message as a complete SSE response. The reply
/// stream carries exactly one `message` event and then ends.
fn sse_single_message(message: &Value, session_id: Option<&str>) -> Response {
    let event = Event::default().event("message").data(message.to_string());
    let body = stream::once(async move { Ok::<_, Infallible>(event) });
    let mut response = Sse::new(body).into_response();
    if let Some(id) = session_id
        && let Ok(value) = HeaderValue::from_str(id)
    {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

fn header_session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

fn plain_error(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}
