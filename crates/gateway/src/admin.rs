//! Operational endpoints, kept off the MCP route.

use axum::Extension;
use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::{Value, json};

use crate::AppState;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health(Extension(state): Extension<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "startedAt": state.started_at.to_rfc3339(),
        "tools": state.invoker.tool_count(),
        "openSessions": state.sessions.len(),
    }))
}
