//! Toolbridge gateway.
//!
//! Serves a generated REST tool catalog to MCP clients over streamable
//! HTTP. The catalog, credential wiring, and outbound HTTP pipeline live
//! in `toolbridge-tools`; this crate adds the session table, the JSON-RPC
//! endpoint, and process bootstrap.

pub mod admin;
pub mod config;
pub mod mcp;
pub mod session;

use axum::{Extension, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use config::GatewayConfig;
use session::SessionManager;
use toolbridge_tools::credentials::{
    AmbientCredentials, BearerProvider, ClientCredentialsProvider, TokenCache,
};
use toolbridge_tools::executor::{Executor, ExecutorConfig};
use toolbridge_tools::invoker::Invoker;
use toolbridge_tools::loader::Registry;
use toolbridge_tools::security::SecurityBinder;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub invoker: Arc<Invoker>,
    pub started_at: DateTime<Utc>,
}

/// Assemble the invocation pipeline from a config. Module files that fail
/// to load are skipped with a warning inside the registry; an empty
/// catalog is legal.
#[must_use]
pub fn build_state(config: &GatewayConfig) -> AppState {
    let mut registry = Registry::new();
    for dir in &config.catalog.dirs {
        registry.register_dir(dir);
    }
    for file in &config.catalog.files {
        registry.register_file(file);
    }
    let catalog = Arc::new(registry.load());

    let client = reqwest::Client::new();
    let store = AmbientCredentials::new(config.credentials.values.clone(), true);
    let provider = config.credentials.oauth.as_ref().map(|oauth| {
        let secret = std::env::var(&oauth.client_secret_env).unwrap_or_default();
        if secret.is_empty() {
            tracing::warn!(
                var = %oauth.client_secret_env,
                "client secret variable is unset or empty; token grants will be rejected"
            );
        }
        Arc::new(ClientCredentialsProvider::new(
            oauth.token_url.clone(),
            oauth.client_id.clone(),
            secret,
            client.clone(),
            Arc::new(TokenCache::new()),
        )) as Arc<dyn BearerProvider>
    });
    let binder = SecurityBinder::new(store, provider);

    // Zero limits in the config mean "unbounded".
    let executor = Executor::new(
        client,
        ExecutorConfig {
            timeout: match config.http.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            max_response_bytes: match config.http.max_response_bytes {
                0 => None,
                bytes => Some(bytes),
            },
            error_body_preview_bytes: config.http.error_body_preview_bytes,
            default_headers: sorted_headers(&config.http.default_headers),
        },
    );

    let invoker = Invoker::new(catalog, binder, executor, config.base_url.clone());
    AppState {
        sessions: Arc::new(SessionManager::new()),
        invoker: Arc::new(invoker),
        started_at: Utc::now(),
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(mcp::router())
        .merge(admin::router())
        .layer(Extension(state))
}

fn sorted_headers(headers: &std::collections::HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    pairs.sort();
    pairs
}
