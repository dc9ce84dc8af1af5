//! Credential sources for the security binder.
//!
//! Three layers, in precedence order for bearer schemes: the caller's own
//! token on the current call, the ambient key/value store, and an optional
//! managed OAuth2 client-credentials provider backed by the single-flight
//! token cache.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{InvokeError, InvokeResult};

/// Default lifetime assumed when a token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Per-call credential context, built by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Bearer token supplied by the caller on this call. Outranks any
    /// ambient or managed credential for bearer schemes.
    pub bearer_token: Option<String>,
}

fn sanitize_scheme(scheme: &str) -> String {
    scheme
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Lookup key for an API-key scheme's secret.
#[must_use]
pub fn api_key_lookup(scheme: &str) -> String {
    format!("API_KEY_{}", sanitize_scheme(scheme))
}

/// Lookup key for a bearer scheme's ambient token.
#[must_use]
pub fn bearer_token_lookup(scheme: &str) -> String {
    format!("BEARER_TOKEN_{}", sanitize_scheme(scheme))
}

/// Lookup key for a basic scheme's username.
#[must_use]
pub fn basic_username_lookup(scheme: &str) -> String {
    format!("BASIC_USERNAME_{}", sanitize_scheme(scheme))
}

/// Lookup key for a basic scheme's password.
#[must_use]
pub fn basic_password_lookup(scheme: &str) -> String {
    format!("BASIC_PASSWORD_{}", sanitize_scheme(scheme))
}

/// Ambient key/value credential store: configured values first, process
/// environment second. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct AmbientCredentials {
    values: HashMap<String, String>,
    use_env: bool,
}

impl AmbientCredentials {
    #[must_use]
    pub fn new(values: HashMap<String, String>, use_env: bool) -> Self {
        Self { values, use_env }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let configured = self.values.get(key).cloned();
        let found = match configured {
            Some(v) => Some(v),
            None if self.use_env => std::env::var(key).ok(),
            None => None,
        };
        found.filter(|v| !v.is_empty())
    }
}

/// A token plus its remaining lifetime, as issued by a provider.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub ttl: Duration,
}

#[derive(Debug)]
struct CacheEntry {
    token: String,
    expires_at: Instant,
}

/// Process-scoped token cache with single-flight refresh.
///
/// The first caller to observe a missing or expired entry performs the
/// refresh while holding that key's flight lock; concurrent callers await
/// the same lock and then re-read the entry instead of issuing duplicate
/// requests.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    flights: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.token.clone())
    }

    /// Return the cached token for `key`, refreshing it through `refresh`
    /// if missing or expired.
    ///
    /// # Errors
    ///
    /// Propagates the refresh failure; the cache is left untouched so the
    /// next caller retries.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, refresh: F) -> InvokeResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = InvokeResult<IssuedToken>>,
    {
        if let Some(token) = self.fresh(key) {
            return Ok(token);
        }

        let flight = {
            let mut flights = self.flights.lock();
            flights.entry(key.to_string()).or_default().clone()
        };
        let _guard = flight.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.fresh(key) {
            return Ok(token);
        }

        let issued = refresh().await?;
        let entry = CacheEntry {
            token: issued.token.clone(),
            expires_at: Instant::now() + issued.ttl,
        };
        self.entries.lock().insert(key.to_string(), entry);
        tracing::debug!(key, ttl_secs = issued.ttl.as_secs(), "token cache refreshed");
        Ok(issued.token)
    }
}

/// Async source for ambient bearer tokens (the managed-credential seam).
#[async_trait]
pub trait BearerProvider: Send + Sync {
    async fn bearer_token(&self) -> InvokeResult<String>;
}

/// OAuth2 client-credentials provider.
///
/// Tokens are cached for 90% of the issued `expires_in` so a token is
/// refreshed ahead of the remote's expiry rather than raced against it.
pub struct ClientCredentialsProvider {
    token_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
    cache: Arc<TokenCache>,
    cache_key: String,
}

impl ClientCredentialsProvider {
    #[must_use]
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        client: reqwest::Client,
        cache: Arc<TokenCache>,
    ) -> Self {
        let token_url = token_url.into();
        let client_id = client_id.into();
        let cache_key = format!("oauth:{client_id}@{token_url}");
        Self {
            token_url,
            client_id,
            client_secret: client_secret.into(),
            client,
            cache,
            cache_key,
        }
    }

    async fn fetch(&self) -> InvokeResult<IssuedToken> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default)]
            expires_in: Option<u64>,
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| InvokeError::Network {
                code: None,
                message: format!("token endpoint unreachable: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvokeError::Setup(format!(
                "token endpoint rejected the credential grant with status {}",
                status.as_u16()
            )));
        }

        let parsed: TokenResponse = response.json().await.map_err(|e| {
            InvokeError::Setup(format!("token endpoint returned an unusable body: {e}"))
        })?;

        let expires_in = parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Ok(IssuedToken {
            token: parsed.access_token,
            ttl: Duration::from_secs(expires_in * 9 / 10),
        })
    }
}

#[async_trait]
impl BearerProvider for ClientCredentialsProvider {
    async fn bearer_token(&self) -> InvokeResult<String> {
        self.cache
            .get_or_refresh(&self.cache_key, || self.fetch())
            .await
    }
}
