//! Gateway configuration.
//!
//! A single YAML document describes where to listen, which tool modules to
//! load, and how outbound calls are credentialed and bounded. Every section
//! is optional; running without a config file at all falls back to the same
//! defaults, which is useful when the catalog comes entirely from
//! command-line flags.

use anyhow::Context as _;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Prefix joined onto resolved request paths. Without one, each
    /// tool's path template must already be an absolute URL.
    pub base_url: Option<String>,
    pub catalog: CatalogConfig,
    pub credentials: CredentialsConfig,
    pub http: HttpConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8085),
            base_url: None,
            catalog: CatalogConfig::default(),
            credentials: CredentialsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Where tool modules come from. Directories are scanned for `*.yaml`,
/// `*.yml` and `*.json`; files are loaded as given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CredentialsConfig {
    /// Explicit credential values keyed by lookup name, e.g.
    /// `API_KEY_APIKEYAUTH`. Values configured here shadow the process
    /// environment.
    pub values: HashMap<String, String>,
    /// Optional client-credentials token endpoint backing bearer schemes
    /// that have no static token.
    pub oauth: Option<OAuthConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    /// Name of the environment variable holding the client secret. The
    /// secret itself never lives in the config file.
    pub client_secret_env: String,
}

/// Outbound HTTP limits. A zero disables the corresponding bound.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_response_bytes: usize,
    pub error_body_preview_bytes: usize,
    /// Headers attached to every upstream request.
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_response_bytes: 4 * 1024 * 1024,
            error_body_preview_bytes: 2048,
            default_headers: HashMap::new(),
        }
    }
}

/// Read and parse a config file.
///
/// # Errors
///
/// Fails when the file cannot be read or is not valid YAML.
pub fn load(path: &Path) -> anyhow::Result<GatewayConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
