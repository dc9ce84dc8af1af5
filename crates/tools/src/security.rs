//! Binds a tool's security requirements to concrete request fragments.
//!
//! Requirements are an ordered OR-list of AND-groups. The binder walks the
//! groups in order and attaches the first group whose schemes can all be
//! satisfied from the available credential sources. An unsatisfiable
//! requirement downgrades to an unauthenticated request with a warning;
//! the remote stays the authority on whether that request is acceptable.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::credentials::{
    AmbientCredentials, BearerProvider, CallContext, api_key_lookup, basic_password_lookup,
    basic_username_lookup, bearer_token_lookup,
};
use crate::definition::{
    ApiKeyLocation, HttpScheme, SecurityRequirement, SecurityScheme, ToolDefinition,
};

/// Credential material resolved for one call, keyed by carrier position.
/// Header names are lowercase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SecurityFragments {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

pub struct SecurityBinder {
    credentials: AmbientCredentials,
    bearer_provider: Option<Arc<dyn BearerProvider>>,
}

impl SecurityBinder {
    #[must_use]
    pub fn new(
        credentials: AmbientCredentials,
        bearer_provider: Option<Arc<dyn BearerProvider>>,
    ) -> Self {
        Self {
            credentials,
            bearer_provider,
        }
    }

    /// Resolve the fragments for one call. Infallible: a group that cannot
    /// be satisfied is skipped, and exhausting all groups yields empty
    /// fragments plus a warning.
    pub async fn resolve(
        &self,
        definition: &ToolDefinition,
        catalog: &Catalog,
        context: &CallContext,
    ) -> SecurityFragments {
        if definition.security_requirements.is_empty() {
            return SecurityFragments::default();
        }

        for group in &definition.security_requirements {
            if let Some(fragments) = self.try_group(group, catalog, context).await {
                return fragments;
            }
        }

        tracing::warn!(
            tool = %definition.name,
            "no security requirement alternative could be satisfied, sending request without credentials"
        );
        SecurityFragments::default()
    }

    /// Attempt one AND-group. Returns `None` unless every scheme in the
    /// group binds.
    async fn try_group(
        &self,
        group: &SecurityRequirement,
        catalog: &Catalog,
        context: &CallContext,
    ) -> Option<SecurityFragments> {
        let mut fragments = SecurityFragments::default();

        for (scheme_name, _scopes) in group {
            let Some(scheme) = catalog.security_scheme(scheme_name) else {
                tracing::debug!(scheme = %scheme_name, "security scheme not declared in catalog");
                return None;
            };

            match scheme {
                SecurityScheme::ApiKey { location, name } => {
                    let secret = self.credentials.get(&api_key_lookup(scheme_name))?;
                    match location {
                        ApiKeyLocation::Header => {
                            fragments.headers.push((name.to_ascii_lowercase(), secret));
                        }
                        ApiKeyLocation::Query => fragments.query.push((name.clone(), secret)),
                        ApiKeyLocation::Cookie => fragments.cookies.push((name.clone(), secret)),
                    }
                }
                SecurityScheme::Http {
                    scheme: HttpScheme::Bearer,
                } => {
                    let token = self.bearer_token(scheme_name, context).await?;
                    fragments
                        .headers
                        .push(("authorization".to_string(), format!("Bearer {token}")));
                }
                SecurityScheme::Http {
                    scheme: HttpScheme::Basic,
                } => {
                    let username = self.credentials.get(&basic_username_lookup(scheme_name))?;
                    let password = self.credentials.get(&basic_password_lookup(scheme_name))?;
                    let encoded = BASE64.encode(format!("{username}:{password}"));
                    fragments
                        .headers
                        .push(("authorization".to_string(), format!("Basic {encoded}")));
                }
            }
        }

        Some(fragments)
    }

    /// Bearer precedence: the caller's own token on this call, then the
    /// ambient store, then the managed provider.
    async fn bearer_token(&self, scheme_name: &str, context: &CallContext) -> Option<String> {
        if let Some(token) = &context.bearer_token
            && !token.is_empty()
        {
            return Some(token.clone());
        }
        if let Some(token) = self.credentials.get(&bearer_token_lookup(scheme_name)) {
            return Some(token);
        }
        if let Some(provider) = &self.bearer_provider {
            match provider.bearer_token().await {
                Ok(token) => return Some(token),
                Err(e) => {
                    tracing::warn!(scheme = %scheme_name, error = %e, "bearer provider failed");
                }
            }
        }
        None
    }
}
