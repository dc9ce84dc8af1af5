use std::path::PathBuf;
use thiserror::Error;

use crate::validate::ValidationFailure;

/// Load-time failures for one catalog source.
///
/// The registry treats these as diagnostics: a failing module is logged and
/// skipped, it never aborts the load.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read tool module {path}")]
    ModuleRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tool module '{label}' does not match any known document shape: {reason}")]
    ModuleShape { label: String, reason: String },
    #[error("tool '{name}' has invalid HTTP method '{method}'")]
    InvalidMethod { name: String, method: String },
}

/// Families of tool-call failure.
///
/// Every variant is caught at the invocation boundary and rendered into the
/// caller's result envelope; none of them escape a tool call or touch the
/// session that issued it.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Requested name is absent from the catalog. No request is attempted.
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    /// Arguments failed schema validation. Local failure; never reaches the
    /// network.
    #[error("{0}")]
    Validation(ValidationFailure),
    /// A `{placeholder}` survived substitution. Tool definition / caller
    /// input mismatch; not retryable.
    #[error("unresolved path placeholder '{{{placeholder}}}' in '{template}'")]
    PathResolution { template: String, placeholder: String },
    /// The request could not be constructed or dispatched at all.
    #[error("request setup failed: {0}")]
    Setup(String),
    /// The request went out but no usable response came back.
    #[error("network failure: {message}")]
    Network {
        code: Option<String>,
        message: String,
    },
    /// The remote answered with a non-2xx status. `body` is already
    /// truncated to the configured preview length.
    #[error("API returned {status} {status_text}")]
    Api {
        status: u16,
        status_text: String,
        body: String,
    },
}

pub type InvokeResult<T> = std::result::Result<T, InvokeError>;

impl InvokeError {
    /// Text form delivered to the caller inside the error envelope.
    #[must_use]
    pub fn caller_text(&self) -> String {
        match self {
            Self::UnknownTool(name) => format!("Error: unknown tool '{name}'"),
            Self::Validation(failure) => failure.caller_text(),
            Self::PathResolution {
                template,
                placeholder,
            } => format!(
                "Path resolution error: no value for '{{{placeholder}}}' in '{template}'"
            ),
            Self::Setup(message) => format!("Request setup error: {message}"),
            Self::Network { code, message } => match code {
                Some(code) => format!("Network error ({code}): {message}"),
                None => format!("Network error: {message}"),
            },
            Self::Api {
                status,
                status_text,
                body,
            } => {
                if body.is_empty() {
                    format!("API returned {status} {status_text}")
                } else {
                    format!("API returned {status} {status_text}: {body}")
                }
            }
        }
    }
}
