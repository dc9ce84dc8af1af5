//! Tool Definition model: the serde (wire) shapes read from generated
//! module files, and the runtime form stored in the catalog.

use reqwest::Method;
use rmcp::model::{JsonObject, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::semantics::annotations_for_method;

/// Argument key carrying the nested request-body payload, when a tool
/// declares `requestBodyContentType`.
pub const REQUEST_BODY_FIELD: &str = "requestBody";

/// Where an execution parameter is placed on the outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

/// One entry of a tool's `executionParameters`: which argument goes where.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionParameter {
    /// Argument name as it appears in the input schema.
    pub name: String,

    /// Placement on the outbound request. Generated modules may use the
    /// OpenAPI-style `in` key.
    #[serde(alias = "in")]
    pub location: ParamLocation,
}

/// Carrier position for an API-key scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// HTTP authentication flavor for `type: http` schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpScheme {
    Bearer,
    Basic,
}

/// A catalog-wide security scheme. Descriptive only: schemes name a
/// mechanism and its carrier, never the secret itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    /// API key sent in a header, query parameter, or cookie.
    ApiKey {
        #[serde(alias = "in")]
        location: ApiKeyLocation,
        /// Carrier name (header/query/cookie name).
        name: String,
    },
    /// `Authorization`-header schemes (bearer token or basic credentials).
    Http { scheme: HttpScheme },
}

/// One AND-group of a tool's security requirements: every named scheme must
/// be attached for the group to apply. Values are the required scopes
/// (informational for the binder; scope enforcement is the remote's job).
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Wire form of a Tool Definition as found in generated module files.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Catalog name. Optional: for name-keyed mappings the mapping key is
    /// authoritative, and single-definition files fall back to the file
    /// stem.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Declarative schema for all caller-visible arguments. Absent or
    /// degenerate schemas downgrade validation to accept-everything.
    #[serde(default)]
    pub input_schema: Option<Value>,

    /// HTTP verb, case-insensitive.
    pub method: String,

    /// URL path with `{placeholder}` tokens.
    pub path_template: String,

    #[serde(default)]
    pub execution_parameters: Vec<ExecutionParameter>,

    /// Content type to declare when the call carries a request body.
    #[serde(default)]
    pub request_body_content_type: Option<String>,

    /// Ordered OR-list of AND-groups; first satisfiable group wins.
    #[serde(default)]
    pub security_requirements: Vec<SecurityRequirement>,
}

/// Envelope module shape: tools plus catalog-wide security schemes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEnvelope {
    pub tools: BTreeMap<String, ToolSpec>,
    #[serde(default)]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

/// One tool module document. Shapes are tried in declaration order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ModuleDoc {
    /// `{tools: {...}, securitySchemes: {...}}`
    Envelope(ModuleEnvelope),
    /// A single Tool Definition.
    Single(ToolSpec),
    /// A name-keyed mapping of Tool Definitions.
    Map(BTreeMap<String, ToolSpec>),
}

/// Runtime form of a Tool Definition: method parsed, name settled.
/// Immutable once the catalog is built.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub method: Method,
    pub path_template: String,
    pub execution_parameters: Vec<ExecutionParameter>,
    pub request_body_content_type: Option<String>,
    pub security_requirements: Vec<SecurityRequirement>,
}

impl ToolDefinition {
    /// Build the runtime form from a wire spec under an already-settled
    /// catalog name.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP method token is invalid.
    pub fn from_spec(name: impl Into<String>, spec: ToolSpec) -> Result<Self, CatalogError> {
        let name = name.into();
        let method = parse_method(&name, &spec.method)?;
        Ok(Self {
            name,
            description: spec.description,
            input_schema: spec.input_schema,
            method,
            path_template: spec.path_template,
            execution_parameters: spec.execution_parameters,
            request_body_content_type: spec.request_body_content_type,
            security_requirements: spec.security_requirements,
        })
    }

    /// Public listing entry: name, description, input schema, and
    /// method-derived annotations. Execution-only fields (path template,
    /// security requirements, parameter placement) are never exposed here.
    #[must_use]
    pub fn public_tool(&self) -> Tool {
        let schema_obj = self
            .input_schema
            .as_ref()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(JsonObject::new);
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::new(schema_obj),
        );
        tool.annotations = Some(annotations_for_method(&self.method));
        tool
    }

    /// Iterator over execution parameters at a given location, in
    /// declaration order.
    pub fn parameters_at(
        &self,
        location: ParamLocation,
    ) -> impl Iterator<Item = &ExecutionParameter> {
        self.execution_parameters
            .iter()
            .filter(move |p| p.location == location)
    }
}

fn parse_method(tool_name: &str, raw: &str) -> Result<Method, CatalogError> {
    let token = raw.trim().to_ascii_uppercase();
    Method::from_bytes(token.as_bytes()).map_err(|_| CatalogError::InvalidMethod {
        name: tool_name.to_string(),
        method: raw.to_string(),
    })
}
