//! The tool invocation pipeline facade.
//!
//! One entry point per protocol operation: `list_tools` exposes the
//! catalog's public view, `call_tool` runs validate, bind, build, execute
//! to a terminal outcome. `call_tool` is infallible by construction: every
//! pipeline failure is rendered into the result envelope with `isError`
//! set, so a caller receives exactly one response per call, success or
//! formatted error, never an exception and never silence.

use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::credentials::CallContext;
use crate::error::{InvokeError, InvokeResult};
use crate::executor::{Executor, redact_url};
use crate::request;
use crate::security::SecurityBinder;
use crate::validate::ArgumentValidator;

pub struct Invoker {
    catalog: Arc<Catalog>,
    validators: HashMap<String, ArgumentValidator>,
    binder: SecurityBinder,
    executor: Executor,
    base_url: Option<String>,
}

impl Invoker {
    /// Validators are compiled once here; the per-call path never touches
    /// schema compilation.
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        binder: SecurityBinder,
        executor: Executor,
        base_url: Option<String>,
    ) -> Self {
        let validators = catalog
            .definitions()
            .map(|def| {
                (
                    def.name.clone(),
                    ArgumentValidator::compile(def.input_schema.as_ref()),
                )
            })
            .collect();
        Self {
            catalog,
            validators,
            binder,
            executor,
            base_url,
        }
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.catalog.list()
    }

    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.catalog.len()
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        context: CallContext,
    ) -> CallToolResult {
        match self
            .try_call(name, &arguments.unwrap_or_default(), &context)
            .await
        {
            Ok(text) => CallToolResult::success(vec![Content::text(text)]),
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "tool call failed");
                CallToolResult {
                    content: vec![Content::text(e.caller_text())],
                    structured_content: None,
                    is_error: Some(true),
                    meta: None,
                }
            }
        }
    }

    async fn try_call(
        &self,
        name: &str,
        arguments: &JsonObject,
        context: &CallContext,
    ) -> InvokeResult<String> {
        let definition = self
            .catalog
            .get(name)
            .ok_or_else(|| InvokeError::UnknownTool(name.to_string()))?;

        if let Some(validator) = self.validators.get(name) {
            validator.validate(arguments).map_err(InvokeError::Validation)?;
        }

        let fragments = self
            .binder
            .resolve(definition, &self.catalog, context)
            .await;
        let spec = request::build(definition, arguments, &fragments, self.base_url.as_deref())?;
        tracing::debug!(
            tool = %name,
            method = %spec.method,
            url = %redact_url(&spec.url),
            "dispatching tool call"
        );
        self.executor.execute(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AmbientCredentials;
    use crate::definition::{
        ApiKeyLocation, ExecutionParameter, ParamLocation, SecurityScheme, ToolDefinition,
        ToolSpec,
    };
    use crate::executor::ExecutorConfig;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::collections::{BTreeMap, HashMap};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    async fn spawn_server(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        addr
    }

    fn tool(
        name: &str,
        method: &str,
        path_template: &str,
        input_schema: Option<Value>,
        parameters: Vec<(&str, ParamLocation)>,
        requirements: Vec<&str>,
    ) -> ToolDefinition {
        ToolDefinition::from_spec(
            name,
            ToolSpec {
                name: None,
                description: String::new(),
                input_schema,
                method: method.to_string(),
                path_template: path_template.to_string(),
                execution_parameters: parameters
                    .into_iter()
                    .map(|(pname, location)| ExecutionParameter {
                        name: pname.to_string(),
                        location,
                    })
                    .collect(),
                request_body_content_type: None,
                security_requirements: requirements
                    .into_iter()
                    .map(|scheme| {
                        let mut group = BTreeMap::new();
                        group.insert(scheme.to_string(), Vec::new());
                        group
                    })
                    .collect(),
            },
        )
        .expect("valid spec")
    }

    fn invoker(catalog: Catalog, base_url: &str, values: &[(&str, &str)]) -> Invoker {
        let store = AmbientCredentials::new(
            values
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<HashMap<_, _>>(),
            false,
        );
        Invoker::new(
            Arc::new(catalog),
            SecurityBinder::new(store, None),
            Executor::new(reqwest::Client::new(), ExecutorConfig::default()),
            Some(base_url.to_string()),
        )
    }

    fn result_text(result: &CallToolResult) -> String {
        let value = serde_json::to_value(result).expect("serialize result");
        value["content"][0]["text"]
            .as_str()
            .expect("text content")
            .to_string()
    }

    fn args(value: Value) -> Option<JsonObject> {
        Some(value.as_object().expect("object literal").clone())
    }

    #[tokio::test]
    async fn successful_call_returns_formatted_body() {
        let app = Router::new().route(
            "/v2/files/{id}",
            get(|| async { axum::Json(json!({"data": {"id": "f-1"}})) }),
        );
        let addr = spawn_server(app).await;

        let mut catalog = Catalog::new();
        catalog.insert(tool(
            "getFile",
            "GET",
            "/v2/files/{fileID}",
            None,
            vec![("fileID", ParamLocation::Path)],
            vec![],
        ));
        let invoker = invoker(catalog, &format!("http://{addr}"), &[]);

        let result = invoker
            .call_tool("getFile", args(json!({"fileID": "f-1"})), CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(false));
        let expected =
            serde_json::to_string_pretty(&json!({"data": {"id": "f-1"}})).expect("pretty");
        assert_eq!(result_text(&result), expected);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_in_band_error() {
        let invoker = invoker(Catalog::new(), "http://127.0.0.1:1", &[]);
        let result = invoker
            .call_tool("missing", None, CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(true));
        assert_eq!(result_text(&result), "Error: unknown tool 'missing'");
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_the_network() {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler_hits = Arc::clone(&hits);
        let app = Router::new().route(
            "/v2/files",
            get(move || {
                let hits = Arc::clone(&handler_hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "unreachable"
                }
            }),
        );
        let addr = spawn_server(app).await;

        let mut catalog = Catalog::new();
        catalog.insert(tool(
            "listFiles",
            "GET",
            "/v2/files",
            Some(json!({
                "type": "object",
                "properties": {"limit": {"type": "integer"}}
            })),
            vec![("limit", ParamLocation::Query)],
            vec![],
        ));
        let invoker = invoker(catalog, &format!("http://{addr}"), &[]);

        let result = invoker
            .call_tool("listFiles", args(json!({"limit": "ten"})), CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).starts_with("Invalid params"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_path_argument_is_a_local_failure() {
        let mut catalog = Catalog::new();
        catalog.insert(tool(
            "getFile",
            "GET",
            "/v2/files/{fileID}",
            None,
            vec![("fileID", ParamLocation::Path)],
            vec![],
        ));
        // The base URL points nowhere; a network attempt would fail loudly.
        let invoker = invoker(catalog, "http://127.0.0.1:1", &[]);

        let result = invoker
            .call_tool("getFile", args(json!({})), CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            result_text(&result),
            "Path resolution error: no value for '{fileID}' in '/v2/files/{fileID}'"
        );
    }

    #[tokio::test]
    async fn remote_failure_is_rendered_with_status_and_body() {
        let app = Router::new().route(
            "/v2/files/{id}",
            get(|| async { (StatusCode::NOT_FOUND, axum::Json(json!({"error": "no such file"}))) }),
        );
        let addr = spawn_server(app).await;

        let mut catalog = Catalog::new();
        catalog.insert(tool(
            "getFile",
            "GET",
            "/v2/files/{fileID}",
            None,
            vec![("fileID", ParamLocation::Path)],
            vec![],
        ));
        let invoker = invoker(catalog, &format!("http://{addr}"), &[]);

        let result = invoker
            .call_tool("getFile", args(json!({"fileID": "nope"})), CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(true));
        let text = result_text(&result);
        assert!(text.starts_with("API returned 404 Not Found:"), "got: {text}");
        assert!(text.contains("no such file"));
    }

    #[tokio::test]
    async fn configured_api_key_is_attached() {
        async fn echo(headers: HeaderMap) -> axum::Json<Value> {
            axum::Json(json!({
                "x_api_key": headers.get("x-api-key").and_then(|v| v.to_str().ok()),
            }))
        }
        let app = Router::new().route("/v2/files", get(echo));
        let addr = spawn_server(app).await;

        let mut catalog = Catalog::new();
        catalog.insert_scheme(
            "apiKey".to_string(),
            SecurityScheme::ApiKey {
                location: ApiKeyLocation::Header,
                name: "X-API-Key".to_string(),
            },
        );
        catalog.insert(tool(
            "listFiles",
            "GET",
            "/v2/files",
            None,
            vec![],
            vec!["apiKey"],
        ));
        let invoker = invoker(
            catalog,
            &format!("http://{addr}"),
            &[("API_KEY_APIKEY", "k-1")],
        );

        let result = invoker
            .call_tool("listFiles", None, CallContext::default())
            .await;

        assert_eq!(result.is_error, Some(false));
        let echoed: Value = serde_json::from_str(&result_text(&result)).expect("echo json");
        assert_eq!(echoed["x_api_key"], "k-1");
    }
}
