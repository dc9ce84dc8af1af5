use anyhow::Context as _;
use futures::StreamExt as _;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncBufReadExt as _;
use tokio_util::io::StreamReader;

use toolbridge_gateway::config::GatewayConfig;

/// Minimal MCP client for the gateway's streamable HTTP endpoint (`/mcp`).
///
/// This intentionally avoids re-implementing any MCP logic in production
/// code; it exists only for integration tests.
pub struct McpStreamableHttpSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl McpStreamableHttpSession {
    pub async fn connect(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();

        // initialize → creates session id header and returns first response over event-stream
        let init_resp = post_mcp(
            &client,
            &base_url,
            None,
            json!({
                "jsonrpc": "2.0",
                "id": 0,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "toolbridge-gateway-integration-tests", "version": "0" }
                }
            }),
        )
        .await?;

        let session_id = init_resp
            .headers()
            .get("Mcp-Session-Id")
            .and_then(|h| h.to_str().ok())
            .context("missing Mcp-Session-Id header")?
            .to_string();

        let init_msg = read_first_event_stream_json_message(init_resp).await?;
        anyhow::ensure!(init_msg.get("id") == Some(&json!(0)), "unexpected init id");

        // notifications/initialized
        let initialized_resp = post_mcp_raw(
            &client,
            &base_url,
            Some(&session_id),
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await?;

        anyhow::ensure!(
            initialized_resp.status().as_u16() == 202,
            "POST /mcp notifications/initialized returned {}",
            initialized_resp.status()
        );

        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn request(
        &self,
        id: u64,
        method: &str,
        params: serde_json::Value,
        timeout_dur: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        self.request_with_headers(id, method, params, &[], timeout_dur)
            .await
    }

    /// Like [`request`], with extra headers on the POST. Used to exercise
    /// caller-supplied `Authorization` passthrough.
    pub async fn request_with_headers(
        &self,
        id: u64,
        method: &str,
        params: serde_json::Value,
        extra_headers: &[(&str, &str)],
        timeout_dur: Duration,
    ) -> anyhow::Result<serde_json::Value> {
        let mut req = self
            .client
            .post(format!("{}/mcp", self.base_url))
            .header("Accept", "application/json, text/event-stream")
            .header("Content-Type", "application/json")
            .header("Mcp-Session-Id", &self.session_id)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }));
        for (name, value) in extra_headers {
            req = req.header(*name, *value);
        }
        let resp = req
            .send()
            .await
            .context("POST /mcp")?
            .error_for_status()
            .context("POST /mcp status")?;

        let msg = tokio::time::timeout(timeout_dur, read_first_event_stream_json_message(resp))
            .await
            .context("timeout waiting for event-stream response")??;

        Ok(msg)
    }

    /// Open the standalone server stream for this session.
    pub async fn open_standalone_stream(&self) -> anyhow::Result<reqwest::Response> {
        self.client
            .get(format!("{}/mcp", self.base_url))
            .header("Accept", "text/event-stream")
            .header("Mcp-Session-Id", &self.session_id)
            .send()
            .await
            .context("GET /mcp")
    }

    /// Terminate the session; returns the raw status code.
    pub async fn delete(&self) -> anyhow::Result<u16> {
        let resp = self
            .client
            .delete(format!("{}/mcp", self.base_url))
            .header("Mcp-Session-Id", &self.session_id)
            .send()
            .await
            .context("DELETE /mcp")?;
        Ok(resp.status().as_u16())
    }
}

/// Extract the text block of a tool call result.
pub fn tool_result_text(msg: &serde_json::Value) -> anyhow::Result<String> {
    let text = msg
        .get("result")
        .and_then(|r| r.get("content"))
        .and_then(serde_json::Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("text"))
        .and_then(serde_json::Value::as_str)
        .context("tools/call missing result.content[0].text")?;
    Ok(text.to_string())
}

/// Parse the text block of a tool call result as JSON.
pub fn tool_result_json(msg: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    let text = tool_result_text(msg)?;
    serde_json::from_str(&text).context("tools/call text is not JSON")
}

pub fn tool_result_is_error(msg: &serde_json::Value) -> bool {
    msg.get("result")
        .and_then(|r| r.get("isError"))
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

pub async fn post_mcp(
    client: &reqwest::Client,
    base_url: &str,
    session_id: Option<&str>,
    body: serde_json::Value,
) -> anyhow::Result<reqwest::Response> {
    post_mcp_raw(client, base_url, session_id, &body)
        .await?
        .error_for_status()
        .context("POST /mcp status")
}

/// POST without status checking, for protocol-edge assertions.
pub async fn post_mcp_raw(
    client: &reqwest::Client,
    base_url: &str,
    session_id: Option<&str>,
    body: &serde_json::Value,
) -> anyhow::Result<reqwest::Response> {
    let mut req = client
        .post(format!("{}/mcp", base_url.trim_end_matches('/')))
        .header("Accept", "application/json, text/event-stream")
        .header("Content-Type", "application/json")
        .json(body);

    if let Some(session_id) = session_id {
        req = req.header("Mcp-Session-Id", session_id);
    }

    req.send().await.context("POST /mcp")
}

pub async fn read_first_event_stream_json_message(
    resp: reqwest::Response,
) -> anyhow::Result<serde_json::Value> {
    let mut stream = resp.bytes_stream();
    let byte_stream = futures::stream::poll_fn(move |cx| stream.poll_next_unpin(cx))
        .map(|r| r.map_err(std::io::Error::other));
    let reader = StreamReader::new(byte_stream);
    let mut lines = tokio::io::BufReader::new(reader).lines();

    let mut data_lines: Vec<String> = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end().to_string();

        if line.is_empty() {
            if data_lines.is_empty() {
                continue;
            }
            let data = data_lines.join("\n");
            return serde_json::from_str(&data).context("parse event-stream data as JSON");
        }

        if let Some(v) = line.strip_prefix("data:") {
            data_lines.push(v.trim().to_string());
        }
    }

    anyhow::bail!("event-stream ended without a JSON message")
}

/// Start a gateway with the given config on an ephemeral port and wait
/// until it serves `/health`.
pub async fn spawn_gateway(config: &GatewayConfig) -> anyhow::Result<String> {
    let state = toolbridge_gateway::build_state(config);
    let app = toolbridge_gateway::app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind gateway listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let base_url = format!("http://{addr}");
    toolbridge_test_support::wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(5))
        .await?;
    Ok(base_url)
}

/// Serve an upstream stand-in on an ephemeral port.
pub async fn spawn_upstream(app: axum::Router) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind upstream listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(addr)
}
