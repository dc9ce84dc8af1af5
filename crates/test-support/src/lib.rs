use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Poll an HTTP URL until it returns a success status (2xx/3xx).
///
/// # Errors
///
/// Returns an error if the timeout elapses before the endpoint returns a success status.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
}

/// Write a tool module document into `dir` and return its path.
///
/// # Errors
///
/// Returns an error if serialization or the filesystem write fails.
pub fn write_module(
    dir: &Path,
    file_name: &str,
    doc: &serde_json::Value,
) -> anyhow::Result<PathBuf> {
    let path = dir.join(file_name);
    let rendered = serde_json::to_string_pretty(doc)?;
    std::fs::write(&path, rendered)?;
    Ok(path)
}
