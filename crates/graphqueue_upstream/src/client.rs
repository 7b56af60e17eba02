//! Typed wrapper over the upstream graph-runner's HTTP surface. Wraps a
//! configured `reqwest::Client` with a small, typed request surface
//! instead of exposing the raw client to callers.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::UpstreamError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(7200);

/// Fields checked, in order, when extracting a human-readable message
/// from an HTTP 400 validation response body.
const VALIDATION_MESSAGE_FIELDS: &[&str] =
    &["error", "message", "details", "node_errors", "exception_message"];

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpstreamError::Generic(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /system_stats`; any failure (including a non-2xx response) is
    /// reported as unhealthy rather than propagated.
    pub async fn health(&self) -> bool {
        match self.http.get(self.url("/system_stats")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    /// `POST /prompt` with `{"prompt": graph}`; returns the upstream's
    /// `prompt_id`.
    pub async fn queue_prompt(&self, graph: &Value) -> Result<String, UpstreamError> {
        let body = serde_json::json!({ "prompt": graph });

        let response = self
            .http
            .post(self.url("/prompt"))
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(UpstreamError::Validation(extract_message(&body)));
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ServerError {
                status: status.as_u16(),
                body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Generic(format!("unexpected status {status}: {body}")));
        }

        let parsed: Value = response.json().await.map_err(UpstreamError::from_reqwest)?;
        parsed
            .get("prompt_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| UpstreamError::Generic("response missing prompt_id".to_string()))
    }

    /// `GET /history/{id}`; `None` when the id isn't present yet.
    pub async fn history(&self, upstream_id: &str) -> Result<Option<Value>, UpstreamError> {
        let response = self
            .http
            .get(self.url(&format!("/history/{upstream_id}")))
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::ServerError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: Value = response.json().await.map_err(UpstreamError::from_reqwest)?;
        Ok(parsed.get(upstream_id).cloned())
    }

    /// `GET /queue`; union of `queue_running` and `queue_pending` ids.
    pub async fn queue_ids(&self) -> Result<HashSet<String>, UpstreamError> {
        let response = self
            .http
            .get(self.url("/queue"))
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let parsed: Value = response.json().await.map_err(UpstreamError::from_reqwest)?;
        let mut ids = HashSet::new();
        for key in ["queue_running", "queue_pending"] {
            if let Some(rows) = parsed.get(key).and_then(|v| v.as_array()) {
                for row in rows {
                    if let Some(id) = row.get(1).and_then(|v| v.as_str()) {
                        ids.insert(id.to_string());
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Poll `history` until the entry reports completion, a terminal
    /// failure status, or `timeout` elapses.
    pub async fn poll_until_done(
        &self,
        upstream_id: &str,
        poll_interval: Option<Duration>,
        timeout: Option<Duration>,
    ) -> Result<(bool, String), UpstreamError> {
        let poll_interval = poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        let timeout = timeout.unwrap_or(DEFAULT_POLL_TIMEOUT);
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(entry) = self.history(upstream_id).await? {
                if let Some((completed, status_str)) = extract_status(&entry) {
                    if completed {
                        return Ok((true, status_str));
                    }
                    if matches!(status_str.as_str(), "error" | "failed" | "canceled") {
                        return Ok((false, status_str));
                    }
                }
            }

            if Instant::now() >= deadline {
                warn!(upstream_id, "poll_until_done timed out");
                return Ok((false, "timeout".to_string()));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Walk the history entry's `outputs` map, collecting `subfolder/filename`
    /// for every `images`/`videos`/`gifs` entry (omitting `subfolder` when
    /// empty).
    pub async fn outputs(&self, upstream_id: &str) -> Result<Vec<String>, UpstreamError> {
        let Some(entry) = self.history(upstream_id).await? else {
            return Ok(Vec::new());
        };

        let mut paths = Vec::new();
        let Some(outputs) = entry.get("outputs").and_then(|v| v.as_object()) else {
            return Ok(paths);
        };

        for node_output in outputs.values() {
            for kind in ["images", "videos", "gifs"] {
                let Some(items) = node_output.get(kind).and_then(|v| v.as_array()) else {
                    continue;
                };
                for item in items {
                    let Some(filename) = item.get("filename").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    let subfolder = item.get("subfolder").and_then(|v| v.as_str()).unwrap_or("");
                    let path = if subfolder.is_empty() {
                        filename.to_string()
                    } else {
                        format!("{subfolder}/{filename}")
                    };
                    paths.push(path);
                }
            }
        }

        Ok(paths)
    }
}

fn extract_status(entry: &Value) -> Option<(bool, String)> {
    let status = entry.get("status")?;
    let completed = status.get("completed").and_then(|v| v.as_bool()).unwrap_or(false);
    let status_str = status
        .get("status_str")
        .and_then(|v| v.as_str())
        .unwrap_or("running")
        .to_string();
    Some((completed, status_str))
}

fn extract_message(body: &Value) -> String {
    for field in VALIDATION_MESSAGE_FIELDS {
        if let Some(value) = body.get(field) {
            if let Some(s) = value.as_str() {
                return s.to_string();
            }
            return value.to_string();
        }
    }
    body.to_string()
}
