//! Client for the ACE-Step generation API
//!
//! Submit/poll protocol: a generation request yields a task id, the task is
//! polled until it reaches a terminal status, and the finished artifact is
//! resolved either through the shared output mount or, failing that, by
//! downloading it over HTTP.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How often the health endpoint is probed during startup.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Parameters for one music generation task.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub caption: String,
    pub lyrics: String,
    pub audio_duration: u32,
    pub inference_steps: u32,
    pub guidance_scale: f64,
    pub shift: f64,
    pub infer_method: String,
    pub thinking: bool,
    pub use_cot_caption: bool,
    pub use_cot_language: bool,
    pub vocal_language: String,
    pub seed: i64,
    pub use_random_seed: bool,
    pub batch_size: u32,
    pub audio_format: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    code: i64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ReleaseData>,
}

#[derive(Debug, Deserialize)]
struct ReleaseData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[allow(dead_code)]
    code: i64,
    #[serde(default)]
    data: Vec<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[allow(dead_code)]
    task_id: String,
    /// 0 = running, 1 = success, 2 = failed
    status: i64,
    /// JSON-encoded string with per-file results
    #[serde(default)]
    result: String,
}

#[derive(Debug, Deserialize)]
struct ResultItem {
    #[serde(default)]
    file: String,
    #[allow(dead_code)]
    #[serde(default)]
    status: i64,
}

/// Client for the generator's REST API.
pub struct Client {
    api_url: String,
    api_key: String,
    output_dir: PathBuf,
    http: reqwest::Client,
}

impl Client {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            output_dir,
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Block until the generator answers health checks, or the deadline
    /// passes. The deadline is the only failure: probes retry every 5 s.
    pub async fn wait_for_healthy(
        &self,
        cancel: &CancellationToken,
        deadline: Duration,
    ) -> Result<()> {
        info!("waiting for the generator to become ready...");
        let give_up = Instant::now() + deadline;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.http.get(format!("{}/health", self.api_url)).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("generator is healthy");
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("generator health returned {}", resp.status());
                }
                Err(e) => {
                    warn!("generator not ready: {e}");
                }
            }

            if Instant::now() + HEALTH_POLL_INTERVAL > give_up {
                return Err(Error::Unavailable(format!(
                    "no healthy response within {deadline:?}"
                )));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(HEALTH_POLL_INTERVAL) => {}
            }
        }
    }

    /// Submit a generation task and return its task id.
    pub async fn generate(&self, req: &GenerateRequest) -> Result<String> {
        let mut builder = self
            .http
            .post(format!("{}/release_task", self.api_url))
            .json(req);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let resp: ReleaseResponse = builder.send().await?.json().await?;

        if resp.code != 200 {
            return Err(Error::Protocol(format!(
                "submit rejected (code {}): {}",
                resp.code,
                resp.error.unwrap_or_default()
            )));
        }

        resp.data
            .map(|d| d.task_id)
            .ok_or_else(|| Error::Protocol("submit response missing task id".to_string()))
    }

    /// Poll a task until it terminates, returning the local artifact path.
    ///
    /// Transient transport or decode errors just retry after `interval`.
    pub async fn poll_until_done(
        &self,
        cancel: &CancellationToken,
        task_id: &str,
        interval: Duration,
    ) -> Result<PathBuf> {
        let body = serde_json::json!({ "task_id_list": [task_id] });

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut builder = self
                .http
                .post(format!("{}/query_result", self.api_url))
                .json(&body);
            if !self.api_key.is_empty() {
                builder = builder.bearer_auth(&self.api_key);
            }

            let task = match builder.send().await {
                Ok(resp) => match resp.json::<QueryResponse>().await {
                    Ok(parsed) => parsed.data.into_iter().next(),
                    Err(e) => {
                        warn!("poll decode error: {e}, retrying...");
                        None
                    }
                },
                Err(e) => {
                    warn!("poll error: {e}, retrying...");
                    None
                }
            };

            match task {
                Some(task) if task.status == 1 => return self.resolve_artifact(&task.result).await,
                Some(task) if task.status == 2 => {
                    return Err(Error::GenerationFailed {
                        task_id: task_id.to_string(),
                    })
                }
                // still running, or nothing usable this round
                _ => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Turn a success payload into a local file path.
    ///
    /// Fast path: the artifact reference carries a `?path=` query naming the
    /// file relative to the shared output mount. Fallback for any filesystem
    /// miss: download the artifact over HTTP into a kept temp file.
    async fn resolve_artifact(&self, result_json: &str) -> Result<PathBuf> {
        let items: Vec<ResultItem> = serde_json::from_str(result_json)
            .map_err(|e| Error::Protocol(format!("unparseable result payload: {e}")))?;

        let file_ref = items
            .first()
            .map(|i| i.file.as_str())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| Error::Protocol("no audio file in result".to_string()))?;

        if let Some(relative) = artifact_relative_path(&self.api_url, file_ref) {
            let local = self.output_dir.join(&relative);
            if local.exists() {
                return Ok(local);
            }
        }

        self.download_artifact(file_ref).await
    }

    async fn download_artifact(&self, file_ref: &str) -> Result<PathBuf> {
        let url = format!("{}{}", self.api_url, file_ref);
        info!("artifact not on shared mount, downloading {url}");

        let bytes = self.http.get(&url).send().await?.bytes().await?;

        let suffix = artifact_relative_path(&self.api_url, file_ref)
            .and_then(|rel| {
                PathBuf::from(rel)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
            })
            .unwrap_or_else(|| ".audio".to_string());

        let mut tmp = tempfile::Builder::new()
            .prefix("everwave-")
            .suffix(&suffix)
            .tempfile()?;
        tmp.write_all(&bytes)?;
        let (_file, path) = tmp.keep().map_err(|e| Error::Io(e.error))?;
        Ok(path)
    }
}

/// Extract the shared-mount-relative path from an artifact reference of the
/// shape `/<prefix>?path=<relative>`.
fn artifact_relative_path(api_url: &str, file_ref: &str) -> Option<String> {
    let full = format!("{api_url}{file_ref}");
    let parsed = url::Url::parse(&full).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "path")
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_from_artifact_ref() {
        let rel = artifact_relative_path(
            "http://acestep:8000",
            "/v1/audio?path=outputs/task_abc/0.flac",
        );
        assert_eq!(rel.as_deref(), Some("outputs/task_abc/0.flac"));
    }

    #[test]
    fn artifact_ref_without_path_query() {
        assert_eq!(
            artifact_relative_path("http://acestep:8000", "/v1/audio?id=42"),
            None
        );
        assert_eq!(artifact_relative_path("http://acestep:8000", "/v1/audio"), None);
    }

    #[test]
    fn release_response_parses() {
        let resp: ReleaseResponse = serde_json::from_str(
            r#"{"code":200,"data":{"task_id":"task-123"}}"#,
        )
        .unwrap();
        assert_eq!(resp.code, 200);
        assert_eq!(resp.data.unwrap().task_id, "task-123");
    }

    #[test]
    fn query_response_parses_nested_result_string() {
        let resp: QueryResponse = serde_json::from_str(
            r#"{"code":200,"data":[{"task_id":"t1","status":1,
                "result":"[{\"file\":\"/v1/audio?path=outputs/t1/0.flac\",\"status\":0}]"}]}"#,
        )
        .unwrap();
        let task = &resp.data[0];
        assert_eq!(task.status, 1);

        let items: Vec<ResultItem> = serde_json::from_str(&task.result).unwrap();
        assert_eq!(items[0].file, "/v1/audio?path=outputs/t1/0.flac");
    }

    #[tokio::test]
    async fn shared_mount_fast_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("outputs/t9")).unwrap();
        let artifact = dir.path().join("outputs/t9/0.flac");
        std::fs::write(&artifact, b"flac-bytes").unwrap();

        let client = Client::new("http://127.0.0.1:1", "", dir.path().to_path_buf());
        let resolved = client
            .resolve_artifact(r#"[{"file":"/v1/audio?path=outputs/t9/0.flac","status":0}]"#)
            .await
            .unwrap();
        assert_eq!(resolved, artifact);
    }

    #[tokio::test]
    async fn missing_file_reference_is_protocol_error() {
        let client = Client::new("http://127.0.0.1:1", "", PathBuf::from("/tmp"));
        let err = client.resolve_artifact(r#"[]"#).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
