//! Client for a local Ollama API
//!
//! Optional: when configured, it enriches generation captions and track
//! names. Everything here is best-effort; callers fall back to static text
//! whenever the LLM is unreachable or returns garbage.

pub mod caption;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use caption::CaptionGenerator;

/// How often readiness is probed.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Thin client over the Ollama generate API.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http: reqwest::Client::builder()
                // The first call loads the model into VRAM, which is slow.
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
        }
    }

    /// The configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the API answers at all.
    pub async fn available(&self) -> bool {
        match self.http.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Poll until the API responds or the token is cancelled. Non-fatal:
    /// callers degrade to static captions when this returns false.
    pub async fn wait_for_ready(&self, cancel: &CancellationToken, budget: Duration) -> bool {
        let give_up = tokio::time::Instant::now() + budget;
        loop {
            if self.available().await {
                info!("ollama ready (model: {})", self.model);
                return true;
            }
            if tokio::time::Instant::now() + READY_POLL_INTERVAL > give_up {
                return false;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }

    /// Send a prompt with a system message and return the raw response text.
    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let body = GenerateBody {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: serde_json::json!({
                "temperature": 0.9,
                "top_p": 0.95,
                // Captions are short; cap the output.
                "num_predict": 128,
                "repeat_penalty": 1.1,
            }),
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Protocol(format!("ollama status {status}: {text}")));
        }

        let parsed: GenerateResponse = resp.json().await?;
        Ok(parsed.response.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = Client::new("http://ollama:11434/", "qwen3:8b");
        assert_eq!(client.base_url, "http://ollama:11434");
        assert_eq!(client.model(), "qwen3:8b");
    }

    #[tokio::test]
    async fn unreachable_host_is_unavailable() {
        let client = Client::new("http://127.0.0.1:1", "qwen3:8b");
        assert!(!client.available().await);
    }
}
