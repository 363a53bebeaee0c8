//! Blocking HTTP client for the generation endpoint

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

pub struct ApiClient {
    base: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        let http = Client::builder()
            // Generation has no upper bound on duration
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn audio_url(&self, prompt: &str, preset: Option<&str>) -> Result<Url> {
        let mut params = vec![("prompt", prompt)];
        if let Some(preset) = preset {
            params.push(("preset", preset));
        }
        let endpoint = format!("{}/generate/audio", self.base);
        Url::parse_with_params(&endpoint, &params)
            .with_context(|| format!("Invalid server URL {}", self.base))
    }

    /// Request audio for `prompt`, failing on any non-2xx status.
    pub fn generate(&self, prompt: &str, preset: Option<&str>) -> Result<Bytes> {
        let url = self.audio_url(prompt, preset)?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("Could not reach {}", self.base))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Server returned {}: {}", status, body.trim());
        }

        response.bytes().context("Failed to read audio body")
    }
}
