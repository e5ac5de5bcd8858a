//! Ollama HTTP client.
//!
//! Talks to the REST API directly with reqwest: `POST /api/generate` for
//! completions and `GET /api/tags` for liveness and the model list.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use minirag_core::config::LlmSettings;
use minirag_core::traits::Generator;
use minirag_core::types::Chunk;

use crate::error::LlmError;
use crate::prompt::render_prompt;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Clone)]
pub struct OllamaGenerator {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str) -> Result<Self, LlmError> {
        Self::build(base_url, model, 0.1, Duration::from_secs(120))
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        Self::build(&settings.base_url, &settings.model, settings.temperature, settings.timeout())
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, LlmError> {
        Self::build(&self.base_url, &self.model, self.temperature, timeout)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build(base_url: &str, model: &str, temperature: f32, timeout: Duration) -> Result<Self, LlmError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(LlmError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a raw prompt and return the model's completion.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        debug!(model = %self.model, prompt_chars = prompt.len(), "ollama generate");
        let resp = self.http.post(&url).json(&body).send().await.map_err(|e| self.classify(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = %status, model = %self.model, "ollama generate failed");
            return Err(LlmError::Status { status: status.as_u16(), body: text });
        }
        let parsed: GenerateResponse = resp.json().await.map_err(|e| self.classify(&url, e))?;
        Ok(parsed.response.trim().to_string())
    }

    /// Names of the models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = self.http.get(&url).timeout(PROBE_TIMEOUT).send().await.map_err(|e| self.classify(&url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body: resp.text().await.unwrap_or_default() });
        }
        let tags: TagsResponse = resp.json().await.map_err(|e| self.classify(&url, e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    fn classify(&self, url: &str, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(self.timeout)
        } else if e.is_decode() {
            LlmError::Decode(e.to_string())
        } else {
            LlmError::Unavailable { url: url.to_string(), message: e.to_string() }
        }
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, contexts: &[Chunk]) -> minirag_core::Result<String> {
        let prompt = render_prompt(question, contexts);
        Ok(self.complete(&prompt).await?)
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(models) => {
                if !models.iter().any(|m| m == &self.model || m.split(':').next() == Some(self.model.as_str())) {
                    info!(model = %self.model, "ollama is up but the model is not pulled yet");
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "ollama not available");
                false
            }
        }
    }
}
