//! Clients for text-generation backends.
//!
//! - **[`OllamaClient`]**: a locally reachable Ollama-compatible service
//!   (`/api/tags`, `/api/generate`, `/api/pull`).
//! - **[`ChatClient`]**: an OpenAI-compatible `/chat/completions` endpoint,
//!   used as the secondary backend.
//!
//! Both implement [`TextGenerator`]. Every call blocks the calling thread
//! and carries its own timeout: reachability checks use a short one,
//! generation a long one.
//!
//! Errors are classified so the answer cascade can tell a backend that is
//! not there at all ([`GenerationError::Unreachable`]) from one that is
//! merely slow or misbehaving.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{GenerationConfig, SecondaryConfig};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },
    #[error("generation request timed out")]
    Timeout,
    #[error("generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
    #[error("generated text too short ({len} chars)")]
    TooShort { len: usize },
    #[error("backend not initialized: {0}")]
    NotInitialized(String),
}

impl GenerationError {
    /// True when the backend is absent rather than slow or faulty.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            GenerationError::Unreachable { .. } | GenerationError::NotInitialized(_)
        )
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout
        } else if e.is_connect() {
            GenerationError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else if e.is_decode() {
            GenerationError::Malformed(e.to_string())
        } else {
            GenerationError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// A backend that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    /// Human-readable backend label, e.g. `ollama:mistral:latest`.
    fn name(&self) -> String;
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Sampling options forwarded to the service.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub num_predict: u32,
}

// ============ Ollama ============

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Blocking client for an Ollama-compatible service.
pub struct OllamaClient {
    url: String,
    client: reqwest::blocking::Client,
    detect_timeout: Duration,
    generate_timeout: Duration,
    pull_timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| GenerationError::NotInitialized(e.to_string()))?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            client,
            detect_timeout: Duration::from_secs(config.detect_timeout_secs),
            generate_timeout: Duration::from_secs(config.generate_timeout_secs),
            pull_timeout: Duration::from_secs(config.pull_timeout_secs),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Names of locally available models.
    pub fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let endpoint = format!("{}/api/tags", self.url);
        let response = self
            .client
            .get(&endpoint)
            .timeout(self.detect_timeout)
            .send()
            .map_err(|e| GenerationError::from_reqwest(&self.url, e))?;
        let response = check_status(response)?;
        let tags: TagsResponse = response
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    pub fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.num_predict,
            },
        });
        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .timeout(self.generate_timeout)
            .json(&body)
            .send()
            .map_err(|e| GenerationError::from_reqwest(&self.url, e))?;
        let response = check_status(response)?;
        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        Ok(parsed.response.trim().to_string())
    }

    /// Ask the service to download `model`; blocks until done or timed out.
    pub fn pull(&self, model: &str) -> Result<(), GenerationError> {
        let body = serde_json::json!({ "model": model, "stream": false });
        let response = self
            .client
            .post(format!("{}/api/pull", self.url))
            .timeout(self.pull_timeout)
            .json(&body)
            .send()
            .map_err(|e| GenerationError::from_reqwest(&self.url, e))?;
        check_status(response)?;
        Ok(())
    }
}

/// Pick the first model whose name contains `preferred` (case-insensitive),
/// else the first listed model.
pub fn select_model(models: &[String], preferred: &str) -> Option<String> {
    let preferred = preferred.to_lowercase();
    models
        .iter()
        .find(|m| !preferred.is_empty() && m.to_lowercase().contains(&preferred))
        .or_else(|| models.first())
        .cloned()
}

/// Detect the service and choose a model, pulling the preferred one first
/// when `auto_pull` is set and it is missing.
pub fn detect_model(
    client: &OllamaClient,
    config: &GenerationConfig,
) -> Result<String, GenerationError> {
    let mut models = client.list_models()?;
    let preferred = config.preferred_model.to_lowercase();
    let has_preferred = models.iter().any(|m| m.to_lowercase().contains(&preferred));

    if !has_preferred && config.auto_pull && !preferred.is_empty() {
        info!(model = %config.preferred_model, "pulling preferred model");
        match client.pull(&config.preferred_model) {
            Ok(()) => models = client.list_models()?,
            Err(e) => warn!(error = %e, "model pull failed"),
        }
    }

    select_model(&models, &config.preferred_model).ok_or_else(|| {
        GenerationError::NotInitialized(format!("no models available at {}", client.url()))
    })
}

/// An [`OllamaClient`] bound to one model and sampling options.
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    options: GenerateOptions,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: String, options: GenerateOptions) -> Self {
        Self {
            client,
            model,
            options,
        }
    }
}

impl TextGenerator for OllamaGenerator {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.client.generate(&self.model, prompt, self.options)
    }
}

// ============ OpenAI-compatible chat ============

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking client for an OpenAI-compatible chat completions endpoint.
pub struct ChatClient {
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl ChatClient {
    /// Fails with [`GenerationError::NotInitialized`] when the API key
    /// variable is unset.
    pub fn new(config: &SecondaryConfig, temperature: f32) -> Result<Self, GenerationError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            GenerationError::NotInitialized(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::NotInitialized(e.to_string()))?;
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature,
            client,
        })
    }
}

impl TextGenerator for ChatClient {
    fn name(&self) -> String {
        format!("chat:{}", self.model)
    }

    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        let response = self
            .client
            .post(format!("{}/chat/completions", self.url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .map_err(|e| GenerationError::from_reqwest(&self.url, e))?;
        let response = check_status(response)?;
        let parsed: ChatResponse = response
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("no choices in response".to_string()))?;
        Ok(text.trim().to_string())
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    debug!(status = status.as_u16(), "generation service error response");
    Err(GenerationError::Status {
        status: status.as_u16(),
        body,
    })
}
