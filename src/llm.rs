//! LLM client abstraction.
//!
//! Everything in Folio that needs a language model (engines, description
//! generation, the reasoning agent) goes through [`LlmClient`]. Two
//! backends are provided:
//!
//! | Provider | Client | Endpoint |
//! |----------|--------|----------|
//! | `groq`, `openai` | [`OpenAiCompatibleClient`] | `POST {base_url}/chat/completions` |
//! | `ollama` | [`OllamaClient`] | `POST {base_url}/api/generate` |
//!
//! Requests are retried with exponential backoff on HTTP 429, 5xx and
//! network errors; other 4xx responses fail immediately.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    /// Single-shot completion of `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Streaming completion. `on_delta` receives the reply piece by piece
    /// and the full reply is returned at the end.
    ///
    /// The default implementation completes once and replays the reply
    /// one character at a time.
    async fn stream_complete(
        &self,
        prompt: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        let full = self.complete(prompt).await?;
        let mut buf = [0u8; 4];
        for c in full.chars() {
            on_delta(c.encode_utf8(&mut buf));
        }
        Ok(full)
    }
}

/// Build the client named by `llm.provider`.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "groq" | "openai" => Ok(Arc::new(OpenAiCompatibleClient::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ OpenAI-compatible (OpenAI, Groq) ============

pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OpenAiCompatibleClient {
    /// Reads the API key from the configured environment variable.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let key_var = config.resolved_api_key_env();
        let api_key = std::env::var(&key_var)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", key_var))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.resolved_base_url(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    fn payload(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.payload(prompt);
        let json = post_with_retry(&self.http, &url, Some(&self.api_key), &body, self.max_retries)
            .await?;
        parse_chat_completion(&json)
    }
}

/// Extracts `choices[0].message.content`.
fn parse_chat_completion(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat completion response: missing content"))
}

// ============ Ollama ============

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = json!({ "temperature": t });
        }
        let json = post_with_retry(&self.http, &url, None, &body, self.max_retries).await?;
        parse_ollama_generate(&json)
    }
}

fn parse_ollama_generate(json: &Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response"))
}

async fn post_with_retry(
    http: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let mut request = http.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::debug!(%status, attempt, "llm request failed; retrying");
                    last_err = Some(anyhow::anyhow!("LLM API error {}: {}", status, body_text));
                    continue;
                }

                bail!("LLM API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("LLM connection error ({}): {}", url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("LLM request failed after retries")))
}
