/*!
 * Ollama client and model adapter.
 *
 * The Ollama server keeps the model resident on the GPU; loading and
 * unloading it is the server's business. `OllamaModel` sends each batch as
 * one framed prompt to `/api/generate`.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::translation::glossary::GlossaryTerm;
use crate::translation::translator::{
    build_batch_prompt, parse_batch_response, render_system_prompt, ItemOutcome, LanguagePair, TranslationModel,
};

/// Ollama client for interacting with Ollama API
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    /// How long to keep the model loaded in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    pub model: String,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: Some(false),
            keep_alive: None,
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Set the keep-alive duration
    pub fn keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = Some(keep_alive.into());
        self
    }
}

impl Ollama {
    /// Create a client from an endpoint such as `http://localhost:11434` or `gpu-box:11434`
    pub fn from_endpoint(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        if endpoint.trim().is_empty() {
            return Err(ProviderError::ConnectionError("Endpoint cannot be empty".to_string()));
        }

        let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("http://{}", endpoint))
        }
        .map_err(|e| ProviderError::ConnectionError(format!("Invalid endpoint {}: {}", endpoint, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| ProviderError::ConnectionError(format!("Invalid host in endpoint: {}", endpoint)))?;
        let port = url.port_or_known_default().unwrap_or(11434);
        let base_url = format!("{}://{}:{}", url.scheme(), host, port);

        let client = Client::builder()
            .timeout(timeout)
            // Ollama speaks HTTP/1.1
            .http1_only()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate text from the Ollama API. Failures are returned as-is, never retried.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Ollama API error ({}): {}", status, error_text);
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to get response text: {}", e)))?;

        parse_generation_response(&response_text)
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(format!("Failed to connect to Ollama: {}", e)))?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Ollama version response: {}", e)))?;

        response["version"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

/// Parse a generate response; streamed JSONL bodies are concatenated
fn parse_generation_response(response_text: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(parsed) = serde_json::from_str::<GenerationResponse>(response_text) {
        return Ok(parsed);
    }

    let mut full_response = String::new();
    let mut last: Option<serde_json::Value> = None;
    for line in response_text.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| {
            let preview: String = response_text.chars().take(500).collect();
            error!("Failed to parse Ollama API response: {}. Raw response (first 500 chars): {}", e, preview);
            ProviderError::ParseError(format!("Response contains invalid JSON: {}", e))
        })?;
        if let Some(part) = value.get("response").and_then(|v| v.as_str()) {
            full_response.push_str(part);
        }
        last = Some(value);
    }

    let last = last.ok_or_else(|| ProviderError::ParseError("Empty response body".to_string()))?;
    Ok(GenerationResponse {
        model: last.get("model").and_then(|v| v.as_str()).unwrap_or("unknown").to_string(),
        created_at: last.get("created_at").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        response: full_response,
        done: last.get("done").and_then(|v| v.as_bool()).unwrap_or(true),
        prompt_eval_count: last.get("prompt_eval_count").and_then(|v| v.as_u64()),
        eval_count: last.get("eval_count").and_then(|v| v.as_u64()),
    })
}

/// `TranslationModel` backed by a model served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaModel {
    client: Ollama,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl OllamaModel {
    pub fn new(client: Ollama, model: impl Into<String>, temperature: f32, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
            system_prompt: system_prompt.into(),
        }
    }
}

#[async_trait]
impl TranslationModel for OllamaModel {
    async fn translate_batch(
        &self,
        texts: &[String],
        languages: &LanguagePair,
        glossary: &[GlossaryTerm],
    ) -> Result<Vec<ItemOutcome>, ProviderError> {
        let request = GenerationRequest::new(&self.model, build_batch_prompt(texts))
            .system(render_system_prompt(&self.system_prompt, languages, glossary))
            .temperature(self.temperature);

        let response = self.client.generate(&request).await?;
        debug!(
            "Ollama answered {} items (prompt tokens: {:?}, completion tokens: {:?})",
            texts.len(),
            response.prompt_eval_count,
            response.eval_count
        );

        Ok(parse_batch_response(&response.response, texts.len()))
    }

    fn name(&self) -> String {
        format!("ollama/{}", self.model)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let version = self.client.version().await?;
        debug!("Connected to Ollama {} at {}", version, self.client.base_url());
        Ok(())
    }
}
