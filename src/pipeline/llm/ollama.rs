use serde::{Deserialize, Serialize};

use super::{
    http_client, status_error, EmbeddingModel, GenerateRequest, LlmClient, LlmError,
    ResponseFormat, Role,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama chat client for local generation.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    model: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
            model: model.to_string(),
            timeout_secs,
        })
    }

    fn chat_body<'a>(&'a self, request: &'a GenerateRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &self.model,
            messages: request
                .turns
                .iter()
                .map(|turn| OllamaMessage {
                    role: match turn.role {
                        Role::User => "user",
                        Role::Model => "assistant",
                    },
                    content: &turn.text,
                })
                .collect(),
            stream: false,
            format: match request.format {
                ResponseFormat::Json => Some("json"),
                ResponseFormat::Text => None,
            },
        }
    }
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&self.chat_body(request))
            .send()
            .map_err(|e| LlmError::from_send(e, &self.base_url, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        if parsed.message.content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.message.content)
    }
}

/// Ollama embeddings client (`/api/embeddings`).
pub struct OllamaEmbedder {
    base_url: String,
    client: reqwest::blocking::Client,
    model: String,
    timeout_secs: u64,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
            model: model.to_string(),
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let url = format!("{}/api/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .map_err(|e| LlmError::from_send(e, &self.base_url, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response));
        }

        let parsed: OllamaEmbeddingResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.embedding)
    }
}
