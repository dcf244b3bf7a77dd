//! Provider-neutral seams for generative text, embeddings and translation.
//!
//! Every collaborator is blocking and `Send + Sync`, so one instance can be
//! shared behind an `Arc` across the blocking thread pool.

pub mod gemini;
pub mod ollama;
pub mod translate_client;

pub use gemini::*;
pub use ollama::*;
pub use translate_client::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider unreachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Provider returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Map a reqwest send failure onto the provider error space.
    pub(crate) fn from_send(e: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if e.is_connect() {
            Self::Connection(endpoint.to_string())
        } else if e.is_timeout() {
            Self::Timeout(timeout_secs)
        } else {
            Self::HttpClient(e.to_string())
        }
    }
}

/// Speaker of a generation turn as the provider sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Provider-enforced strict JSON output.
    Json,
}

/// Ordered turns plus the requested output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub turns: Vec<Turn>,
    pub format: ResponseFormat,
}

impl GenerateRequest {
    /// Single user turn.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::conversation(vec![Turn::user(text)])
    }

    pub fn conversation(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            format: ResponseFormat::Text,
        }
    }

    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::Json;
        self
    }
}

/// Generative text model.
pub trait LlmClient: Send + Sync {
    fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError>;
}

/// Fixed-dimension text embedding model.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

/// Machine translation between locales.
pub trait TranslationClient: Send + Sync {
    fn translate(&self, text: &str, source_locale: &str, target_locale: &str) -> Result<String, LlmError>;
}

/// Translator used when no translation backend is configured.
/// Every call fails, so the translation stage falls back to the input text.
pub struct DisabledTranslator;

impl TranslationClient for DisabledTranslator {
    fn translate(&self, _text: &str, _source: &str, target: &str) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(format!("no translation backend for {target}")))
    }
}

/// Build the blocking HTTP client shared by the provider adapters.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, LlmError> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::HttpClient(format!("Failed to create HTTP client: {e}")))
}

/// Read a non-success response into an error, truncating the body.
pub(crate) fn status_error(response: reqwest::blocking::Response) -> LlmError {
    let status = response.status().as_u16();
    let mut body = response.text().unwrap_or_default();
    if body.len() > 200 {
        let mut cut = 200;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    LlmError::Http { status, body }
}
