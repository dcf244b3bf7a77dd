//! Google Gemini `generateContent` client.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::Deserialize;

use super::{http_client, status_error, GenerateRequest, LlmClient, LlmError, ResponseFormat, Role};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::NotConfigured("Gemini API key is required".into()));
        }

        Ok(Self {
            client: http_client(timeout_secs)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs,
        })
    }

    pub fn build_request_body(request: &GenerateRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                serde_json::json!({
                    "role": role,
                    "parts": [{"text": turn.text}]
                })
            })
            .collect();

        let mut body = serde_json::json!({ "contents": contents });
        if request.format == ResponseFormat::Json {
            body["generationConfig"] = serde_json::json!({
                "responseMimeType": "application/json"
            });
        }
        body
    }

    /// Concatenate the text parts of the first candidate.
    pub fn extract_text(response: &GeminiResponse) -> Option<String> {
        let parts = &response.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model);
        let body = Self::build_request_body(request);

        tracing::debug!(
            model = %self.model,
            turns = request.turns.len(),
            json = request.format == ResponseFormat::Json,
            "Gemini generate"
        );

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(
                "x-goog-api-key",
                HeaderValue::from_str(&self.api_key)
                    .map_err(|e| LlmError::NotConfigured(format!("Invalid API key header: {e}")))?,
            )
            .json(&body)
            .send()
            .map_err(|e| LlmError::from_send(e, GEMINI_ENDPOINT, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response));
        }

        let parsed: GeminiResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Self::extract_text(&parsed).ok_or(LlmError::EmptyResponse)
    }
}
