//! Google Cloud Translation v3 `translateText` client.

use serde::Deserialize;

use super::{http_client, status_error, LlmError, TranslationClient};

const TRANSLATE_ENDPOINT: &str = "https://translation.googleapis.com/v3";

pub struct GoogleTranslateClient {
    client: reqwest::blocking::Client,
    project_id: String,
    access_token: String,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleTranslateClient {
    pub fn new(project_id: &str, access_token: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        if project_id.trim().is_empty() || access_token.trim().is_empty() {
            return Err(LlmError::NotConfigured(
                "Google project id and access token are required".into(),
            ));
        }
        Ok(Self {
            client: http_client(timeout_secs)?,
            project_id: project_id.to_string(),
            access_token: access_token.to_string(),
            timeout_secs,
        })
    }

    fn url(&self) -> String {
        format!(
            "{TRANSLATE_ENDPOINT}/projects/{}/locations/global:translateText",
            self.project_id
        )
    }

    pub fn build_request_body(text: &str, source: &str, target: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [text],
            "mimeType": "text/plain",
            "sourceLanguageCode": source,
            "targetLanguageCode": target,
        })
    }
}

impl TranslationClient for GoogleTranslateClient {
    fn translate(&self, text: &str, source_locale: &str, target_locale: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.access_token)
            .json(&Self::build_request_body(text, source_locale, target_locale))
            .send()
            .map_err(|e| LlmError::from_send(e, TRANSLATE_ENDPOINT, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(status_error(response));
        }

        let parsed: TranslateResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(LlmError::EmptyResponse)
    }
}
