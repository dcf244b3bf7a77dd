//! Shared types for the HTTP layer: context, request bodies and identifier checks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::core_state::CoreState;
use crate::models::{Alert, ChatMessage, StructuredData};

/// Longest accepted visit id.
pub const MAX_VISIT_ID_LEN: usize = 128;

/// Shared context for all routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run blocking work (database, collaborator HTTP) on the blocking pool.
    pub async fn run_blocking<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&CoreState) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || work(&core))
            .await
            .map_err(|e| ApiError::Internal(format!("Blocking task failed: {e}")))?
    }
}

// ── Identifiers ─────────────────────────────────────────────

/// Reject empty, overlong, or non `[A-Za-z0-9_-]` visit ids.
pub fn validate_visit_id(visit_id: &str) -> Result<(), ApiError> {
    let well_formed = !visit_id.is_empty()
        && visit_id.len() <= MAX_VISIT_ID_LEN
        && visit_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Invalid Visit ID format".into()))
    }
}

pub fn parse_chat_id(chat_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(chat_id).map_err(|_| ApiError::BadRequest("Invalid Chat ID format".into()))
}

fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

fn required_visit_id(value: Option<String>) -> Result<String, ApiError> {
    let visit_id = required(value, "Missing visitId")?;
    validate_visit_id(&visit_id)?;
    Ok(visit_id)
}

// ── Requests ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRequest {
    pub visit_id: Option<String>,
    pub transcript: Option<String>,
}

impl IndexRequest {
    /// `(visit_id, transcript)`.
    pub fn validate(self) -> Result<(String, String), ApiError> {
        let visit_id = required_visit_id(self.visit_id)?;
        let transcript = self
            .transcript
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("visitId and transcript are required".into()))?;
        Ok((visit_id, transcript))
    }
}

/// Body of `/chat` and `/analyze`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub visit_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub target_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub visit_id: String,
    pub messages: Vec<ChatMessage>,
    pub target_language: String,
}

impl ConversationRequest {
    pub fn validate(self, min_messages: usize, too_short: &str) -> Result<Conversation, ApiError> {
        let visit_id = required_visit_id(self.visit_id)?;
        if self.messages.len() < min_messages.max(1) {
            return Err(ApiError::BadRequest(too_short.to_string()));
        }
        let target_language = required(self.target_language, "Missing targetLanguage")?;
        Ok(Conversation {
            visit_id,
            messages: self.messages,
            target_language,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatRequest {
    pub visit_id: Option<String>,
    pub messages: Option<Vec<ChatMessage>>,
    pub analysis: Option<String>,
    pub structured_data: Option<StructuredData>,
    pub expected_version: Option<i64>,
}

// ── Responses ───────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResponse {
    pub message: String,
    pub chunks_stored: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveChatResponse {
    pub message: String,
    pub chat_id: Uuid,
    pub version: i64,
}

/// Session view by visit id; every field is empty when nothing was saved.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitChatView {
    pub messages: Vec<ChatMessage>,
    pub analysis: Option<String>,
    pub structured_data: Option<StructuredData>,
    pub alert: Option<Alert>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
