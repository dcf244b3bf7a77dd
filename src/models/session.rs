use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::clinical::StructuredData;
use super::enums::MessageRole;

/// One utterance in a visit conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Persisted visit conversation, one per visit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitSession {
    #[serde(rename = "chatId")]
    pub id: Uuid,
    pub visit_id: String,
    pub messages: Vec<ChatMessage>,
    pub analysis: Option<String>,
    pub structured_data: Option<StructuredData>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Content written by a session save; replaces the stored fields wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWrite {
    pub visit_id: String,
    pub messages: Vec<ChatMessage>,
    pub analysis: Option<String>,
    pub structured_data: Option<StructuredData>,
}

impl From<&VisitSession> for SessionWrite {
    fn from(session: &VisitSession) -> Self {
        Self {
            visit_id: session.visit_id.clone(),
            messages: session.messages.clone(),
            analysis: session.analysis.clone(),
            structured_data: session.structured_data.clone(),
        }
    }
}
