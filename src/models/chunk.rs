use chrono::NaiveDateTime;
use uuid::Uuid;

/// Write-once transcript snippet with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChunk {
    pub id: Uuid,
    pub visit_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    pub created_at: NaiveDateTime,
}

impl ContextChunk {
    pub fn new(visit_id: &str, chunk_index: usize, text: &str, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            visit_id: visit_id.to_string(),
            chunk_index,
            text: text.to_string(),
            embedding,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
