use std::path::PathBuf;

use thiserror::Error;

use crate::db::{self, DatabaseError};
use crate::models::ContextChunk;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Vector store error: {0}")]
    Backend(String),
}

/// A stored snippet ranked against a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub text: String,
    /// Similarity to the query; `None` when the backend does not report one.
    pub score: Option<f32>,
}

/// Visit-scoped similarity search over indexed transcript chunks.
pub trait VectorStore: Send + Sync {
    fn insert(&self, chunk: &ContextChunk) -> Result<(), VectorStoreError>;

    /// Up to `top_k` chunks of `visit_id`, most similar first.
    fn search(
        &self,
        visit_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;
}

/// Vector store backed by the `context_chunks` table.
///
/// Opens its own connection per call so it can be shared across the
/// blocking pool. Similarity is cosine, computed in process.
pub struct SqliteVectorStore {
    db_path: PathBuf,
}

impl SqliteVectorStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn open(&self) -> Result<rusqlite::Connection, VectorStoreError> {
        Ok(db::open_database(&self.db_path)?)
    }
}

impl VectorStore for SqliteVectorStore {
    fn insert(&self, chunk: &ContextChunk) -> Result<(), VectorStoreError> {
        let conn = self.open()?;
        db::insert_chunk(&conn, chunk)?;
        Ok(())
    }

    fn search(
        &self,
        visit_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let conn = self.open()?;
        let chunks = db::chunks_for_visit(&conn, visit_id)?;
        Ok(rank_chunks(chunks, query_embedding, top_k))
    }
}

/// Order chunks by cosine similarity to the query, keeping the first `top_k`.
/// Chunks whose dimension differs from the query are skipped.
pub fn rank_chunks(chunks: Vec<ContextChunk>, query: &[f32], top_k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .filter(|c| c.embedding.len() == query.len())
        .map(|c| ScoredChunk {
            score: Some(cosine_similarity(&c.embedding, query)),
            text: c.text,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .unwrap_or(f32::MIN)
            .total_cmp(&a.score.unwrap_or(f32::MIN))
    });
    scored.truncate(top_k);
    scored
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
