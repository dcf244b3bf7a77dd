use std::sync::LazyLock;

use regex::Regex;

use super::llm::EmbeddingModel;
use super::vectordb::VectorStore;
use super::{Deadline, PipelineError, Stage};
use crate::models::ContextChunk;

/// A run of non-terminators followed by any terminators.
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence pattern is valid"));

/// Split a transcript into trimmed, non-empty sentence-like segments.
/// Text with no segment match is treated as a single segment.
pub fn split_sentences(transcript: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = SENTENCE.find_iter(transcript).map(|m| m.as_str()).collect();
    if segments.is_empty() {
        segments.push(transcript);
    }
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Embed and store each sentence of `transcript` as its own chunk, in order.
///
/// A chunk whose embedding or insert fails is logged and skipped. Returns the
/// number of chunks stored. Deadline expiry aborts the remaining chunks.
pub fn index_transcript(
    embedder: &dyn EmbeddingModel,
    vectors: &dyn VectorStore,
    visit_id: &str,
    transcript: &str,
    deadline: &Deadline,
) -> Result<usize, PipelineError> {
    let segments = split_sentences(transcript);
    tracing::info!(visit_id = %visit_id, segments = segments.len(), "Indexing transcript");

    let mut stored = 0;
    for (index, segment) in segments.iter().enumerate() {
        deadline.check(Stage::Indexing)?;

        let embedding = match embedder.embed(segment) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(
                    visit_id = %visit_id,
                    chunk_index = index,
                    error = %e,
                    "Chunk embedding failed, skipping"
                );
                continue;
            }
        };

        let chunk = ContextChunk::new(visit_id, index, segment, embedding);
        match vectors.insert(&chunk) {
            Ok(()) => stored += 1,
            Err(e) => {
                tracing::warn!(
                    visit_id = %visit_id,
                    chunk_index = index,
                    error = %e,
                    "Chunk insert failed, skipping"
                );
            }
        }
    }

    tracing::info!(visit_id = %visit_id, chunks_stored = stored, "Indexing complete");
    Ok(stored)
}
