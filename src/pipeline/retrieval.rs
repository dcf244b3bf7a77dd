use super::llm::EmbeddingModel;
use super::vectordb::{ScoredChunk, VectorStore};
use super::{Deadline, PipelineError, Stage};

/// Maximum number of snippets placed in the chat context.
pub const CONTEXT_TOP_K: usize = 5;

/// Fetch the snippets of this visit closest to `utterance` and render them as
/// one context block. Best-effort: any failure yields an empty block.
pub fn retrieve_context(
    embedder: &dyn EmbeddingModel,
    vectors: &dyn VectorStore,
    visit_id: &str,
    utterance: &str,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    if utterance.trim().is_empty() {
        return Ok(String::new());
    }
    let result = search_context(embedder, vectors, visit_id, utterance, deadline);
    Stage::Retrieval.settle(result, |_| String::new())
}

fn search_context(
    embedder: &dyn EmbeddingModel,
    vectors: &dyn VectorStore,
    visit_id: &str,
    utterance: &str,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    deadline.check(Stage::Retrieval)?;
    let embedding = embedder
        .embed(utterance)
        .map_err(|source| PipelineError::Collaborator {
            stage: Stage::Retrieval,
            source,
        })?;

    deadline.check(Stage::Retrieval)?;
    let chunks = vectors.search(visit_id, &embedding, CONTEXT_TOP_K)?;
    tracing::debug!(visit_id = %visit_id, matches = chunks.len(), "Context retrieved");
    Ok(format_context_block(&chunks))
}

/// `Context Document N:\n<text> (Similarity: 0.1234)` entries separated by a
/// blank line; `N/A` when the store reported no score.
pub fn format_context_block(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let score = chunk
                .score
                .map(|s| format!("{s:.4}"))
                .unwrap_or_else(|| "N/A".to_string());
            format!("Context Document {}:\n{} (Similarity: {score})", i + 1, chunk.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
