//! Test doubles for the pipeline collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::llm::{EmbeddingModel, GenerateRequest, LlmClient, LlmError, TranslationClient};
use super::vectordb::{rank_chunks, ScoredChunk, VectorStore, VectorStoreError};
use super::Collaborators;
use crate::models::ContextChunk;

const MOCK_DIMENSION: usize = 16;

/// LLM double answering from a queue of scripted results, in call order.
/// An exhausted queue answers with `LlmError::EmptyResponse`.
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockLlmClient {
    pub fn new(responses: &[&str]) -> Self {
        Self::with_results(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}

/// Embedding double producing deterministic unit vectors.
pub struct MockEmbedder {
    fail: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl EmbeddingModel for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if self.fail {
            return Err(LlmError::Connection("mock embedder".into()));
        }
        Ok(deterministic_vector(text, MOCK_DIMENSION))
    }
}

/// Embedding double that fails only for texts containing `needle`.
pub struct SelectiveFailEmbedder {
    pub needle: &'static str,
}

impl EmbeddingModel for SelectiveFailEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.contains(self.needle) {
            return Err(LlmError::Http {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(deterministic_vector(text, MOCK_DIMENSION))
    }
}

fn deterministic_vector(text: &str, dim: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    let mut vec: Vec<f32> = (0..dim)
        .map(|i| {
            let byte = bytes.get(i % bytes.len().max(1)).copied().unwrap_or(0);
            (byte as f32 + i as f32) / 255.0
        })
        .collect();

    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut vec {
            *val /= norm;
        }
    }
    vec
}

/// Translation double that tags text with the target locale.
pub struct MockTranslator {
    fail: bool,
    calls: Mutex<Vec<(String, String, String)>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(text, source, target)` per call.
    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TranslationClient for MockTranslator {
    fn translate(&self, text: &str, source: &str, target: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source.to_string(), target.to_string()));
        if self.fail {
            return Err(LlmError::Http {
                status: 403,
                body: "denied".into(),
            });
        }
        Ok(format!("[{target}] {text}"))
    }
}

/// In-memory vector store; can be switched to fail every call.
pub struct MockVectorStore {
    entries: Mutex<Vec<ContextChunk>>,
    fail: bool,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn texts_for_visit(&self, visit_id: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.visit_id == visit_id)
            .map(|c| c.text.clone())
            .collect()
    }
}

impl VectorStore for MockVectorStore {
    fn insert(&self, chunk: &ContextChunk) -> Result<(), VectorStoreError> {
        if self.fail {
            return Err(VectorStoreError::Backend("mock store down".into()));
        }
        self.entries.lock().unwrap().push(chunk.clone());
        Ok(())
    }

    fn search(
        &self,
        visit_id: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if self.fail {
            return Err(VectorStoreError::Backend("mock store down".into()));
        }
        let scoped: Vec<ContextChunk> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.visit_id == visit_id)
            .cloned()
            .collect();
        Ok(rank_chunks(scoped, query_embedding, top_k))
    }
}

/// Collaborators wired to healthy mocks around the given LLM.
pub fn mock_collaborators(llm: Arc<MockLlmClient>) -> Collaborators {
    Collaborators {
        llm,
        embedder: Arc::new(MockEmbedder::new()),
        vectors: Arc::new(MockVectorStore::new()),
        translator: Arc::new(MockTranslator::new()),
    }
}
