use super::json::parse_fenced_json;
use super::llm::{GenerateRequest, LlmClient};
use super::prompt::{build_extraction_prompt, render_transcript};
use super::{Deadline, PipelineError, Stage};
use crate::models::{ChatMessage, ClinicalRecord};

/// Extract the fixed clinical schema from a visit conversation.
///
/// Fails on collaborator errors and on output that is not a record with a
/// `main_complaint`; the analyze flow turns that into the error sentinel.
pub fn extract_structured_data(
    llm: &dyn LlmClient,
    visit_id: &str,
    messages: &[ChatMessage],
    deadline: &Deadline,
) -> Result<ClinicalRecord, PipelineError> {
    deadline.check(Stage::Extraction)?;

    let prompt = build_extraction_prompt(&render_transcript(messages));
    let raw = llm
        .generate(&GenerateRequest::prompt(prompt))
        .map_err(|source| PipelineError::Collaborator {
            stage: Stage::Extraction,
            source,
        })?;

    let record: ClinicalRecord = parse_fenced_json(&raw).map_err(|e| {
        tracing::warn!(visit_id = %visit_id, error = %e, "Extractor output is not a clinical record");
        PipelineError::Extraction(e.to_string())
    })?;

    tracing::debug!(
        visit_id = %visit_id,
        symptoms = record.all_symptoms.len(),
        "Structured data extracted"
    );
    Ok(record)
}
