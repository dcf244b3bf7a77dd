use super::llm::{GenerateRequest, LlmClient};
use super::prompt::{build_analysis_prompt, render_transcript, AnalysisPromptParams};
use super::{Deadline, PipelineError, Stage};
use crate::models::{ChatMessage, StructuredData};

/// Write the narrative summary of a visit. The structured prompt is used when
/// extraction produced a record, the raw-transcript prompt otherwise.
pub fn generate_analysis(
    llm: &dyn LlmClient,
    visit_id: &str,
    messages: &[ChatMessage],
    structured: &StructuredData,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    deadline.check(Stage::Analysis)?;

    let transcript;
    let params = match structured.record() {
        Some(record) => AnalysisPromptParams::Structured { visit_id, record },
        None => {
            transcript = render_transcript(messages);
            AnalysisPromptParams::RawTranscript {
                visit_id,
                transcript: &transcript,
            }
        }
    };

    llm.generate(&GenerateRequest::prompt(build_analysis_prompt(&params)))
        .map_err(|source| PipelineError::Collaborator {
            stage: Stage::Analysis,
            source,
        })
}
