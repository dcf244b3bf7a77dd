use super::llm::{GenerateRequest, LlmClient, LlmError};
use super::prompt::{build_follow_up_prompt, FollowUpPromptParams};
use super::{Deadline, PipelineError, Stage};
use crate::models::VisitSession;

/// Ask one continuation question grounded in the prior analysis of `session`.
/// Returns the trimmed question; a blank answer counts as a failure.
pub fn compose_follow_up(
    llm: &dyn LlmClient,
    session: &VisitSession,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    deadline.check(Stage::FollowUp)?;

    let prompt = build_follow_up_prompt(&FollowUpPromptParams {
        analysis: session.analysis.as_deref(),
        structured_data: session.structured_data.as_ref(),
        messages: &session.messages,
    });

    let collaborator_error = |source| PipelineError::Collaborator {
        stage: Stage::FollowUp,
        source,
    };

    let question = llm
        .generate(&GenerateRequest::prompt(prompt))
        .map_err(collaborator_error)?
        .trim()
        .to_string();

    if question.is_empty() {
        return Err(collaborator_error(LlmError::EmptyResponse));
    }
    Ok(question)
}
