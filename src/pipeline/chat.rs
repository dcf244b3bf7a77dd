use super::llm::{GenerateRequest, LlmClient, Turn};
use super::prompt::{build_chat_system_prompt, ChatPromptParams, CHAT_ACKNOWLEDGMENT};
use super::{Deadline, PipelineError, Stage};
use crate::models::{ChatMessage, MessageRole};

/// System instruction as a user turn, the canned acknowledgment, then the
/// full history in order.
pub fn build_chat_request(visit_id: &str, history: &[ChatMessage], context_block: &str) -> GenerateRequest {
    let system = build_chat_system_prompt(&ChatPromptParams {
        visit_id,
        context_block,
    });

    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::user(system));
    turns.push(Turn::model(CHAT_ACKNOWLEDGMENT));
    turns.extend(history.iter().map(|msg| match msg.role {
        MessageRole::User => Turn::user(msg.content.as_str()),
        MessageRole::Assistant => Turn::model(msg.content.as_str()),
    }));

    GenerateRequest::conversation(turns)
}

/// Generate the next assistant utterance in English. No retry.
pub fn generate_reply(
    llm: &dyn LlmClient,
    visit_id: &str,
    history: &[ChatMessage],
    context_block: &str,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    deadline.check(Stage::Generation)?;

    let request = build_chat_request(visit_id, history, context_block);
    llm.generate(&request)
        .map_err(|source| PipelineError::Collaborator {
            stage: Stage::Generation,
            source,
        })
}
