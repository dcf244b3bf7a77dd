//! `POST /chat`: next assistant turn of a visit conversation.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ChatResponse, ConversationRequest};
use crate::pipeline::VisitPipeline;

pub async fn chat(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    let conversation = request.validate(1, "Missing messages")?;

    let content = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            let pipeline = VisitPipeline::new(&conn, core.collaborators(), core.deadline());
            Ok(pipeline.chat(
                &conversation.visit_id,
                &conversation.messages,
                Some(&conversation.target_language),
            )?)
        })
        .await?;

    Ok(Json(ChatResponse { content }))
}
