//! `POST /analyze`: end-of-visit extraction, analysis and triage.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ConversationRequest};
use crate::pipeline::{VisitAnalysis, VisitPipeline, MIN_ANALYSIS_MESSAGES};

pub async fn analyze(
    State(ctx): State<ApiContext>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Json<VisitAnalysis>, ApiError> {
    let Json(request) = payload?;
    let conversation = request.validate(MIN_ANALYSIS_MESSAGES, "Insufficient chat history")?;

    let result = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            let pipeline = VisitPipeline::new(&conn, core.collaborators(), core.deadline());
            Ok(pipeline.analyze(
                &conversation.visit_id,
                &conversation.messages,
                Some(&conversation.target_language),
            )?)
        })
        .await?;

    Ok(Json(result))
}
