//! `POST /follow-up/:visitId`: resume a saved visit with one new question.
//!
//! Answers failures with `{success: false, message}` rather than the
//! common error body.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{validate_visit_id, ApiContext, FollowUpResponse};
use crate::pipeline::VisitPipeline;

pub async fn follow_up(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
) -> (StatusCode, Json<FollowUpResponse>) {
    match compose(&ctx, visit_id).await {
        Ok(question) => (
            StatusCode::OK,
            Json(FollowUpResponse {
                success: true,
                follow_up_question: Some(question),
                message: None,
            }),
        ),
        Err(err) => (
            err.status(),
            Json(FollowUpResponse {
                success: false,
                follow_up_question: None,
                message: Some(err.public_message()),
            }),
        ),
    }
}

async fn compose(ctx: &ApiContext, visit_id: String) -> Result<String, ApiError> {
    validate_visit_id(&visit_id)?;
    ctx.run_blocking(move |core| {
        let conn = core.open_db()?;
        let pipeline = VisitPipeline::new(&conn, core.collaborators(), core.deadline());
        Ok(pipeline.follow_up(&visit_id)?.question)
    })
    .await
}
