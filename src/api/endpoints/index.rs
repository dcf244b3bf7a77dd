//! `POST /index`: store a visit transcript as retrievable context.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IndexRequest, IndexResponse};
use crate::pipeline::VisitPipeline;

pub async fn index(
    State(ctx): State<ApiContext>,
    payload: Result<Json<IndexRequest>, JsonRejection>,
) -> Result<Json<IndexResponse>, ApiError> {
    let Json(request) = payload?;
    let (visit_id, transcript) = request.validate()?;

    let chunks_stored = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            let pipeline = VisitPipeline::new(&conn, core.collaborators(), core.deadline());
            Ok(pipeline.index_transcript(&visit_id, &transcript)?)
        })
        .await?;

    Ok(Json(IndexResponse {
        message: "Indexing successful".into(),
        chunks_stored,
    }))
}
