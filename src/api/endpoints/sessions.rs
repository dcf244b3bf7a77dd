//! Session store endpoints.
//!
//! - `POST /save-chat`: upsert the session of a visit
//! - `GET /chat/visit/:visitId`: session content plus latest alert
//! - `GET /chat/:chatId`: full session document by primary key

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{
    parse_chat_id, validate_visit_id, ApiContext, SaveChatRequest, SaveChatResponse, VisitChatView,
};
use crate::db;
use crate::models::{SessionWrite, VisitSession};

/// `POST /save-chat`. With `expectedVersion` the write only succeeds when
/// the stored version matches; without it the last write wins.
pub async fn save_chat(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SaveChatRequest>, JsonRejection>,
) -> Result<Json<SaveChatResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(visit_id), Some(messages)) = (request.visit_id, request.messages) else {
        return Err(ApiError::BadRequest("Missing visitId or messages".into()));
    };
    if messages.is_empty() {
        return Err(ApiError::BadRequest("Missing visitId or messages".into()));
    }
    validate_visit_id(&visit_id)?;

    let write = SessionWrite {
        visit_id,
        messages,
        analysis: request.analysis,
        structured_data: request.structured_data,
    };
    let expected_version = request.expected_version;

    let saved = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            Ok(db::upsert_session(&conn, &write, expected_version)?)
        })
        .await?;

    tracing::info!(visit_id = %saved.visit_id, version = saved.version, "Chat saved");

    Ok(Json(SaveChatResponse {
        message: "Chat saved successfully".into(),
        chat_id: saved.id,
        version: saved.version,
    }))
}

/// `GET /chat/visit/:visitId`. An unknown visit yields the empty view.
pub async fn by_visit(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
) -> Result<Json<VisitChatView>, ApiError> {
    validate_visit_id(&visit_id)?;

    let view = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            let Some(session) = db::get_session_by_visit(&conn, &visit_id)? else {
                return Ok(VisitChatView::default());
            };
            let alert = db::latest_alert_for_visit(&conn, &visit_id)?;
            Ok(VisitChatView {
                messages: session.messages,
                analysis: session.analysis,
                structured_data: session.structured_data,
                alert,
            })
        })
        .await?;

    Ok(Json(view))
}

/// `GET /chat/:chatId`
pub async fn by_id(
    State(ctx): State<ApiContext>,
    Path(chat_id): Path<String>,
) -> Result<Json<VisitSession>, ApiError> {
    let id = parse_chat_id(&chat_id)?;

    let session = ctx
        .run_blocking(move |core| {
            let conn = core.open_db()?;
            Ok(db::get_session(&conn, &id)?)
        })
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat not found".into()))?;

    Ok(Json(session))
}
