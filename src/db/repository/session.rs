use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

const SESSION_COLUMNS: &str =
    "id, visit_id, messages, analysis, structured_data, version, created_at, updated_at";

/// Save a visit session, creating it on first write and replacing messages,
/// analysis and structured data wholesale afterwards.
///
/// With `expected_version`, the write only lands when the stored row is at
/// that version; a missing row or a different version yields
/// [`DatabaseError::VersionConflict`] and nothing is written. Without it the
/// last writer wins. Every write bumps `version` by one.
pub fn upsert_session(
    conn: &Connection,
    write: &SessionWrite,
    expected_version: Option<i64>,
) -> Result<VisitSession, DatabaseError> {
    let messages_json = serde_json::to_string(&write.messages)?;
    let structured_json = write
        .structured_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let now = format_timestamp(&Utc::now().naive_utc());

    let tx = conn.unchecked_transaction()?;

    match expected_version {
        None => {
            tx.execute(
                "INSERT INTO chat_sessions
                 (id, visit_id, messages, analysis, structured_data, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                 ON CONFLICT(visit_id) DO UPDATE SET
                    messages = excluded.messages,
                    analysis = excluded.analysis,
                    structured_data = excluded.structured_data,
                    version = chat_sessions.version + 1,
                    updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    write.visit_id,
                    messages_json,
                    write.analysis,
                    structured_json,
                    now,
                ],
            )?;
        }
        Some(expected) => {
            let changed = tx.execute(
                "UPDATE chat_sessions SET
                    messages = ?1, analysis = ?2, structured_data = ?3,
                    version = version + 1, updated_at = ?4
                 WHERE visit_id = ?5 AND version = ?6",
                params![
                    messages_json,
                    write.analysis,
                    structured_json,
                    now,
                    write.visit_id,
                    expected,
                ],
            )?;
            if changed == 0 {
                let actual: Option<i64> = tx
                    .query_row(
                        "SELECT version FROM chat_sessions WHERE visit_id = ?1",
                        params![write.visit_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(DatabaseError::VersionConflict {
                    visit_id: write.visit_id.clone(),
                    expected,
                    actual,
                });
            }
        }
    }

    let saved = select_by_visit(&tx, &write.visit_id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "ChatSession".into(),
        id: write.visit_id.clone(),
    })?;
    tx.commit()?;

    tracing::debug!(visit_id = %saved.visit_id, version = saved.version, "Session saved");
    Ok(saved)
}

/// Latest session for a visit, `None` when the visit has never been saved.
pub fn get_session_by_visit(
    conn: &Connection,
    visit_id: &str,
) -> Result<Option<VisitSession>, DatabaseError> {
    select_by_visit(conn, visit_id)
}

pub fn get_session(conn: &Connection, id: &Uuid) -> Result<Option<VisitSession>, DatabaseError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], read_row)
        .optional()?;
    row.map(session_from_row).transpose()
}

fn select_by_visit(conn: &Connection, visit_id: &str) -> Result<Option<VisitSession>, DatabaseError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE visit_id = ?1");
    let row = conn
        .query_row(&sql, params![visit_id], read_row)
        .optional()?;
    row.map(session_from_row).transpose()
}

struct SessionRow {
    id: String,
    visit_id: String,
    messages: String,
    analysis: Option<String>,
    structured_data: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        messages: row.get(2)?,
        analysis: row.get(3)?,
        structured_data: row.get(4)?,
        version: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn session_from_row(row: SessionRow) -> Result<VisitSession, DatabaseError> {
    Ok(VisitSession {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        visit_id: row.visit_id,
        messages: serde_json::from_str(&row.messages)?,
        analysis: row.analysis,
        structured_data: row
            .structured_data
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        version: row.version,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
    })
}
