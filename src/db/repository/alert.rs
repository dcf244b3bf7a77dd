use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::sqlite::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::*;

const ALERT_COLUMNS: &str = "id, visit_id, label, severity, reason, recommended_action,
     triggering_messages, raw_inference, created_at";

// Same-millisecond inserts keep insertion order through rowid.
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

/// Insert an alert. Alerts are never updated or deleted afterwards.
pub fn insert_alert(conn: &Connection, alert: &Alert) -> Result<(), DatabaseError> {
    if !alert.severity.requires_alert() {
        return Err(DatabaseError::ConstraintViolation(format!(
            "Alert for visit {} has severity {}",
            alert.visit_id, alert.severity
        )));
    }

    conn.execute(
        "INSERT INTO alerts
         (id, visit_id, label, severity, reason, recommended_action,
          triggering_messages, raw_inference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            alert.id.to_string(),
            alert.visit_id,
            alert.label,
            alert.severity.as_str(),
            alert.reason,
            alert.recommended_action,
            serde_json::to_string(&alert.triggering_messages)?,
            serde_json::to_string(&alert.raw_inference)?,
            format_timestamp(&alert.created_at),
        ],
    )?;
    Ok(())
}

/// All alerts, most recent first.
pub fn list_alerts(conn: &Connection) -> Result<Vec<Alert>, DatabaseError> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts {NEWEST_FIRST}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], read_row)?;

    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(alert_from_row(row?)?);
    }
    Ok(alerts)
}

pub fn latest_alert_for_visit(
    conn: &Connection,
    visit_id: &str,
) -> Result<Option<Alert>, DatabaseError> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE visit_id = ?1 {NEWEST_FIRST} LIMIT 1");
    let row = conn.query_row(&sql, params![visit_id], read_row).optional()?;
    row.map(alert_from_row).transpose()
}

/// Alerts grouped per visit. Groups are ordered by their latest alert,
/// newest first, and alerts inside a group are newest first too.
pub fn alert_dashboard(conn: &Connection) -> Result<Vec<VisitAlertGroup>, DatabaseError> {
    let mut groups: Vec<VisitAlertGroup> = Vec::new();

    // list_alerts is already newest first, so first sighting fixes group order.
    for alert in list_alerts(conn)? {
        match groups.iter_mut().find(|g| g.visit_id == alert.visit_id) {
            Some(group) => {
                group.total_alerts += 1;
                group.highest_severity = group.highest_severity.max(alert.severity);
                group.alerts.push(alert);
            }
            None => groups.push(VisitAlertGroup {
                visit_id: alert.visit_id.clone(),
                total_alerts: 1,
                highest_severity: alert.severity,
                latest_alert_date: alert.created_at,
                alerts: vec![alert],
            }),
        }
    }

    Ok(groups)
}

struct AlertRow {
    id: String,
    visit_id: String,
    label: String,
    severity: String,
    reason: String,
    recommended_action: String,
    triggering_messages: String,
    raw_inference: String,
    created_at: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        label: row.get(2)?,
        severity: row.get(3)?,
        reason: row.get(4)?,
        recommended_action: row.get(5)?,
        triggering_messages: row.get(6)?,
        raw_inference: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn alert_from_row(row: AlertRow) -> Result<Alert, DatabaseError> {
    Ok(Alert {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        visit_id: row.visit_id,
        label: row.label,
        severity: Severity::from_str(&row.severity)?,
        reason: row.reason,
        recommended_action: row.recommended_action,
        triggering_messages: serde_json::from_str(&row.triggering_messages)?,
        raw_inference: serde_json::from_str(&row.raw_inference)?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}
