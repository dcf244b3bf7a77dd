use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Severity;
use super::session::ChatMessage;

/// Outcome of triage classification for one analysis.
///
/// `alert` always agrees with `severity`; construct through
/// [`TriageVerdict::new`] or [`TriageVerdict::fallback`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageVerdict {
    pub alert: bool,
    pub severity: Severity,
    pub label: String,
    pub reason: String,
    pub recommended_action: String,
}

impl TriageVerdict {
    pub fn new(
        severity: Severity,
        label: impl Into<String>,
        reason: impl Into<String>,
        recommended_action: impl Into<String>,
    ) -> Self {
        Self {
            alert: severity.requires_alert(),
            severity,
            label: label.into(),
            reason: reason.into(),
            recommended_action: recommended_action.into(),
        }
    }

    /// Verdict used whenever the classifier output cannot be trusted.
    pub fn fallback() -> Self {
        Self::new(
            Severity::Low,
            "Error",
            "Could not classify analysis.",
            "Manual review required.",
        )
    }
}

/// Persisted clinical alert. Insert-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub visit_id: String,
    pub label: String,
    pub severity: Severity,
    pub reason: String,
    pub recommended_action: String,
    pub triggering_messages: Vec<ChatMessage>,
    pub created_at: NaiveDateTime,
    pub raw_inference: serde_json::Value,
}

impl Alert {
    pub fn from_verdict(
        visit_id: &str,
        verdict: &TriageVerdict,
        triggering_messages: &[ChatMessage],
        raw_inference: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            visit_id: visit_id.to_string(),
            label: verdict.label.clone(),
            severity: verdict.severity,
            reason: verdict.reason.clone(),
            recommended_action: verdict.recommended_action.clone(),
            triggering_messages: triggering_messages.to_vec(),
            created_at: chrono::Utc::now().naive_utc(),
            raw_inference,
        }
    }
}

/// Alerts of one visit, grouped for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitAlertGroup {
    pub visit_id: String,
    pub total_alerts: usize,
    pub highest_severity: Severity,
    pub latest_alert_date: NaiveDateTime,
    pub alerts: Vec<Alert>,
}
