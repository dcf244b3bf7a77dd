use std::str::FromStr;

use serde_json::Value;

use super::json::parse_fenced_json;
use super::llm::{GenerateRequest, LlmClient};
use super::prompt::{build_triage_prompt, TriagePromptParams};
use super::{Deadline, PipelineError, Stage};
use crate::models::{Severity, StructuredData, TriageVerdict};

/// Classifier outcome plus the output it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: TriageVerdict,
    /// Parsed classifier output, kept verbatim for the alert record.
    pub raw_inference: Value,
    /// The verdict is the fixed fallback rather than a classifier answer.
    pub fallback: bool,
}

/// A classifier answer that passed schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerdict {
    pub verdict: TriageVerdict,
    /// The `alert` value the classifier itself returned.
    pub claimed_alert: bool,
    pub raw: Value,
}

/// Decide severity and alerting for an analysis.
///
/// `alert` in the result is always derived from severity. Collaborator
/// errors, invalid JSON and schema violations all produce
/// [`TriageVerdict::fallback`]; the stage is best-effort, so this never
/// returns an error.
pub fn classify(
    llm: &dyn LlmClient,
    visit_id: &str,
    analysis: &str,
    structured_data: Option<&StructuredData>,
    deadline: &Deadline,
) -> Result<Classification, PipelineError> {
    let result = request_verdict(llm, visit_id, analysis, structured_data, deadline);
    Stage::Triage.settle(result, |e| fallback(visit_id, &e.to_string()))
}

fn request_verdict(
    llm: &dyn LlmClient,
    visit_id: &str,
    analysis: &str,
    structured_data: Option<&StructuredData>,
    deadline: &Deadline,
) -> Result<Classification, PipelineError> {
    deadline.check(Stage::Triage)?;

    let prompt = build_triage_prompt(&TriagePromptParams {
        analysis,
        structured_data,
    });
    let raw = llm
        .generate(&GenerateRequest::prompt(prompt).json())
        .map_err(|source| PipelineError::Collaborator {
            stage: Stage::Triage,
            source,
        })?;

    let parsed = match interpret_classifier_output(&raw) {
        Ok(parsed) => parsed,
        Err(reason) => return Ok(fallback(visit_id, &reason)),
    };
    if parsed.claimed_alert != parsed.verdict.alert {
        tracing::warn!(
            visit_id = %visit_id,
            severity = %parsed.verdict.severity,
            claimed_alert = parsed.claimed_alert,
            "Classifier alert flag disagrees with severity, using severity"
        );
    }
    tracing::info!(
        visit_id = %visit_id,
        severity = %parsed.verdict.severity,
        alert = parsed.verdict.alert,
        label = %parsed.verdict.label,
        "Visit classified"
    );
    Ok(Classification {
        verdict: parsed.verdict,
        raw_inference: parsed.raw,
        fallback: false,
    })
}

/// Validate classifier output against the verdict schema.
///
/// `alert` must be a boolean and `severity` one of low/medium/high (case
/// and surrounding whitespace are ignored). Missing or non-string text fields
/// become empty strings.
pub fn interpret_classifier_output(raw: &str) -> Result<ParsedVerdict, String> {
    let value: Value = parse_fenced_json(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "classifier output is not an object".to_string())?;

    let claimed_alert = obj
        .get("alert")
        .and_then(Value::as_bool)
        .ok_or_else(|| "`alert` is not a boolean".to_string())?;

    let severity_raw = obj
        .get("severity")
        .and_then(Value::as_str)
        .ok_or_else(|| "`severity` is missing".to_string())?;
    let severity = Severity::from_str(&severity_raw.trim().to_ascii_lowercase())
        .map_err(|_| format!("unknown severity `{severity_raw}`"))?;

    let text = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let verdict = TriageVerdict::new(
        severity,
        text("label"),
        text("reason"),
        text("recommendedAction"),
    );

    Ok(ParsedVerdict {
        verdict,
        claimed_alert,
        raw: value,
    })
}

fn fallback(visit_id: &str, reason: &str) -> Classification {
    tracing::warn!(
        triage_fallback = true,
        stage = %Stage::Triage,
        visit_id = %visit_id,
        reason = %reason,
        "Classifier output unusable, defaulting to low severity"
    );
    let verdict = TriageVerdict::fallback();
    Classification {
        raw_inference: serde_json::to_value(&verdict).unwrap_or(Value::Null),
        verdict,
        fallback: true,
    }
}
