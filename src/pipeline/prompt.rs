//! Prompt builders. Pure functions from typed parameters to prompt text.

use crate::models::{ChatMessage, ClinicalRecord, MessageRole, StructuredData};

/// Canned model turn placed after the chat system instruction.
pub const CHAT_ACKNOWLEDGMENT: &str =
    "Understood. I will suggest one simple, patient-friendly question at a time.";

const NO_CONTEXT: &str = "No specific context retrieved for this query.";

pub struct ChatPromptParams<'a> {
    pub visit_id: &'a str,
    /// Retrieved context block; empty when nothing matched.
    pub context_block: &'a str,
}

pub fn build_chat_system_prompt(params: &ChatPromptParams<'_>) -> String {
    let context = if params.context_block.trim().is_empty() {
        NO_CONTEXT
    } else {
        params.context_block
    };

    format!(
        r#"You are a healthcare assistant supporting a community health worker during a patient visit (Visit ID: {visit_id}).
Help the health worker ask the next relevant, simple question given the conversation so far.

The conversation may open with you asking how the patient is feeling today. When the health worker answers that, follow up with a specific medical question about what they reported.

Use the context below only when it relates to the latest message. It contains snippets from this visit's own transcript.
Prefer the context when it is relevant; otherwise rely on general medical knowledge.
Phrase every question in plain, non-technical language a patient can follow.
Never mention that context was used.

Respond with a single question only.
----------
START CONTEXT
{context}
END CONTEXT
----------"#,
        visit_id = params.visit_id,
    )
}

/// Render a conversation as speaker-labelled lines.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|msg| {
            let speaker = match msg.role {
                MessageRole::User => "Health Worker",
                MessageRole::Assistant => "AI Assistant",
            };
            format!("{speaker}: {}", msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_extraction_prompt(transcript: &str) -> String {
    format!(
        r#"You extract clinical data from visit conversations. Read the conversation and fill in the JSON object below.
Reply with the JSON object only. Do not wrap it in Markdown code fences.

CONVERSATION:
"""
{transcript}
"""

JSON TO FILL:
{{
  "main_complaint": "the primary symptom or complaint",
  "all_symptoms": [
    {{ "symptom": "symptom name", "severity": "e.g. 'severe', 'sharp', 'dull'", "value": "e.g. 'yes', 'no', 'feverish'" }}
  ],
  "duration_mentioned": "e.g. '2 days', 'a week'",
  "medications_mentioned": ["medications named in the conversation"],
  "potential_conditions_mentioned": ["possible conditions discussed"]
}}
"#
    )
}

/// Input of the analysis prompt; the variant follows extraction success.
pub enum AnalysisPromptParams<'a> {
    Structured {
        visit_id: &'a str,
        record: &'a ClinicalRecord,
    },
    RawTranscript {
        visit_id: &'a str,
        transcript: &'a str,
    },
}

pub fn build_analysis_prompt(params: &AnalysisPromptParams<'_>) -> String {
    match params {
        AnalysisPromptParams::Structured { visit_id, record } => {
            let pretty = serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".into());
            format!(
                r#"You are a healthcare assistant. Analyze this structured summary of a patient visit (Visit ID: {visit_id}).
Write a concise, professional analysis in Markdown covering:
1. **Main Symptoms/Concerns:** drawn from the extracted data.
2. **Key Information Gathered:** the important details in the JSON.
3. **Potential Next Steps:** one or two actions for the health worker.

STRUCTURED DATA:
```json
{pretty}
```

Analysis:"#
            )
        }
        AnalysisPromptParams::RawTranscript {
            visit_id,
            transcript,
        } => format!(
            r#"You are a healthcare assistant. Analyze this raw patient visit conversation (Visit ID: {visit_id}).
Write a concise summary covering:
1. **Main Symptoms/Concerns:** the key health issues discussed.
2. **Key Information Gathered:** any important details.
3. **Potential Next Steps:** one or two simple actions.

Conversation:
--------------------
{transcript}
--------------------
Analysis:"#
        ),
    }
}

pub struct TriagePromptParams<'a> {
    pub analysis: &'a str,
    pub structured_data: Option<&'a StructuredData>,
}

pub fn build_triage_prompt(params: &TriagePromptParams<'_>) -> String {
    let findings = compact_json_or_none(params.structured_data);
    format!(
        r#"You are a senior medical officer deciding whether a visit needs a medical referral.

INPUT:
1. Clinical summary:
"""{analysis}"""

2. Structured findings:
{findings}

TRIAGE RUBRIC:
- HIGH severity (alert: true): an immediate threat to life, limb or vital organs needing emergency transport or admission.
  Signals include emergency, urgent referral, chest indrawing, unconsciousness, difficulty breathing.
- MEDIUM severity (alert: true): needs a doctor's diagnosis, prescription or intervention within 24 hours and cannot be handled by the health worker alone.
  Signals include high fever, infection, dehydration, an explicit referral to a doctor.
- LOW severity (alert: false): routine care, preventive counselling, normal check-ups, or minor self-limiting complaints managed at home.

OUTPUT:
- Judge severity only from the details in the summary.
- Set "alert" to true for HIGH or MEDIUM and false for LOW.
- Return exactly this JSON object:
{{
  "alert": boolean,
  "severity": "high" | "medium" | "low",
  "label": "short clinical label",
  "reason": "why, based on the summary",
  "recommendedAction": "what the health worker should do"
}}
"#,
        analysis = params.analysis,
    )
}

/// Number of trailing messages quoted in the follow-up prompt.
pub const FOLLOW_UP_RECENT_MESSAGES: usize = 3;

pub struct FollowUpPromptParams<'a> {
    pub analysis: Option<&'a str>,
    pub structured_data: Option<&'a StructuredData>,
    pub messages: &'a [ChatMessage],
}

pub fn build_follow_up_prompt(params: &FollowUpPromptParams<'_>) -> String {
    let analysis = params
        .analysis
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("No previous analysis.");
    let findings = compact_json_or_none(params.structured_data);
    let start = params.messages.len().saturating_sub(FOLLOW_UP_RECENT_MESSAGES);
    let recent = &params.messages[start..];
    let recent = if recent.is_empty() {
        "None".to_string()
    } else {
        serde_json::to_string(recent).unwrap_or_else(|_| "None".into())
    };

    format!(
        r#"You are a caring medical assistant checking in on a patient after an earlier visit.

CONTEXT:
- Last visit analysis: {analysis}
- Structured data: {findings}
- Recent messages: {recent}

TASK:
Read the last visit analysis the way a doctor reviews a chart before walking in, then ask one natural follow-up question about the patient's specific condition.

GUIDELINES:
1. Find the main symptom or diagnosis in the analysis, such as a headache, fever, injury or stomach pain.
2. Ask whether that specific issue has improved, for example "Has the fever come down since we last spoke?".
3. Keep the tone warm and professional.
4. Skip greetings such as "Hello" or "Welcome back" and open with the question itself.

OUTPUT:
The question text only."#
    )
}

fn compact_json_or_none(data: Option<&StructuredData>) -> String {
    data.and_then(|d| serde_json::to_string(d).ok())
        .unwrap_or_else(|| "None".to_string())
}
