use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Marker stored in place of a record when extraction fails.
pub const EXTRACTION_FAILED: &str = "Extraction failed";

/// Fixed clinical schema extracted from one visit conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub main_complaint: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub all_symptoms: Vec<SymptomEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_mentioned: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub medications_mentioned: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub potential_conditions_mentioned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub symptom: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub severity: String,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub value: String,
}

/// Sentinel produced when the extractor could not return a valid record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionFailure {
    pub error: String,
}

/// Structured data attached to a visit: either a record or the error sentinel.
///
/// Serialized untagged, so the sentinel is `{"error": "..."}` and a record is
/// the bare schema object. A record can never carry `error`, and the sentinel
/// can never carry `main_complaint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StructuredData {
    Failed(ExtractionFailure),
    Record(ClinicalRecord),
}

impl StructuredData {
    pub fn extraction_failed() -> Self {
        Self::Failed(ExtractionFailure {
            error: EXTRACTION_FAILED.to_string(),
        })
    }

    pub fn record(&self) -> Option<&ClinicalRecord> {
        match self {
            Self::Record(record) => Some(record),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<ClinicalRecord> for StructuredData {
    fn from(record: ClinicalRecord) -> Self {
        Self::Record(record)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Readings such as `39.5` or a pain scale of `7` arrive as bare numbers.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a scalar symptom field, got {other}"
        ))),
    }
}
