use serde::de::DeserializeOwned;

/// Strip a surrounding Markdown code fence (with or without a language tag)
/// from model output. Unfenced input is returned trimmed.
pub fn unwrap_fenced_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse model output as JSON after removing any code fence.
pub fn parse_fenced_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(unwrap_fenced_json(raw))
}
