use super::llm::TranslationClient;
use super::{Deadline, PipelineError, Stage};

/// Locale every generated text is written in.
pub const SOURCE_LOCALE: &str = "en-US";

/// Absent, blank and English targets need no translation.
pub fn needs_translation(target_locale: Option<&str>) -> bool {
    match target_locale.map(str::trim) {
        None | Some("") => false,
        Some(locale) => !locale.starts_with("en"),
    }
}

/// Render `text` in `target_locale`. Best-effort: on any error the English
/// text is returned unchanged.
pub fn translate_text(
    translator: &dyn TranslationClient,
    text: &str,
    target_locale: Option<&str>,
    deadline: &Deadline,
) -> Result<String, PipelineError> {
    let Some(target) = target_locale.filter(|_| needs_translation(target_locale)) else {
        return Ok(text.to_string());
    };
    let target = target.trim();

    let result = deadline.check(Stage::Translation).and_then(|()| {
        translator
            .translate(text, SOURCE_LOCALE, target)
            .map_err(|source| PipelineError::Collaborator {
                stage: Stage::Translation,
                source,
            })
    });
    Stage::Translation.settle(result, |_| text.to_string())
}
