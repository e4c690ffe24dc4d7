//! Prompts for the vision recogniser.
//!
//! Kept in one place so prompt changes never touch retry or error handling,
//! and so tests can inspect them without a live model.
//! [`crate::config::VisionConfig::system_prompt`] overrides the default.

/// Default system prompt: transcribe, do not format or interpret.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe all text visible in the page image exactly as written.

Rules:
1. Keep the original language and script. Do NOT translate.
2. Follow the reading order a human would use; keep each visual line on its own line.
3. Separate paragraphs, columns and table rows with line breaks; do not draw tables.
4. Keep numbers, punctuation and symbols exactly as printed.
5. Do NOT describe images, logos or layout. Do NOT add commentary.
6. Output plain text only — no Markdown, no code fences.
7. If the page contains no legible text, output nothing."#;

/// User-turn text accompanying the page image, listing the language hints.
pub fn language_hint(languages: &[String]) -> String {
    let tags: Vec<&str> = languages
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if tags.is_empty() {
        "Transcribe this page.".to_string()
    } else {
        format!(
            "Transcribe this page. Expected languages, most likely first: {}.",
            tags.join(", ")
        )
    }
}
