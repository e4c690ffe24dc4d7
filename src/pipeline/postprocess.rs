//! Deterministic cleanup of recogniser output.
//!
//! Both engines leave artefacts that are not page content: tesseract ends
//! every page with a form feed and pads lines with spaces, vision models
//! wrap their answer in code fences despite being told not to. The rules
//! here are cheap string passes applied to every recognised page before it
//! is accumulated. They never touch the characters of the text itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules, in order:
///
/// 1. Strip an outer code fence wrapping the whole answer
/// 2. Normalise line endings (CRLF / CR → LF) and drop form feeds
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Trim leading and trailing blank lines
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim_matches('\n').to_string()
}

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fence_with_language() {
        assert_eq!(strip_outer_fence("```text\nhello\nworld\n```"), "hello\nworld");
    }

    #[test]
    fn inner_fence_untouched() {
        let input = "intro\n```\ncode\n```";
        assert_eq!(strip_outer_fence(input), input);
    }

    #[test]
    fn tesseract_form_feed_removed() {
        assert_eq!(clean_text("line one  \nline two\n\u{000C}"), "line one\nline two");
    }

    #[test]
    fn blank_runs_collapse() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(remove_invisible_chars("안\u{200B}녕\u{FEFF}"), "안녕");
    }

    #[test]
    fn full_cleanup() {
        let raw = "```\r\n\r\nTitle   \r\n\r\n\r\n\r\nBody\u{00AD}text\r\n```";
        assert_eq!(clean_text(raw), "Title\n\nBodytext");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("\n\u{000C}\n"), "");
    }
}
