//! Post-processing: deterministic cleanup of model-generated text.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models decorate their answers in ways the question
//! parser does not expect:
//!
//! - Wrapping output in ` ``` ` fences despite the prompt saying not to
//! - Bolding or heading the markers (`**Q.1**`, `### Q.2`), which hides
//!   them from the `Q.<n>` line test
//! - Bulleting options (`- A) Paris`), which hides them from the option test
//! - Windows-style `\r\n` line endings and zero-width characters
//!
//! Each rule is a pure `&str → String` function so it can be tested on its own.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw answer; marker decoration is removed only after trailing
//! whitespace is gone so the end-of-line anchors match.

use once_cell::sync::Lazy;
use regex::Regex;

/// Cleanup applied to raw OCR output.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, stray C0 controls)
/// 5. Collapse runs of blank lines to a single blank line
/// 6. Trim leading and trailing blank space
pub fn clean_ocr_text(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

/// Cleanup applied to formatted question text before parsing.
///
/// Runs every [`clean_ocr_text`] rule, then:
/// 7. Unwrap bold/heading decoration around `Q.<n>` markers
/// 8. Drop list bullets in front of `A)`–`D)` option labels
pub fn clean_formatted_text(input: &str) -> String {
    let s = clean_ocr_text(input);
    let s = unwrap_question_markers(&s);
    let s = strip_option_bullets(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{2060}'], "")
        .replace(is_stray_control, "")
}

/// C0 controls other than tab and newline, plus DEL. OCR output carries these
/// now and then and they are not legal in XML.
fn is_stray_control(c: char) -> bool {
    (c.is_control() && c < '\u{80}' && c != '\t' && c != '\n') || c == '\u{FFFE}' || c == '\u{FFFF}'
}

// ── Rule 5: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 7: Unwrap decorated question markers ────────────────────────────────
//
// `**Q.1 What is …?**` → `Q.1 What is …?`
// `**Q.1** What is …?` → `Q.1 What is …?`
// `### Q.1 What is …?` → `Q.1 What is …?`

static RE_BOLD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:\*\*|__)(Q\.\d+.*?)(?:\*\*|__)[ \t]*$").unwrap());

static RE_MARKER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    // Trailing `__` is not unwrapped: `Q.4_____` is a blank, not emphasis.
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?(Q\.\d+)(?:\*\*)?").unwrap()
});

fn unwrap_question_markers(input: &str) -> String {
    let s = RE_BOLD_LINE.replace_all(input, "$1");
    RE_MARKER_PREFIX.replace_all(&s, "$1").to_string()
}

// ── Rule 8: Strip option bullets ─────────────────────────────────────────────

static RE_OPTION_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*•][ \t]+([A-Da-d]\))").unwrap());

fn strip_option_bullets(input: &str) -> String {
    RE_OPTION_BULLET.replace_all(input, "$1").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────
