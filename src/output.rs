//! Result types returned by the top-level entry points.

use crate::config::ModelRole;
use crate::error::ModelInvocationError;
use crate::paper::QuestionPaper;
use crate::pipeline::input::DocumentKind;
use serde::Serialize;

/// Everything a full run produced, from OCR text to parsed questions.
#[derive(Debug, Clone, Serialize)]
pub struct PaperOutput {
    /// Cleaned OCR text, pages joined by a blank line.
    pub raw_text: String,
    /// Parsed questions plus the cleaned formatted text they came from.
    pub paper: QuestionPaper,
    pub stats: PaperStats,
}

/// Which models answered and what it cost in time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaperStats {
    pub total_pages: usize,
    pub question_count: usize,
    /// Model that answered the last OCR page.
    pub ocr_model: Option<String>,
    pub formatting_model: Option<String>,
    /// Every failed model call, in the order it happened.
    pub failed_attempts: Vec<FailedAttempt>,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub formatting_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// One model call that failed and was recovered from.
#[derive(Debug, Clone, Serialize)]
pub struct FailedAttempt {
    pub role: ModelRole,
    pub error: ModelInvocationError,
}

/// What [`crate::inspect`] reports about an upload without calling a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub kind: DocumentKind,
    pub page_count: usize,
    pub byte_len: u64,
}
