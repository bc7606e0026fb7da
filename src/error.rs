//! Error types for the examquiz library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ExamQuizError`] — **Fatal**: the run cannot proceed at all (unreadable
//!   upload, no model answered, export could not be written). Returned as
//!   `Err(ExamQuizError)` from the top-level entry points.
//!
//! * [`ModelInvocationError`] — **Recoverable**: one model failed one call.
//!   The fallback orchestrator logs it and moves on to the next model; only
//!   when every model in a role's list has failed does it surface, collected
//!   inside [`ExamQuizError::AllModelsFailed`].
//!
//! * [`RenderError`] — **Recoverable**: one drawing strategy could not render
//!   a run of text (font missing the glyphs, native encoding impossible). The
//!   export strategy chain tries the next strategy.

use crate::config::ModelRole;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the examquiz library.
#[derive(Debug, Error)]
pub enum ExamQuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The upload is neither a PDF nor a supported raster image.
    #[error("Unsupported upload '{path}': expected a PDF or an image (PNG, JPEG, WebP, GIF, BMP)\nFirst bytes: {magic:02x?}")]
    UnsupportedInput { path: PathBuf, magic: Vec<u8> },

    /// The upload exceeds the configured byte limit.
    #[error("Upload '{path}' is {size} bytes, over the {limit}-byte limit")]
    UploadTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The PDF has more pages than the configured limit.
    #[error("Document has {pages} pages, over the {limit}-page limit")]
    TooManyPages { pages: usize, limit: usize },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// The document could not be parsed (corrupt, encrypted, or truncated).
    #[error("Could not parse '{path}': {detail}")]
    DocumentParse { path: PathBuf, detail: String },

    /// No drawing surface could be created: pdfium could not be bound or a
    /// page bitmap could not be allocated.
    #[error(
        "Rendering surface unavailable: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to point at an existing copy.\n"
    )]
    RenderSurfaceUnavailable(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// Every model configured for the role failed.
    #[error("All {} {role} models failed{}", attempts.len(), summarize_attempts(attempts))]
    AllModelsFailed {
        role: ModelRole,
        attempts: Vec<ModelInvocationError>,
    },

    /// Formatting produced text with no `Q.<n>` question markers.
    #[error("No questions found in the formatted text")]
    NoQuestionsFound,

    // ── Editing errors ────────────────────────────────────────────────────
    /// An edit referenced a question id that does not exist.
    #[error("Question {id} does not exist (paper has {total} questions)")]
    QuestionNotFound { id: u32, total: usize },

    /// An edit referenced an option index outside the question's options.
    #[error("Question {id} has no option at index {index} ({total} options)")]
    OptionOutOfRange { id: u32, index: usize, total: usize },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The export document could not be assembled.
    #[error("Export to {format} failed: {detail}")]
    ExportFailed { format: String, detail: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize_attempts(attempts: &[ModelInvocationError]) -> String {
    if attempts.is_empty() {
        return String::from(" (no models were attempted)");
    }
    let mut out = String::new();
    for err in attempts {
        out.push_str("\n  • ");
        out.push_str(&err.to_string());
    }
    out
}

/// A single model's failure to answer a single request.
///
/// Every variant carries the model identifier so the orchestrator's attempt
/// list reads as a complete audit trail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ModelInvocationError {
    /// Connection refused, DNS failure, TLS error and similar.
    #[error("{model}: transport error: {detail}")]
    Transport { model: String, detail: String },

    /// The endpoint answered with a non-success status.
    #[error("{model}: HTTP {status}: {body}")]
    HttpStatus {
        model: String,
        status: u16,
        body: String,
    },

    /// The call did not finish within the per-call timeout.
    #[error("{model}: timed out after {secs}s")]
    Timeout { model: String, secs: u64 },

    /// The body could not be decoded as a chat-completion response.
    #[error("{model}: malformed response: {detail}")]
    Malformed { model: String, detail: String },

    /// The response decoded but carried no usable text.
    #[error("{model}: response contained no text")]
    EmptyResponse { model: String },
}

impl ModelInvocationError {
    /// Identifier of the model that failed.
    pub fn model(&self) -> &str {
        match self {
            Self::Transport { model, .. }
            | Self::HttpStatus { model, .. }
            | Self::Timeout { model, .. }
            | Self::Malformed { model, .. }
            | Self::EmptyResponse { model } => model,
        }
    }
}

/// A drawing strategy could not render one run of text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// The built-in PDF font cannot encode this character.
    #[error("character {0:?} is not encodable in the built-in font")]
    Unencodable(char),

    /// No loadable font covers the text.
    #[error("no font available for raster text")]
    NoFont,

    /// Image encoding or embedding failed.
    #[error("image embedding failed: {0}")]
    Image(String),
}
