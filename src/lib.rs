//! # examquiz
//!
//! Turn photographed or scanned study notes into printable question papers
//! using hosted vision and language models.
//!
//! ## Why this crate?
//!
//! Teachers keep material as handwritten notes, textbook photos, and
//! scanned worksheets. Retyping that into a question paper is slow. This
//! crate reads each page with a vision model, has a text model rewrite the
//! result as numbered exam questions, parses those into typed questions, and
//! lays them out under a school header as PDF, Word, or plain text. Hindi
//! (Devanagari) content is supported end to end.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input    read the upload, identify it by magic bytes
//!  ├─ 2. Render   rasterise PDF pages at 2x via pdfium (spawn_blocking)
//!  ├─ 3. OCR      vision models in fallback order, one page at a time
//!  ├─ 4. Format   text models in fallback order rewrite into Q.1, Q.2, …
//!  ├─ 5. Parse    line state machine → typed questions
//!  └─ 6. Export   PDF (script-aware), .docx, or plain text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use examquiz::{generate_paper, ExportFormat, ExportRenderer, HeaderConfig, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from OPENROUTER_API_KEY / EXAMQUIZ_API_KEY
//!     let config = PipelineConfig::default();
//!     let output = generate_paper("notes.pdf", &config).await?;
//!     println!("{} questions", output.paper.questions.len());
//!
//!     let artifact = ExportRenderer::new(&config.font_paths).render(
//!         &output.paper,
//!         &HeaderConfig::default(),
//!         ExportFormat::Pdf,
//!     )?;
//!     std::fs::write(artifact.file_name, &artifact.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `examquiz` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! examquiz = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod generate;
pub mod output;
pub mod paper;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ModelDescriptor, ModelRole, ModelRoster, PipelineConfig, PipelineConfigBuilder};
pub use error::{ExamQuizError, ModelInvocationError, RenderError};
pub use export::{ExportArtifact, ExportFormat, ExportRenderer, HeaderFields};
pub use generate::{
    default_output_path, export_to_file, extract, format_text, generate_from_bytes, generate_paper,
    generate_paper_with_gateway, generate_sync, inspect,
};
pub use output::{DocumentInfo, FailedAttempt, PaperOutput, PaperStats};
pub use paper::{HeaderConfig, HeaderTemplate, ImagePayload, Question, QuestionPaper, QuestionType};
pub use pipeline::gateway::{HttpGateway, ModelGateway, ModelPayload};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
