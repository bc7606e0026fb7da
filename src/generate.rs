//! Top-level entry points: upload in, question paper out.
//!
//! ## Why two stages?
//!
//! OCR and formatting are separate model calls with separate fallback
//! lists. A vision model is good at reading a page and poor at rewriting
//! notes into exam questions; a text model is the reverse. Splitting the
//! run also lets a caller stop after [`extract`] and review the raw text, or
//! skip both and hand [`QuestionPaper::from_formatted_text`] text it already
//! has.

use crate::config::{ModelRole, PipelineConfig};
use crate::error::ExamQuizError;
use crate::export::{ExportArtifact, ExportFormat};
use crate::output::{DocumentInfo, FailedAttempt, PaperOutput, PaperStats};
use crate::paper::QuestionPaper;
use crate::pipeline::fallback::{FallbackOrchestrator, FormattingRequest, StageResult};
use crate::pipeline::gateway::{HttpGateway, ModelGateway};
use crate::pipeline::input::{read_upload, Upload};
use crate::pipeline::{postprocess, render};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Read an upload and turn it into a question paper.
///
/// Talks to the configured endpoint; see [`generate_paper_with_gateway`] to
/// supply your own [`ModelGateway`].
///
/// # Errors
/// - File not found, unreadable, too large, or not a PDF/image
/// - pdfium unavailable for a PDF upload
/// - Every OCR model failed on some page, or every formatting model failed
pub async fn generate_paper(
    input: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PaperOutput, ExamQuizError> {
    let gateway: Arc<dyn ModelGateway> = Arc::new(HttpGateway::from_config(config)?);
    generate_paper_with_gateway(input, config, gateway).await
}

/// [`generate_paper`] with an explicit gateway.
pub async fn generate_paper_with_gateway(
    input: impl AsRef<Path>,
    config: &PipelineConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<PaperOutput, ExamQuizError> {
    let input = input.as_ref();
    info!("Starting paper generation: {}", input.display());
    let upload = read_upload(input, config.max_upload_bytes).await?;
    run_pipeline(upload, config, gateway).await
}

/// Generate a paper from an upload that is already in memory.
///
/// `name` is only used in error messages and logs.
pub async fn generate_from_bytes(
    name: impl Into<PathBuf>,
    bytes: Vec<u8>,
    config: &PipelineConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<PaperOutput, ExamQuizError> {
    let upload = Upload::from_bytes(name, bytes, config.max_upload_bytes)?;
    run_pipeline(upload, config, gateway).await
}

/// Synchronous wrapper around [`generate_paper`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    input: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<PaperOutput, ExamQuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExamQuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_paper(input, config))
}

/// OCR an upload only: rasterise, read every page, clean the text.
pub async fn extract(
    input: impl AsRef<Path>,
    config: &PipelineConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<String, ExamQuizError> {
    let upload = read_upload(input.as_ref(), config.max_upload_bytes).await?;
    let pages = render::to_page_images(&upload, config).await?;
    if let Some(cb) = &config.progress_callback {
        cb.on_run_start(pages.len());
    }
    let stage = orchestrator(config, gateway)
        .extract_pages(&pages, config.start_index(ModelRole::Ocr))
        .await?;
    Ok(postprocess::clean_ocr_text(&stage.text))
}

/// Format raw text into a parsed paper with the formatting chain.
pub async fn format_text(
    raw_text: &str,
    config: &PipelineConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<QuestionPaper, ExamQuizError> {
    let stage = orchestrator(config, gateway)
        .format_stage(FormattingRequest {
            raw_text: raw_text.to_string(),
            model_index: config.start_index(ModelRole::Formatting),
        })
        .await?;
    Ok(QuestionPaper::from_formatted_text(
        postprocess::clean_formatted_text(&stage.text),
    ))
}

/// Describe an upload without calling any model.
///
/// Does not require an API key.
pub async fn inspect(
    input: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<DocumentInfo, ExamQuizError> {
    let upload = read_upload(input.as_ref(), config.max_upload_bytes).await?;
    let page_count = render::page_count(&upload, config).await?;
    Ok(DocumentInfo {
        kind: upload.kind,
        page_count,
        byte_len: upload.bytes.len() as u64,
    })
}

/// Write an artifact to disk.
///
/// Uses atomic write (temp file + rename) to prevent partial files. When
/// `target` is an existing directory the artifact's fixed file name is used
/// inside it. Returns the path written.
pub async fn export_to_file(
    artifact: &ExportArtifact,
    target: impl AsRef<Path>,
) -> Result<PathBuf, ExamQuizError> {
    let target = target.as_ref();
    let path = if tokio::fs::metadata(target)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        target.join(artifact.file_name)
    } else {
        target.to_path_buf()
    };
    let write_err = |source: std::io::Error| ExamQuizError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    tokio::fs::write(&tmp_path, &artifact.bytes)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(write_err)?;

    debug!("Wrote {} bytes to {}", artifact.bytes.len(), path.display());
    Ok(path)
}

/// Default output path for `format` next to `input`'s directory.
pub fn default_output_path(input: &Path, format: ExportFormat) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format.file_name())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn orchestrator(config: &PipelineConfig, gateway: Arc<dyn ModelGateway>) -> FallbackOrchestrator {
    FallbackOrchestrator::new(gateway, config.roster.clone())
        .with_progress(config.progress_callback.clone())
}

fn record(stats: &mut PaperStats, role: ModelRole, stage: &StageResult) {
    stats
        .failed_attempts
        .extend(stage.failures.iter().cloned().map(|error| FailedAttempt { role, error }));
}

async fn run_pipeline(
    upload: Upload,
    config: &PipelineConfig,
    gateway: Arc<dyn ModelGateway>,
) -> Result<PaperOutput, ExamQuizError> {
    let total_start = Instant::now();
    let orchestrator = orchestrator(config, gateway);
    let mut stats = PaperStats::default();

    // ── Step 1: Rasterise ────────────────────────────────────────────────
    let render_start = Instant::now();
    let pages = render::to_page_images(&upload, config).await?;
    stats.render_duration_ms = render_start.elapsed().as_millis() as u64;
    stats.total_pages = pages.len();
    info!(
        "Prepared {} page image(s) from {} in {}ms",
        pages.len(),
        upload.kind,
        stats.render_duration_ms
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_run_start(pages.len());
    }

    // ── Step 2: OCR ──────────────────────────────────────────────────────
    let ocr_start = Instant::now();
    let ocr = orchestrator
        .extract_pages(&pages, config.start_index(ModelRole::Ocr))
        .await?;
    stats.ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    stats.ocr_model = ocr.model.clone();
    record(&mut stats, ModelRole::Ocr, &ocr);

    let raw_text = postprocess::clean_ocr_text(&ocr.text);
    if raw_text.is_empty() {
        warn!("OCR produced no text; formatting will run on an empty document");
    }
    info!("Extracted {} chars of text", raw_text.len());

    // ── Step 3: Format ───────────────────────────────────────────────────
    let format_start = Instant::now();
    let formatted = orchestrator
        .format_stage(FormattingRequest {
            raw_text: raw_text.clone(),
            model_index: config.start_index(ModelRole::Formatting),
        })
        .await?;
    stats.formatting_duration_ms = format_start.elapsed().as_millis() as u64;
    stats.formatting_model = formatted.model.clone();
    record(&mut stats, ModelRole::Formatting, &formatted);

    // ── Step 4: Parse ────────────────────────────────────────────────────
    let paper = QuestionPaper::from_formatted_text(postprocess::clean_formatted_text(&formatted.text));
    stats.question_count = paper.questions.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Generation complete: {} question(s), {} failed model call(s), {}ms total",
        stats.question_count,
        stats.failed_attempts.len(),
        stats.total_duration_ms
    );
    if let Some(cb) = &config.progress_callback {
        cb.on_run_complete(stats.question_count);
    }

    Ok(PaperOutput {
        raw_text,
        paper,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ExportArtifact {
        crate::export::ExportRenderer::default()
            .render(
                &QuestionPaper::from_formatted_text("Q.1 Hi"),
                &crate::paper::HeaderConfig::default(),
                ExportFormat::Text,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn export_into_directory_uses_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_to_file(&artifact(), dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("question-paper.txt"));
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("Q.1 Hi"));
        assert!(!dir.path().join("question-paper.txt.tmp").exists());
    }

    #[tokio::test]
    async fn export_to_explicit_path_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out/nested/paper.txt");
        let path = export_to_file(&artifact(), &target).await.unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[test]
    fn default_output_sits_next_to_input() {
        assert_eq!(
            default_output_path(Path::new("/tmp/notes/page.png"), ExportFormat::Pdf),
            PathBuf::from("/tmp/notes/question-paper.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("page.png"), ExportFormat::Docx),
            PathBuf::from("question-paper.docx")
        );
    }
}
