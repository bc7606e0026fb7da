//! CLI binary for examquiz.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and a header, then writes the exported paper.

use anyhow::{Context, Result};
use clap::Parser;
use examquiz::pipeline::postprocess::clean_formatted_text;
use examquiz::{
    default_output_path, export_to_file, extract, generate_paper_with_gateway, inspect,
    ExamQuizError, ExportFormat, ExportRenderer, HeaderConfig, HeaderTemplate, HttpGateway,
    ImagePayload, ModelGateway, ModelRole, PaperOutput, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, QuestionPaper,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a page bar during OCR, a spinner while the
/// formatting model works, and one log line per page and per fallback.
struct CliProgressCallback {
    bar: ProgressBar,
    page_started: Mutex<Option<Instant>>,
    fallbacks: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading upload…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            fallbacks: AtomicUsize::new(0),
        })
    }

    /// Clear the bar for runs that end without `on_run_complete`.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Reading");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Reading {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        *self.page_started.lock().unwrap() = Some(Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let elapsed_ms = self
            .page_started
            .lock()
            .unwrap()
            .take()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_model_failed(&self, role: ModelRole, model: &str, error: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} model {} failed, trying next  {}",
            yellow("↻"),
            role,
            bold(model),
            dim(&msg)
        ));
    }

    fn on_formatting_start(&self, raw_text_len: usize) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix("Formatting");
        self.bar
            .set_message(format!("{raw_text_len} chars into questions…"));
    }

    fn on_run_complete(&self, question_count: usize) {
        self.bar.finish_and_clear();
        let fallbacks = self.fallbacks.load(Ordering::SeqCst);
        eprintln!(
            "{} {} question(s) generated{}",
            green("✔"),
            bold(&question_count.to_string()),
            if fallbacks > 0 {
                format!("  ({fallbacks} model fallback(s))")
            } else {
                String::new()
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Notes PDF to a practice worksheet PDF next to the input
  examquiz notes.pdf

  # Photo of a textbook page to a Word document
  examquiz page.jpg --format docx -o paper.docx

  # Custom school header
  examquiz notes.pdf --header custom --school-name "Green Valley School" \
      --exam-title "Unit Test 2" --class 7 --subject Science --marks 20 --logo logo.png

  # Scanned letterhead as the header
  examquiz notes.pdf --header upload --header-image letterhead.png

  # OCR only, print the raw text
  examquiz --text-only notes.pdf

  # Re-export already formatted questions without calling any model
  examquiz --formatted-text questions.txt --format txt -o paper.txt

  # Page count and type only (no API key needed)
  examquiz --inspect-only notes.pdf

  # Parsed questions as JSON
  examquiz --json notes.pdf > paper.json

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      API key for the completion endpoint
  EXAMQUIZ_API_KEY        Alternative API key variable
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, e.g. examquiz=debug

FONTS:
  Hindi (Devanagari) text is drawn into the PDF as images using the first
  installed font that covers it: Noto Sans Devanagari, Mangal, Aparajita,
  Kokila, Utsaah, Arial Unicode MS, then general fallbacks. Add fonts with
  --font /path/to/font.ttf (tried first).
"#;

/// Turn notes into question papers using vision and language models.
#[derive(Parser, Debug)]
#[command(
    name = "examquiz",
    version,
    about = "Turn photographed or scanned notes into formatted question papers",
    long_about = "Read a PDF or image of study notes with a vision model, rewrite it into \
numbered exam questions with a text model, and export a printable paper (PDF, Word, or text) \
under a school header. Models are tried in priority order until one answers.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image file (PNG, JPEG, WebP, GIF, BMP).
    #[arg(required_unless_present = "formatted_text")]
    input: Option<PathBuf>,

    /// Output file or directory. Default: question-paper.<ext> next to the input.
    #[arg(short, long, env = "EXAMQUIZ_OUTPUT")]
    output: Option<PathBuf>,

    /// Export format.
    #[arg(long, env = "EXAMQUIZ_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Header style.
    #[arg(long, env = "EXAMQUIZ_HEADER", value_enum, default_value = "premade")]
    header: HeaderArg,

    /// School name (custom header).
    #[arg(long, env = "EXAMQUIZ_SCHOOL_NAME", default_value = "")]
    school_name: String,

    /// Exam title (custom header).
    #[arg(long, env = "EXAMQUIZ_EXAM_TITLE")]
    exam_title: Option<String>,

    /// Class (custom header).
    #[arg(long, env = "EXAMQUIZ_CLASS", default_value = "")]
    class: String,

    /// Subject (custom header).
    #[arg(long, env = "EXAMQUIZ_SUBJECT", default_value = "")]
    subject: String,

    /// Date (custom header).
    #[arg(long, env = "EXAMQUIZ_DATE", default_value = "")]
    date: String,

    /// Maximum marks (custom header).
    #[arg(long, env = "EXAMQUIZ_MARKS", default_value = "")]
    marks: String,

    /// Time allowed (custom header).
    #[arg(long, env = "EXAMQUIZ_TIME")]
    time: Option<String>,

    /// Logo image (custom header).
    #[arg(long, env = "EXAMQUIZ_LOGO")]
    logo: Option<PathBuf>,

    /// Header banner image (upload header).
    #[arg(long, env = "EXAMQUIZ_HEADER_IMAGE")]
    header_image: Option<PathBuf>,

    /// OCR models in priority order (repeat or comma-separate).
    #[arg(long = "ocr-model", env = "EXAMQUIZ_OCR_MODELS", value_delimiter = ',')]
    ocr_models: Vec<String>,

    /// Formatting models in priority order (repeat or comma-separate).
    #[arg(long = "formatting-model", env = "EXAMQUIZ_FORMATTING_MODELS", value_delimiter = ',')]
    formatting_models: Vec<String>,

    /// Chat-completions endpoint URL.
    #[arg(long, env = "EXAMQUIZ_ENDPOINT")]
    endpoint: Option<String>,

    /// API key (else OPENROUTER_API_KEY / EXAMQUIZ_API_KEY).
    #[arg(long, env = "EXAMQUIZ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Per-model call timeout in seconds.
    #[arg(long, env = "EXAMQUIZ_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// PDF render scale (0.5–4.0).
    #[arg(long, env = "EXAMQUIZ_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Refuse PDFs with more pages than this.
    #[arg(long, env = "EXAMQUIZ_MAX_PAGES", default_value_t = 50)]
    max_pages: usize,

    /// Extra font for raster text, tried before system fonts (repeatable).
    #[arg(long = "font", env = "EXAMQUIZ_FONTS", value_delimiter = ',')]
    fonts: Vec<PathBuf>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Skip OCR and formatting; parse this already formatted text file.
    #[arg(long, env = "EXAMQUIZ_FORMATTED_TEXT")]
    formatted_text: Option<PathBuf>,

    /// Print the result as JSON on stdout.
    #[arg(long, env = "EXAMQUIZ_JSON")]
    json: bool,

    /// Stop after OCR and print the raw text.
    #[arg(long)]
    text_only: bool,

    /// Print upload type and page count only, no model calls.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAMQUIZ_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EXAMQUIZ_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "EXAMQUIZ_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Docx,
    Txt,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Docx => ExportFormat::Docx,
            FormatArg::Txt => ExportFormat::Text,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum HeaderArg {
    Premade,
    Custom,
    Upload,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let runs_models = cli.formatted_text.is_none() && !cli.inspect_only;
    let show_progress = runs_models && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let cli_progress = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = cli_progress
        .clone()
        .map(|cb| cb as Arc<dyn PipelineProgressCallback>);
    let config = build_config(&cli, progress_cb)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let input = input_path(&cli)?;
        let info = inspect(input, &config)
            .await
            .context("Failed to inspect upload")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialise info")?
            );
        } else {
            println!("File:   {}", input.display());
            println!("Type:   {}", info.kind);
            println!("Pages:  {}", info.page_count);
            println!("Bytes:  {}", info.byte_len);
        }
        return Ok(());
    }

    let gateway: Arc<dyn ModelGateway> =
        Arc::new(HttpGateway::from_config(&config).context("Failed to set up HTTP client")?);

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let extracted = extract(input_path(&cli)?, &config, gateway).await;
        if let Some(cb) = &cli_progress {
            cb.finish();
        }
        let text = extracted.context("Text extraction failed")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
        return Ok(());
    }

    // ── Generate (or load) the paper ─────────────────────────────────────
    let started = Instant::now();
    let (paper, output) = if let Some(path) = &cli.formatted_text {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read formatted text from {:?}", path))?;
        (QuestionPaper::from_formatted_text(clean_formatted_text(&text)), None)
    } else {
        let input = input_path(&cli)?;
        let generated = generate_paper_with_gateway(input, &config, gateway).await;
        if let Some(cb) = &cli_progress {
            cb.finish();
        }
        let output = generated.context("Paper generation failed")?;
        (output.paper.clone(), Some(output))
    };

    if paper.is_empty() {
        return Err(ExamQuizError::NoQuestionsFound).context("Nothing to export");
    }

    if cli.json {
        let json = match &output {
            Some(output) => serde_json::to_string_pretty(output),
            None => serde_json::to_string_pretty(&paper),
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    }

    // ── Export ───────────────────────────────────────────────────────────
    let format: ExportFormat = cli.format.into();
    let header = build_header(&cli)?;
    let artifact = ExportRenderer::new(&config.font_paths)
        .render(&paper, &header, format)
        .context("Export failed")?;

    let target = match (&cli.output, &cli.input) {
        (Some(path), _) => path.clone(),
        (None, Some(input)) => default_output_path(input, format),
        (None, None) => PathBuf::from(format.file_name()),
    };
    let written = export_to_file(&artifact, &target)
        .await
        .context("Failed to write export")?;

    if !cli.quiet {
        if artifact.degraded {
            eprintln!(
                "{} {} export failed; wrote plain text instead",
                yellow("⚠"),
                format
            );
        }
        print_summary(&paper, output.as_ref(), started, &written);
    }

    Ok(())
}

fn input_path(cli: &Cli) -> Result<&PathBuf> {
    cli.input.as_ref().context("An input file is required")
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .api_timeout_secs(cli.api_timeout)
        .scale(cli.scale)
        .max_pages(cli.max_pages);

    if let Some(endpoint) = &cli.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(key) = &cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if !cli.ocr_models.is_empty() {
        builder = builder.ocr_models(cli.ocr_models.iter().map(String::as_str));
    }
    if !cli.formatting_models.is_empty() {
        builder = builder.formatting_models(cli.formatting_models.iter().map(String::as_str));
    }
    for font in &cli.fonts {
        builder = builder.font_path(font.clone());
    }
    if let Some(lib) = &cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map header flags to a `HeaderConfig`.
fn build_header(cli: &Cli) -> Result<HeaderConfig> {
    match cli.header {
        HeaderArg::Premade => Ok(HeaderConfig::default()),
        HeaderArg::Custom => {
            let logo = cli
                .logo
                .as_deref()
                .map(ImagePayload::from_path)
                .transpose()
                .context("Failed to read logo")?;
            Ok(HeaderConfig::Custom(HeaderTemplate {
                school_name: cli.school_name.clone(),
                exam_title: cli.exam_title.clone(),
                class: cli.class.clone(),
                subject: cli.subject.clone(),
                date: cli.date.clone(),
                marks: cli.marks.clone(),
                time: cli.time.clone(),
                logo,
            }))
        }
        HeaderArg::Upload => {
            let path = cli
                .header_image
                .as_deref()
                .context("--header upload needs --header-image PATH")?;
            let image = ImagePayload::from_path(path).context("Failed to read header image")?;
            Ok(HeaderConfig::Upload { image })
        }
    }
}

fn print_summary(
    paper: &QuestionPaper,
    output: Option<&PaperOutput>,
    started: Instant,
    written: &std::path::Path,
) {
    eprintln!(
        "{}  {} question(s)  {}ms  →  {}",
        green("✔"),
        paper.questions.len(),
        started.elapsed().as_millis(),
        bold(&written.display().to_string()),
    );
    if let Some(stats) = output.map(|o| &o.stats) {
        eprintln!(
            "   {} {}  /  {} {}",
            dim("ocr:"),
            stats.ocr_model.as_deref().unwrap_or("-"),
            dim("formatting:"),
            stats.formatting_model.as_deref().unwrap_or("-"),
        );
    }
}
