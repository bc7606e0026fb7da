//! Full-pipeline tests with a scripted model gateway.
//!
//! Uploads are small PNGs written to a temp dir, so no pdfium library and no
//! network are needed. The gateway answers from a script keyed by model id
//! and records every call so fallback order can be asserted exactly.

use async_trait::async_trait;
use examquiz::{
    extract, generate_from_bytes, generate_paper_with_gateway, ExamQuizError, ExportFormat, ExportRenderer,
    HeaderConfig, HeaderTemplate, ModelDescriptor, ModelGateway, ModelInvocationError,
    ModelPayload, ModelRole, PipelineConfig, PipelineProgressCallback, QuestionType,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Answers keyed by model id; unknown models fail with HTTP 503.
struct ScriptedGateway {
    answers: HashMap<String, String>,
    calls: Mutex<Vec<(String, ModelRole)>>,
}

impl ScriptedGateway {
    fn new(answers: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers
                .iter()
                .map(|(m, a)| (m.to_string(), a.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self, role: ModelRole) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        payload: &ModelPayload,
    ) -> Result<String, ModelInvocationError> {
        match (model.role, payload) {
            (ModelRole::Ocr, ModelPayload::Images(uris)) => {
                assert!(uris.iter().all(|u| u.starts_with("data:image/png;base64,")));
            }
            (ModelRole::Formatting, ModelPayload::Text { prompt }) => {
                assert!(prompt.starts_with("Format the following text"));
            }
            other => panic!("payload does not match role: {other:?}"),
        }
        self.calls
            .lock()
            .unwrap()
            .push((model.identifier.clone(), model.role));
        self.answers
            .get(&model.identifier)
            .cloned()
            .ok_or_else(|| ModelInvocationError::HttpStatus {
                model: model.identifier.clone(),
                status: 503,
                body: "no capacity".into(),
            })
    }
}

fn config() -> PipelineConfig {
    PipelineConfig::builder()
        .api_key("test-key")
        .ocr_models(["ocr-a", "ocr-b", "ocr-c"])
        .formatting_models(["fmt-a", "fmt-b"])
        .build()
        .unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        8,
        8,
        image::Rgb([250, 250, 250]),
    ));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn png_upload(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("notes.png");
    std::fs::write(&path, png_bytes()).unwrap();
    path
}

const FORMATTED: &str = "**Q.1** Capital of France?\nA) Paris  B) Rome\n\nQ.2 Sky is _____\n\nQ.3 Fire is cold (true/false)";

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_falls_back_and_parses() {
    let dir = tempfile::tempdir().unwrap();
    let gw = ScriptedGateway::new(&[
        ("ocr-b", "```\nCapital of France is Paris.\n```"),
        ("fmt-a", FORMATTED),
    ]);

    let output = generate_paper_with_gateway(png_upload(&dir), &config(), gw.clone())
        .await
        .unwrap();

    assert_eq!(gw.calls(ModelRole::Ocr), vec!["ocr-a", "ocr-b"]);
    assert_eq!(gw.calls(ModelRole::Formatting), vec!["fmt-a"]);
    assert_eq!(output.raw_text, "Capital of France is Paris.");

    let questions = &output.paper.questions;
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0].kind, QuestionType::Mcq);
    assert_eq!(questions[0].options, vec!["A) Paris", "B) Rome"]);
    assert_eq!(questions[1].kind, QuestionType::FillInBlank);
    assert_eq!(questions[2].kind, QuestionType::TrueFalse);
    assert_eq!(
        questions.iter().map(|q| q.id).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    assert_eq!(output.stats.total_pages, 1);
    assert_eq!(output.stats.question_count, 3);
    assert_eq!(output.stats.ocr_model.as_deref(), Some("ocr-b"));
    assert_eq!(output.stats.formatting_model.as_deref(), Some("fmt-a"));
    assert_eq!(output.stats.failed_attempts.len(), 1);
    assert_eq!(output.stats.failed_attempts[0].role, ModelRole::Ocr);
}

#[tokio::test]
async fn all_ocr_models_failing_reports_every_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let gw = ScriptedGateway::new(&[("fmt-a", FORMATTED)]);

    let err = generate_paper_with_gateway(png_upload(&dir), &config(), gw.clone())
        .await
        .unwrap_err();

    match err {
        ExamQuizError::AllModelsFailed { role, attempts } => {
            assert_eq!(role, ModelRole::Ocr);
            assert_eq!(attempts.len(), 3);
            let models: Vec<&str> = attempts.iter().map(|a| a.model()).collect();
            assert_eq!(models, vec!["ocr-a", "ocr-b", "ocr-c"]);
        }
        other => panic!("expected AllModelsFailed, got {other:?}"),
    }
    assert!(
        gw.calls(ModelRole::Formatting).is_empty(),
        "formatting must not run after OCR failed"
    );
}

#[tokio::test]
async fn formatting_exhaustion_is_reported_for_its_role() {
    let gw = ScriptedGateway::new(&[("ocr-a", "some notes")]);
    let err = generate_from_bytes("notes.png", png_bytes(), &config(), gw.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExamQuizError::AllModelsFailed { role: ModelRole::Formatting, ref attempts } if attempts.len() == 2
    ));
    assert_eq!(gw.calls(ModelRole::Formatting), vec!["fmt-a", "fmt-b"]);
}

#[tokio::test]
async fn start_indices_skip_leading_models() {
    let gw = ScriptedGateway::new(&[("ocr-a", "a"), ("ocr-c", "notes"), ("fmt-b", "Q.1 Hi?")]);
    let config = PipelineConfig::builder()
        .ocr_models(["ocr-a", "ocr-b", "ocr-c"])
        .formatting_models(["fmt-a", "fmt-b"])
        .ocr_start_index(1)
        .formatting_start_index(1)
        .build()
        .unwrap();

    let output = generate_from_bytes("notes.png", png_bytes(), &config, gw.clone())
        .await
        .unwrap();
    assert_eq!(gw.calls(ModelRole::Ocr), vec!["ocr-b", "ocr-c"]);
    assert_eq!(gw.calls(ModelRole::Formatting), vec!["fmt-b"]);
    assert_eq!(output.paper.questions.len(), 1);
}

#[tokio::test]
async fn unsupported_upload_is_rejected_before_any_call() {
    let gw = ScriptedGateway::new(&[]);
    let err = generate_from_bytes("notes.txt", b"plain text".to_vec(), &config(), gw.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, ExamQuizError::UnsupportedInput { .. }));
    assert!(gw.calls(ModelRole::Ocr).is_empty());
}

#[tokio::test]
async fn missing_upload_is_file_not_found() {
    let gw = ScriptedGateway::new(&[]);
    let err = generate_paper_with_gateway("/no/such/notes.png", &config(), gw)
        .await
        .unwrap_err();
    assert!(matches!(err, ExamQuizError::FileNotFound { .. }));
}

#[tokio::test]
async fn progress_events_follow_the_run() {
    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl PipelineProgressCallback for Recorder {
        fn on_run_start(&self, total_pages: usize) {
            self.0.lock().unwrap().push(format!("start {total_pages}"));
        }
        fn on_page_complete(&self, page_num: usize, _total: usize, _len: usize) {
            self.0.lock().unwrap().push(format!("page {page_num}"));
        }
        fn on_model_failed(&self, role: ModelRole, model: &str, _error: &str) {
            self.0.lock().unwrap().push(format!("failed {role} {model}"));
        }
        fn on_formatting_start(&self, _raw_text_len: usize) {
            self.0.lock().unwrap().push("formatting".into());
        }
        fn on_run_complete(&self, question_count: usize) {
            self.0.lock().unwrap().push(format!("done {question_count}"));
        }
    }

    let recorder = Arc::new(Recorder::default());
    let config = PipelineConfig::builder()
        .ocr_models(["ocr-a", "ocr-b"])
        .formatting_models(["fmt-a"])
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let gw = ScriptedGateway::new(&[("ocr-b", "notes"), ("fmt-a", FORMATTED)]);

    generate_from_bytes("notes.png", png_bytes(), &config, gw)
        .await
        .unwrap();

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![
            "start 1",
            "failed OCR ocr-a",
            "page 1",
            "formatting",
            "done 3"
        ]
    );
}

#[tokio::test]
async fn generated_paper_exports_in_every_format() {
    let gw = ScriptedGateway::new(&[("ocr-a", "notes"), ("fmt-a", FORMATTED)]);
    let output = generate_from_bytes("notes.png", png_bytes(), &config(), gw)
        .await
        .unwrap();

    let renderer = ExportRenderer::new(&[]);
    let header = HeaderConfig::Custom(HeaderTemplate {
        school_name: "Green Valley School".into(),
        subject: "GK".into(),
        ..Default::default()
    });

    let pdf = renderer
        .render(&output.paper, &header, ExportFormat::Pdf)
        .unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF"));

    let docx = renderer
        .render(&output.paper, &header, ExportFormat::Docx)
        .unwrap();
    assert_eq!(docx.file_name, "question-paper.docx");
    assert!(!docx.degraded);

    let first = renderer
        .render(&output.paper, &header, ExportFormat::Text)
        .unwrap();
    let second = renderer
        .render(&output.paper, &header, ExportFormat::Text)
        .unwrap();
    assert_eq!(first.bytes, second.bytes, "text export must be deterministic");
    let text = String::from_utf8(first.bytes).unwrap();
    assert!(text.starts_with("Green Valley School\n\nClass: __________\nSubject: GK\n"));
    assert!(text.ends_with("Q.3 Fire is cold (true/false)"));
}

#[tokio::test]
async fn control_characters_from_models_do_not_reach_the_word_export() {
    let gw = ScriptedGateway::new(&[
        ("ocr-a", "notes"),
        ("fmt-a", "Q.1 Speed of light\u{1}?\nA) fast  B) slow"),
    ]);
    let output = generate_from_bytes("notes.png", png_bytes(), &config(), gw)
        .await
        .unwrap();
    assert_eq!(output.paper.questions[0].text, "Q.1 Speed of light?");

    let docx = ExportRenderer::new(&[])
        .render(&output.paper, &HeaderConfig::default(), ExportFormat::Docx)
        .unwrap();
    assert_eq!(docx.format, ExportFormat::Docx);
    assert!(!docx.degraded);
}

#[tokio::test]
async fn text_extraction_reports_run_start() {
    #[derive(Default)]
    struct Starts(Mutex<Vec<usize>>);

    impl PipelineProgressCallback for Starts {
        fn on_run_start(&self, total_pages: usize) {
            self.0.lock().unwrap().push(total_pages);
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let starts = Arc::new(Starts::default());
    let config = PipelineConfig::builder()
        .ocr_models(["ocr-a"])
        .formatting_models(["fmt-a"])
        .progress_callback(starts.clone())
        .build()
        .unwrap();
    let gw = ScriptedGateway::new(&[("ocr-a", "```\nnotes\n```")]);

    let text = extract(png_upload(&dir), &config, gw.clone()).await.unwrap();
    assert_eq!(text, "notes");
    assert_eq!(*starts.0.lock().unwrap(), vec![1]);
    assert!(gw.calls(ModelRole::Formatting).is_empty());
}
