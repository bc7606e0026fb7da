//! Export a question paper as PDF, Word, or plain text.
//!
//! ## Strategy
//!
//! ```text
//! QuestionPaper + HeaderConfig
//!        │
//!        ├── Pdf  ──▶ pdf::render_pdf   (per-run chain: Native → Raster → Placeholder)
//!        ├── Docx ──▶ docx::render_docx ──fail──▶ docx::render_text (degraded)
//!        └── Text ──▶ docx::render_text
//! ```
//!
//! Every target reads the paper's `formatted_text`, so review edits show up
//! in the export once they have been synced.

pub mod docx;
pub mod pdf;
pub mod raster;
pub mod strategy;

use crate::error::ExamQuizError;
use crate::paper::{HeaderConfig, HeaderTemplate, QuestionPaper, BLANK_FIELD};
use raster::FontStack;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Text,
}

impl ExportFormat {
    /// Fixed download name for this format.
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "question-paper.pdf",
            ExportFormat::Docx => "question-paper.docx",
            ExportFormat::Text => "question-paper.txt",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Text => "txt",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ExamQuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" | "word" => Ok(ExportFormat::Docx),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => Err(ExamQuizError::InvalidConfig(format!(
                "unknown export format '{other}' (expected pdf, docx or txt)"
            ))),
        }
    }
}

/// One rendered file, ready to be written or served.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// The format actually produced; differs from the request when degraded.
    pub format: ExportFormat,
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    /// A fallback was produced instead of the requested format.
    pub degraded: bool,
}

impl fmt::Debug for ExportArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportArtifact")
            .field("format", &self.format)
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .field("degraded", &self.degraded)
            .finish()
    }
}

impl ExportArtifact {
    fn new(format: ExportFormat, bytes: Vec<u8>, degraded: bool) -> Self {
        Self {
            format,
            file_name: format.file_name(),
            bytes,
            degraded,
        }
    }
}

/// Header values as flow-document text. Only a custom header carries
/// user values; the premade and upload headers use the blank template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFields {
    pub school_name: String,
    pub exam_title: Option<String>,
    pub class: String,
    pub subject: String,
    pub date: String,
    pub marks: String,
    pub time: Option<String>,
}

impl HeaderFields {
    pub fn from_config(header: &HeaderConfig) -> Self {
        let blank = HeaderTemplate::default();
        let template = match header {
            HeaderConfig::Custom(template) => template,
            HeaderConfig::Premade { .. } | HeaderConfig::Upload { .. } => &blank,
        };
        let or_blank = |v: &str| {
            let v = v.trim();
            if v.is_empty() { BLANK_FIELD.to_string() } else { v.to_string() }
        };
        Self {
            school_name: template.school_name_or_default().to_string(),
            exam_title: template.exam_title().map(str::to_string),
            class: or_blank(&template.class),
            subject: or_blank(&template.subject),
            date: or_blank(&template.date),
            marks: or_blank(&template.marks),
            time: template.time().map(str::to_string),
        }
    }

    /// `Class:`, `Subject:`, `Date:`, `Marks:` and, when set, `Time:` lines.
    pub fn field_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Class: {}", self.class),
            format!("Subject: {}", self.subject),
            format!("Date: {}", self.date),
            format!("Marks: {}", self.marks),
        ];
        if let Some(time) = &self.time {
            lines.push(format!("Time: {time}"));
        }
        lines
    }
}

/// Renders papers into [`ExportArtifact`]s.
///
/// Devanagari runs in a PDF are rasterised with `ab_glyph`, which places
/// glyphs one after another without complex-script shaping. Conjuncts and
/// vowel signs (matras) that need reordering or ligature substitution come out
/// in logical order, so Hindi text is legible but not typographically
/// correct. The `.docx` and text targets store the characters themselves and
/// leave shaping to the viewer.
#[derive(Debug)]
pub struct ExportRenderer {
    fonts: FontStack,
}

impl Default for ExportRenderer {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ExportRenderer {
    /// `font_paths` are tried before the system fonts for raster text.
    pub fn new(font_paths: &[PathBuf]) -> Self {
        Self {
            fonts: FontStack::new(font_paths),
        }
    }

    /// Use exactly this font stack (tests pin it to get stable output).
    pub fn with_fonts(fonts: FontStack) -> Self {
        Self { fonts }
    }

    pub fn render(
        &self,
        paper: &QuestionPaper,
        header: &HeaderConfig,
        format: ExportFormat,
    ) -> Result<ExportArtifact, ExamQuizError> {
        let text = &paper.formatted_text;
        let artifact = match format {
            ExportFormat::Pdf => {
                let (bytes, _) = pdf::render_pdf(text, header, &self.fonts)?;
                ExportArtifact::new(ExportFormat::Pdf, bytes, false)
            }
            ExportFormat::Docx => {
                let fields = HeaderFields::from_config(header);
                match docx::render_docx(text, &fields) {
                    Ok(bytes) => ExportArtifact::new(ExportFormat::Docx, bytes, false),
                    Err(e) => {
                        warn!("Word export failed ({}), writing plain text instead", e);
                        ExportArtifact::new(ExportFormat::Text, docx::render_text(text, &fields).into_bytes(), true)
                    }
                }
            }
            ExportFormat::Text => {
                let fields = HeaderFields::from_config(header);
                ExportArtifact::new(ExportFormat::Text, docx::render_text(text, &fields).into_bytes(), false)
            }
        };
        info!(
            "Exported {} ({} bytes{})",
            artifact.file_name,
            artifact.bytes.len(),
            if artifact.degraded { ", degraded" } else { "" }
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> ExportRenderer {
        ExportRenderer::with_fonts(FontStack::only(&[]))
    }

    fn paper() -> QuestionPaper {
        QuestionPaper::from_formatted_text("Q.1 Capital of France?\nA) Paris  B) Rome\n\nQ.2 Sky is _____")
    }

    #[test]
    fn format_parsing_and_names() {
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("word".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("odt".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Docx.file_name(), "question-paper.docx");
        assert_eq!(ExportFormat::Text.to_string(), "txt");
    }

    #[test]
    fn header_fields_ignore_values_outside_custom() {
        let fields = HeaderFields::from_config(&HeaderConfig::default());
        assert_eq!(fields.school_name, "School Name");
        assert_eq!(fields.class, BLANK_FIELD);
        assert_eq!(fields.exam_title, None);
        assert_eq!(fields.field_lines().len(), 4);
    }

    #[test]
    fn renders_each_format() {
        let r = renderer();
        let header = HeaderConfig::default();

        let pdf = r.render(&paper(), &header, ExportFormat::Pdf).unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF"));
        assert_eq!(pdf.file_name, "question-paper.pdf");

        let docx = r.render(&paper(), &header, ExportFormat::Docx).unwrap();
        assert!(docx.bytes.starts_with(b"PK"));
        assert!(!docx.degraded);

        let text = r.render(&paper(), &header, ExportFormat::Text).unwrap();
        assert!(String::from_utf8(text.bytes).unwrap().ends_with("Q.2 Sky is _____"));
    }

    #[test]
    fn unwritable_word_document_degrades_to_text() {
        let p = QuestionPaper::from_formatted_text("Q.1 Speed of light\u{1}?\nA) fast  B) slow");
        let artifact = renderer()
            .render(&p, &HeaderConfig::default(), ExportFormat::Docx)
            .unwrap();
        assert!(artifact.degraded);
        assert_eq!(artifact.format, ExportFormat::Text);
        assert_eq!(artifact.file_name, "question-paper.txt");
        let text = String::from_utf8(artifact.bytes).unwrap();
        assert!(text.starts_with("School Name\n"));
        assert!(text.ends_with("Q.1 Speed of light\u{1}?\nA) fast  B) slow"));
    }

    #[test]
    fn edits_reach_the_export_after_sync() {
        let mut p = paper();
        p.update_text(2, "Grass is _____").unwrap();
        let text = renderer().render(&p, &HeaderConfig::default(), ExportFormat::Text).unwrap();
        assert!(String::from_utf8(text.bytes).unwrap().contains("Q.2 Grass is _____"));
    }
}
