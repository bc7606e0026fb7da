//! Domain records: questions, the editable question paper, and header choices.

use crate::error::ExamQuizError;
use crate::pipeline::parse;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ── Questions ────────────────────────────────────────────────────────────

/// Kind of a question, inferred from its formatted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QuestionType {
    /// Multiple choice, with lettered options.
    #[serde(rename = "MCQ")]
    Mcq,
    /// Contains a `_____` blank.
    #[serde(rename = "Fill in the blanks")]
    FillInBlank,
    /// Marked `(True/False)`.
    #[serde(rename = "True/False")]
    TrueFalse,
    /// Anything else.
    #[default]
    #[serde(rename = "Short Answer")]
    ShortAnswer,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::FillInBlank => "Fill in the blanks",
            QuestionType::TrueFalse => "True/False",
            QuestionType::ShortAnswer => "Short Answer",
        })
    }
}

/// One parsed question.
///
/// `text` keeps its `Q.<n>` prefix. `options` is non-empty only for
/// [`QuestionType::Mcq`], and each option starts with its letter label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Question {
    /// Formatted-text lines for this question: the question line, then the
    /// options on one horizontal line for MCQs.
    pub fn to_lines(&self) -> Vec<String> {
        let mut lines = vec![self.text.clone()];
        if self.kind == QuestionType::Mcq && !self.options.is_empty() {
            lines.push(self.options.join("  "));
        }
        lines
    }
}

// ── Question paper ───────────────────────────────────────────────────────

/// Parsed questions plus the formatted text they came from.
///
/// Exports render from `formatted_text`; every edit rewrites it from the
/// questions so exports always reflect the reviewed content.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionPaper {
    pub questions: Vec<Question>,
    pub formatted_text: String,
}

impl QuestionPaper {
    /// Parse `formatted_text` into a paper.
    pub fn from_formatted_text(formatted_text: impl Into<String>) -> Self {
        let formatted_text = formatted_text.into();
        let questions = parse::parse_questions(&formatted_text);
        Self {
            questions,
            formatted_text,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Replace a question's body. Any `Q.<n>` prefix in `text` is dropped and
    /// the question's own prefix is restored.
    pub fn update_text(&mut self, id: u32, text: &str) -> Result<(), ExamQuizError> {
        let question = self.question_mut(id)?;
        let body = parse::strip_question_prefix(text.trim());
        question.text = if body.is_empty() {
            format!("Q.{id}")
        } else {
            format!("Q.{id} {body}")
        };
        self.sync_formatted_text();
        Ok(())
    }

    /// Change a question's kind. Leaving MCQ clears its options.
    pub fn update_kind(&mut self, id: u32, kind: QuestionType) -> Result<(), ExamQuizError> {
        let question = self.question_mut(id)?;
        question.kind = kind;
        if kind != QuestionType::Mcq {
            question.options.clear();
        }
        self.sync_formatted_text();
        Ok(())
    }

    /// Replace option `index` (0-based) of an MCQ. The letter label is
    /// re-derived from the index.
    pub fn update_option(&mut self, id: u32, index: usize, text: &str) -> Result<(), ExamQuizError> {
        let question = self.question_mut(id)?;
        let total = question.options.len();
        let option = question
            .options
            .get_mut(index)
            .ok_or(ExamQuizError::OptionOutOfRange { id, index, total })?;
        let label = option_label(index);
        let body = parse::strip_option_label(text.trim());
        *option = if body.is_empty() {
            format!("{label})")
        } else {
            format!("{label}) {body}")
        };
        self.sync_formatted_text();
        Ok(())
    }

    /// Rebuild `formatted_text` from the questions, one block per question,
    /// blank line between blocks.
    pub fn sync_formatted_text(&mut self) {
        self.formatted_text = self
            .questions
            .iter()
            .map(|q| q.to_lines().join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
    }

    fn question_mut(&mut self, id: u32) -> Result<&mut Question, ExamQuizError> {
        let total = self.questions.len();
        self.questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(ExamQuizError::QuestionNotFound { id, total })
    }
}

fn option_label(index: usize) -> char {
    // Labels run A, B, C, … ; past Z they stay at Z rather than leaving ASCII.
    char::from(b'A' + index.min(25) as u8)
}

// ── Header ───────────────────────────────────────────────────────────────

/// Encoded image bytes supplied by the user (logo or header banner).
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Read an image file from disk.
    pub fn from_path(path: &Path) -> Result<Self, ExamQuizError> {
        std::fs::read(path)
            .map(Self::new)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ExamQuizError::FileNotFound {
                    path: path.to_path_buf(),
                },
                std::io::ErrorKind::PermissionDenied => ExamQuizError::PermissionDenied {
                    path: path.to_path_buf(),
                },
                _ => ExamQuizError::Internal(format!("reading {}: {e}", path.display())),
            })
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImagePayload({} bytes)", self.bytes.len())
    }
}

/// Fields printed at the top of a custom header.
///
/// Empty strings mean "leave a blank to fill in by hand".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTemplate {
    pub school_name: String,
    pub exam_title: Option<String>,
    pub class: String,
    pub subject: String,
    pub date: String,
    pub marks: String,
    pub time: Option<String>,
    pub logo: Option<ImagePayload>,
}

/// Blank-line placeholder used for unfilled header fields.
pub const BLANK_FIELD: &str = "__________";

impl HeaderTemplate {
    /// School name, or the generic placeholder when unset.
    pub fn school_name_or_default(&self) -> &str {
        non_blank(&self.school_name).unwrap_or("School Name")
    }

    pub fn exam_title(&self) -> Option<&str> {
        self.exam_title.as_deref().and_then(non_blank)
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref().and_then(non_blank)
    }

    /// `"{label}: {value}"`, with [`BLANK_FIELD`] for an empty value.
    pub fn field_line(label: &str, value: &str) -> String {
        format!("{label}: {}", non_blank(value).unwrap_or(BLANK_FIELD))
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// How the top of the paper is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderConfig {
    /// A built-in template with blank fields.
    Premade { template: String },
    /// Fields supplied by the user.
    Custom(HeaderTemplate),
    /// A user-supplied banner image placed verbatim.
    Upload { image: ImagePayload },
}

impl Default for HeaderConfig {
    fn default() -> Self {
        HeaderConfig::Premade {
            template: String::from("practice-worksheet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QuestionPaper {
        QuestionPaper::from_formatted_text(
            "Q.1 Capital of France?\nA) Paris  B) Rome\n\nQ.2 Sky is _____\n\nQ.3 Fire is cold (True/False)",
        )
    }

    #[test]
    fn to_lines_puts_options_on_one_line() {
        let paper = sample();
        assert_eq!(
            paper.questions[0].to_lines(),
            vec!["Q.1 Capital of France?", "A) Paris  B) Rome"]
        );
        assert_eq!(paper.questions[1].to_lines(), vec!["Q.2 Sky is _____"]);
    }

    #[test]
    fn update_text_keeps_own_prefix() {
        let mut paper = sample();
        paper.update_text(2, "Q.9 Grass is _____").unwrap();
        assert_eq!(paper.get(2).unwrap().text, "Q.2 Grass is _____");
        assert!(paper.formatted_text.contains("Q.2 Grass is _____"));
        assert!(!paper.formatted_text.contains("Sky"));
    }

    #[test]
    fn update_option_relabels_by_index() {
        let mut paper = sample();
        paper.update_option(1, 1, "Berlin").unwrap();
        assert_eq!(paper.get(1).unwrap().options[1], "B) Berlin");
        paper.update_option(1, 0, "C) Lyon").unwrap();
        assert_eq!(paper.get(1).unwrap().options[0], "A) Lyon");
        assert!(paper.formatted_text.contains("A) Lyon  B) Berlin"));
    }

    #[test]
    fn update_kind_away_from_mcq_clears_options() {
        let mut paper = sample();
        paper.update_kind(1, QuestionType::ShortAnswer).unwrap();
        let q = paper.get(1).unwrap();
        assert_eq!(q.kind, QuestionType::ShortAnswer);
        assert!(q.options.is_empty());
    }

    #[test]
    fn edits_report_missing_targets() {
        let mut paper = sample();
        assert!(matches!(
            paper.update_text(7, "x"),
            Err(ExamQuizError::QuestionNotFound { id: 7, total: 3 })
        ));
        assert!(matches!(
            paper.update_option(1, 4, "x"),
            Err(ExamQuizError::OptionOutOfRange { id: 1, index: 4, total: 2 })
        ));
    }

    #[test]
    fn synced_text_reparses_to_same_questions() {
        let mut paper = sample();
        paper.sync_formatted_text();
        let reparsed = QuestionPaper::from_formatted_text(paper.formatted_text.clone());
        assert_eq!(reparsed.questions, paper.questions);
    }

    #[test]
    fn question_serializes_with_display_type_names() {
        let paper = sample();
        let json = serde_json::to_string(&paper.questions[1]).unwrap();
        assert!(json.contains("\"type\":\"Fill in the blanks\""), "got: {json}");
        assert!(!json.contains("options"));
    }

    #[test]
    fn header_field_line_uses_blank_placeholder() {
        assert_eq!(HeaderTemplate::field_line("Class", ""), "Class: __________");
        assert_eq!(HeaderTemplate::field_line("Marks", " 50 "), "Marks: 50");
        assert_eq!(HeaderTemplate::default().school_name_or_default(), "School Name");
    }
}
