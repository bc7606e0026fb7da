//! Question parsing: formatted model text → typed [`Question`] records.
//!
//! The formatter is asked for a rigid layout (`Q.<n>` question lines,
//! horizontal `A) … B) …` option lines, blank lines between questions), so a
//! small line-oriented state machine is enough:
//!
//! ```text
//!            Q.<n> line                 option line / other line
//!   Idle ───────────────▶ InQuestion ◀──────────────────────────┐
//!                           │  │                                │
//!                           │  └────────────────────────────────┘
//!                           │ Q.<n> line: close, open next
//!                           ▼
//!                     end of input: close
//! ```
//!
//! Lines before the first marker are ignored, so text with no marker at all
//! parses to an empty list rather than an error.

use crate::paper::{Question, QuestionType};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_QUESTION_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q\.\d+").unwrap());

static RE_OPTION_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Da-d]\)").unwrap());

/// A label that may begin an option inside a horizontal option line.
static RE_OPTION_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)([A-Da-d])\)").unwrap());

static RE_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{5,}").unwrap());

static RE_TRUE_FALSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\(true/false\)").unwrap());

static RE_QUESTION_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Q\.\d+\s*").unwrap());

static RE_OPTION_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]\)\s*").unwrap());

/// Whether a (trimmed) line opens a new question.
pub fn is_question_line(line: &str) -> bool {
    RE_QUESTION_START.is_match(line)
}

/// Whether a (trimmed) line carries MCQ options.
pub fn is_option_line(line: &str) -> bool {
    RE_OPTION_START.is_match(line)
}

/// Parse formatted text into questions with contiguous ids starting at 1.
///
/// An option line turns the open question into an MCQ even when its text
/// also carries a blank or a `(True/False)` marker: lettered options are the
/// stronger evidence.
pub fn parse_questions(formatted_text: &str) -> Vec<Question> {
    let mut questions: Vec<Question> = Vec::new();
    let mut current: Option<Question> = None;

    for line in formatted_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_question_line(line) {
            if let Some(done) = current.take() {
                questions.push(done);
            }
            current = Some(Question {
                id: questions.len() as u32 + 1,
                text: line.to_string(),
                kind: infer_kind(line),
                options: Vec::new(),
            });
            continue;
        }

        let Some(question) = current.as_mut() else {
            continue;
        };

        if is_option_line(line) {
            question.options.extend(split_options(line));
            question.kind = QuestionType::Mcq;
        } else {
            question.text.push(' ');
            question.text.push_str(line);
        }
    }

    if let Some(done) = current {
        questions.push(done);
    }
    questions
}

/// Kind suggested by a question line alone.
fn infer_kind(line: &str) -> QuestionType {
    if RE_BLANK.is_match(line) {
        QuestionType::FillInBlank
    } else if RE_TRUE_FALSE.is_match(line) {
        QuestionType::TrueFalse
    } else {
        QuestionType::ShortAnswer
    }
}

/// Split a horizontal option line into one entry per option.
///
/// A label only starts a new option when it is the next letter in sequence,
/// so `A) a) or c)` stays a single option while `A) Paris  B) Rome` splits.
pub fn split_options(line: &str) -> Vec<String> {
    let mut starts: Vec<usize> = Vec::new();
    let mut expected: Option<u8> = None;

    for caps in RE_OPTION_LABEL.captures_iter(line) {
        let Some(label) = caps.get(1) else { continue };
        let letter = label.as_str().as_bytes()[0].to_ascii_uppercase();
        let accept = match expected {
            None => label.start() == 0,
            Some(next) => letter == next,
        };
        if accept {
            starts.push(label.start());
            expected = Some(letter + 1);
        }
    }

    if starts.is_empty() {
        return vec![line.trim().to_string()];
    }

    let mut options = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(line.len());
        let option = line[start..end].trim();
        if !option.is_empty() {
            options.push(option.to_string());
        }
    }
    options
}

/// One question line plus the non-blank lines that follow it, as laid out
/// in the formatted text. Used by exporters that draw the text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBlock {
    pub question_line: String,
    pub trailing_lines: Vec<String>,
}

impl QuestionBlock {
    /// Trailing lines that are MCQ option lines.
    pub fn option_lines(&self) -> Vec<&str> {
        self.trailing_lines
            .iter()
            .map(String::as_str)
            .filter(|l| is_option_line(l))
            .collect()
    }

    /// Trailing lines that continue the question itself.
    pub fn continuation_lines(&self) -> Vec<&str> {
        self.trailing_lines
            .iter()
            .map(String::as_str)
            .filter(|l| !is_option_line(l))
            .collect()
    }
}

/// Group formatted text into question blocks. Lines before the first
/// `Q.<n>` marker are dropped.
pub fn question_blocks(formatted_text: &str) -> Vec<QuestionBlock> {
    let mut blocks: Vec<QuestionBlock> = Vec::new();
    for line in formatted_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_question_line(line) {
            blocks.push(QuestionBlock {
                question_line: line.to_string(),
                trailing_lines: Vec::new(),
            });
        } else if let Some(block) = blocks.last_mut() {
            block.trailing_lines.push(line.to_string());
        }
    }
    blocks
}

/// `"Q.3 What is…"` → `"What is…"`.
pub fn strip_question_prefix(text: &str) -> &str {
    match RE_QUESTION_PREFIX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

/// `"B) Rome"` → `"Rome"`.
pub fn strip_option_label(text: &str) -> &str {
    match RE_OPTION_PREFIX.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcq_then_fill_in_blank() {
        let qs = parse_questions("Q.1 Capital of France?\nA) Paris  B) Rome\nQ.2 Sky is _____");
        assert_eq!(qs.len(), 2);
        assert_eq!(qs[0].id, 1);
        assert_eq!(qs[0].kind, QuestionType::Mcq);
        assert_eq!(qs[0].options, vec!["A) Paris", "B) Rome"]);
        assert_eq!(qs[1].id, 2);
        assert_eq!(qs[1].kind, QuestionType::FillInBlank);
        assert!(qs[1].options.is_empty());
    }

    #[test]
    fn ids_are_contiguous_regardless_of_source_numbers() {
        let qs = parse_questions("Q.4 a\n\nQ.9 b\nQ.1 c");
        let ids: Vec<u32> = qs.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(qs[1].text, "Q.9 b");
    }

    #[test]
    fn true_false_is_case_insensitive() {
        let qs = parse_questions("Q.1 The sun is a star (true/FALSE)");
        assert_eq!(qs[0].kind, QuestionType::TrueFalse);
    }

    #[test]
    fn blank_takes_precedence_over_true_false() {
        let qs = parse_questions("Q.1 _____ is hot (True/False)");
        assert_eq!(qs[0].kind, QuestionType::FillInBlank);
    }

    #[test]
    fn four_underscores_is_not_a_blank() {
        let qs = parse_questions("Q.1 Write ____ here");
        assert_eq!(qs[0].kind, QuestionType::ShortAnswer);
    }

    #[test]
    fn options_win_over_blank_marker() {
        let qs = parse_questions("Q.1 The _____ is red\nA) apple  B) sky");
        assert_eq!(qs[0].kind, QuestionType::Mcq);
        assert_eq!(qs[0].options.len(), 2);
    }

    #[test]
    fn options_win_over_true_false_marker() {
        let qs = parse_questions("Q.1 Water is wet (True/False)\na) True  b) False");
        assert_eq!(qs[0].kind, QuestionType::Mcq);
        assert_eq!(qs[0].options, vec!["a) True", "b) False"]);
    }

    #[test]
    fn vertical_options_accumulate() {
        let qs = parse_questions("Q.1 Pick one\nA) red\nB) green\nC) blue\nD) black");
        assert_eq!(qs[0].options, vec!["A) red", "B) green", "C) blue", "D) black"]);
    }

    #[test]
    fn continuation_lines_join_with_single_space() {
        let qs = parse_questions("Q.1 Explain\n   photosynthesis   \nin plants.");
        assert_eq!(qs[0].text, "Q.1 Explain photosynthesis in plants.");
        assert_eq!(qs[0].kind, QuestionType::ShortAnswer);
    }

    #[test]
    fn lines_before_first_marker_are_ignored() {
        let qs = parse_questions("Here are your questions:\nA) stray\n\nQ.1 Real one");
        assert_eq!(qs.len(), 1);
        assert_eq!(qs[0].text, "Q.1 Real one");
        assert!(qs[0].options.is_empty());
    }

    #[test]
    fn no_markers_yields_empty() {
        assert!(parse_questions("just some notes\nwith no questions").is_empty());
        assert!(parse_questions("").is_empty());
    }

    #[test]
    fn k_markers_yield_k_questions() {
        let text: String = (1..=12).map(|i| format!("Q.{i} question {i}\n\n")).collect();
        let qs = parse_questions(&text);
        assert_eq!(qs.len(), 12);
        assert!(qs.iter().enumerate().all(|(i, q)| q.id == i as u32 + 1));
    }

    #[test]
    fn devanagari_question_parses() {
        let qs = parse_questions("Q.1 भारत की राजधानी क्या है?\nA) दिल्ली  B) मुंबई");
        assert_eq!(qs[0].kind, QuestionType::Mcq);
        assert_eq!(qs[0].options, vec!["A) दिल्ली", "B) मुंबई"]);
    }

    #[test]
    fn split_options_requires_sequence() {
        assert_eq!(split_options("A) either a) or c)"), vec!["A) either a) or c)"]);
        assert_eq!(
            split_options("A) Mumbai  B) Delhi  C) Kolkata  D) Chennai"),
            vec!["A) Mumbai", "B) Delhi", "C) Kolkata", "D) Chennai"]
        );
    }

    #[test]
    fn question_blocks_keep_trailing_lines() {
        let blocks = question_blocks("intro\nQ.1 a\nA) x  B) y\nQ.2 b\nnote line");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].option_lines(), vec!["A) x  B) y"]);
        assert_eq!(blocks[1].trailing_lines, vec!["note line"]);
        assert!(blocks[1].option_lines().is_empty());
    }

    #[test]
    fn question_blocks_split_continuations_from_options() {
        let blocks = question_blocks("Q.1 Which of these\nis a fruit?\nA) apple  B) stone");
        assert_eq!(blocks[0].continuation_lines(), vec!["is a fruit?"]);
        assert_eq!(blocks[0].option_lines(), vec!["A) apple  B) stone"]);
    }

    #[test]
    fn prefix_helpers() {
        assert_eq!(strip_question_prefix("Q.12 What?"), "What?");
        assert_eq!(strip_question_prefix("What?"), "What?");
        assert_eq!(strip_option_label("c) Oslo"), "Oslo");
    }
}
