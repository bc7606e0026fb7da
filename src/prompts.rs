//! Model prompts for OCR and question formatting.
//!
//! Centralising every prompt here means changing the default behaviour
//! requires editing exactly one place, and unit tests can inspect the prompts
//! without calling a model.
//!
//! The formatting rules are written to match what
//! [`crate::pipeline::parse`] expects: `Q.<n>` question lines, horizontal
//! `A) … B) …` option lines, `_____` blanks and a `(True/False)` suffix.

/// Instruction sent alongside page images to the OCR models.
pub const OCR_INSTRUCTION: &str =
    "Extract and return the text from this image. Do not include any additional text or commentary.";

/// Formatting instructions. The raw OCR text is appended after the final line.
pub const FORMATTING_PROMPT: &str = r#"Format the following text into properly structured exam questions. Follow these rules precisely:

1. Number every question as Q.1, Q.2, Q.3 and so on, at the start of its line
2. For multiple choice questions, put all options on ONE line after the question, separated by two spaces: A) Mumbai  B) Delhi  C) Kolkata  D) Chennai
3. For fill in the blanks, use five underscores: _____
4. For true/false questions, add (True/False) at the end of the question
5. Number questions sequentially without gaps
6. Remove headings, instructions, page numbers and any text that is not a question
7. Keep the original language of each question (Hindi or English); do not translate
8. Return ONLY the formatted questions, with no commentary or markdown
9. Leave one blank line between questions

Text to format:
"#;

/// Build the formatting prompt for `raw_text`.
pub fn formatting_prompt(raw_text: &str) -> String {
    format!("{FORMATTING_PROMPT}{}", raw_text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_prompt_embeds_text_last() {
        let p = formatting_prompt("  what is 2+2  ");
        assert!(p.ends_with("Text to format:\nwhat is 2+2"));
    }

    #[test]
    fn formatting_prompt_names_parser_markers() {
        assert!(FORMATTING_PROMPT.contains("Q.1"));
        assert!(FORMATTING_PROMPT.contains("_____"));
        assert!(FORMATTING_PROMPT.contains("(True/False)"));
        assert!(FORMATTING_PROMPT.contains("A) Mumbai  B) Delhi"));
    }
}
