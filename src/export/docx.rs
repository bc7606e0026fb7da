//! Word (`.docx`) and plain-text export.
//!
//! The `.docx` is a minimal WordprocessingML package: content types, the
//! package relationship, and one `word/document.xml` holding one paragraph
//! per header field and one per non-blank line of the formatted text. Zip
//! timestamps are pinned so identical input gives identical bytes.

use super::HeaderFields;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Why a `.docx` could not be produced.
#[derive(Debug, Error)]
pub enum DocxError {
    /// The text holds a character XML 1.0 cannot carry (C0 controls and
    /// friends). Word refuses to open such a file.
    #[error("character U+{code:04X} on line {line} cannot be stored in a Word document")]
    InvalidChar { code: u32, line: usize },

    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// XML 1.0 `Char` production.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn check_xml_text(text: &str, line: usize) -> Result<(), DocxError> {
    match text.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(DocxError::InvalidChar { code: c as u32, line }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    /// Bold and centred.
    Title,
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn paragraph(writer: &mut XmlWriter, text: &str, style: Style) -> Result<(), DocxError> {
    writer.write_event(Event::Start(BytesStart::new("w:p")))?;
    if style == Style::Title {
        writer.write_event(Event::Start(BytesStart::new("w:pPr")))?;
        let mut jc = BytesStart::new("w:jc");
        jc.push_attribute(("w:val", "center"));
        writer.write_event(Event::Empty(jc))?;
        writer.write_event(Event::End(BytesEnd::new("w:pPr")))?;
    }
    if !text.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("w:r")))?;
        if style == Style::Title {
            writer.write_event(Event::Start(BytesStart::new("w:rPr")))?;
            writer.write_event(Event::Empty(BytesStart::new("w:b")))?;
            writer.write_event(Event::End(BytesEnd::new("w:rPr")))?;
        }
        let mut t = BytesStart::new("w:t");
        t.push_attribute(("xml:space", "preserve"));
        writer.write_event(Event::Start(t))?;
        writer.write_event(Event::Text(BytesText::new(text)))?;
        writer.write_event(Event::End(BytesEnd::new("w:t")))?;
        writer.write_event(Event::End(BytesEnd::new("w:r")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("w:p")))?;
    Ok(())
}

fn section_properties(writer: &mut XmlWriter) -> Result<(), DocxError> {
    writer.write_event(Event::Start(BytesStart::new("w:sectPr")))?;
    let mut size = BytesStart::new("w:pgSz");
    size.push_attribute(("w:w", "11906"));
    size.push_attribute(("w:h", "16838"));
    writer.write_event(Event::Empty(size))?;
    let mut margins = BytesStart::new("w:pgMar");
    for (name, value) in [
        ("w:top", "1134"),
        ("w:right", "1134"),
        ("w:bottom", "1134"),
        ("w:left", "1134"),
        ("w:header", "708"),
        ("w:footer", "708"),
        ("w:gutter", "0"),
    ] {
        margins.push_attribute((name, value));
    }
    writer.write_event(Event::Empty(margins))?;
    writer.write_event(Event::End(BytesEnd::new("w:sectPr")))?;
    Ok(())
}

/// Body of `word/document.xml`.
pub(crate) fn document_xml(formatted_text: &str, fields: &HeaderFields) -> Result<String, DocxError> {
    let mut header: Vec<(&str, Style)> = vec![(fields.school_name.as_str(), Style::Title)];
    if let Some(title) = &fields.exam_title {
        header.push((title.as_str(), Style::Title));
    }
    let field_lines = fields.field_lines();
    for (line, text) in header.iter().map(|(t, _)| *t).chain(field_lines.iter().map(String::as_str)).enumerate() {
        check_xml_text(text, line + 1)?;
    }
    for (line, text) in formatted_text.lines().enumerate() {
        check_xml_text(text, line + 1)?;
    }

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    let mut document = BytesStart::new("w:document");
    document.push_attribute(("xmlns:w", WORDML_NS));
    writer.write_event(Event::Start(document))?;
    writer.write_event(Event::Start(BytesStart::new("w:body")))?;

    for (text, style) in &header {
        paragraph(&mut writer, text, *style)?;
    }
    paragraph(&mut writer, "", Style::Plain)?;

    for line in &field_lines {
        paragraph(&mut writer, line, Style::Plain)?;
    }
    paragraph(&mut writer, "", Style::Plain)?;
    paragraph(&mut writer, "", Style::Plain)?;

    for line in formatted_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        paragraph(&mut writer, line, Style::Plain)?;
    }

    section_properties(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("w:body")))?;
    writer.write_event(Event::End(BytesEnd::new("w:document")))?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| DocxError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Package the paper as a `.docx`.
pub fn render_docx(formatted_text: &str, fields: &HeaderFields) -> Result<Vec<u8>, DocxError> {
    let document = document_xml(formatted_text, fields)?;
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", PACKAGE_RELS_XML),
        ("word/document.xml", document.as_str()),
    ] {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Plain-text rendering: the header fields, two blank lines, then the
/// formatted text verbatim.
pub fn render_text(formatted_text: &str, fields: &HeaderFields) -> String {
    let mut out = String::new();
    out.push_str(&fields.school_name);
    out.push('\n');
    if let Some(title) = &fields.exam_title {
        out.push_str(title);
        out.push('\n');
    }
    out.push('\n');
    for line in fields.field_lines() {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str("\n\n");
    out.push_str(formatted_text);
    out
}
