//! PDF export: lay out the header and question blocks on A4 pages.
//!
//! Layout is done in millimetres from the top-left corner, the way a printed
//! worksheet is measured. Every run of text goes through the strategy chain
//! in [`super::strategy`], so a paper always renders even when no font on the
//! machine can draw its script.
//!
//! ## Why a hand-built document
//!
//! Text uses the standard Helvetica font with WinAnsi encoding, which every
//! PDF viewer ships. Nothing needs to be embedded for Latin text, and the
//! raster fallback covers the rest as DeviceRGB images.

use super::raster::FontStack;
use super::strategy::{contains_devanagari, draw_with_fallback, Align, TextRun, TextStrategy, TextSurface};
use crate::error::{ExamQuizError, RenderError};
use crate::paper::{HeaderConfig, HeaderTemplate, ImagePayload, BLANK_FIELD};
use crate::pipeline::parse::{question_blocks, QuestionBlock};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use std::io::Write;
use tracing::{debug, info, warn};

// ── Page geometry (mm unless noted) ──────────────────────────────────────

const PAGE_WIDTH_PT: f32 = 595.28;
const PAGE_HEIGHT_PT: f32 = 841.89;
const PT_PER_MM: f32 = 72.0 / 25.4;

const TOP_Y: f32 = 20.0;
const BOTTOM_LIMIT: f32 = 270.0;
const RIGHT_MARGIN: f32 = 20.0;
const PAGE_WIDTH_MM: f32 = 210.0;
const CENTER_X: f32 = PAGE_WIDTH_MM / 2.0;

const BLOCK_GAP: f32 = 12.0;

/// Extra line spacing for wrapped native text, as a multiple of the size.
const WRAP_LEADING: f32 = 1.3;

const FONT_RESOURCE: &[u8] = b"F1";

/// How many runs each strategy drew. Reported after a render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PdfStats {
    pub pages: usize,
    pub native_runs: usize,
    pub raster_runs: usize,
    pub placeholder_runs: usize,
}

/// Render the header and the questions in `formatted_text` as a PDF.
pub fn render_pdf(
    formatted_text: &str,
    header: &HeaderConfig,
    fonts: &FontStack,
) -> Result<(Vec<u8>, PdfStats), ExamQuizError> {
    let mut canvas = Canvas::new(fonts);

    match header {
        HeaderConfig::Upload { image } => canvas.upload_header(image),
        HeaderConfig::Custom(template) => canvas.custom_header(template),
        HeaderConfig::Premade { template } => {
            debug!("Premade header '{}'", template);
            canvas.premade_header();
        }
    }

    let blocks = question_blocks(formatted_text);
    for block in &blocks {
        canvas.question_block(block);
    }

    let stats = canvas.stats();
    let bytes = canvas.finish()?;
    info!(
        "PDF: {} question(s) on {} page(s); runs native={} raster={} placeholder={}",
        blocks.len(),
        stats.pages,
        stats.native_runs,
        stats.raster_runs,
        stats.placeholder_runs
    );
    Ok((bytes, stats))
}

// ── Run presets ──────────────────────────────────────────────────────────

fn run(text: impl Into<String>, x: f32, pt: f32, advance: f32) -> TextRun {
    TextRun {
        text: text.into(),
        align: Align::Left,
        x,
        second_column: None,
        native_pt: pt,
        wrap_width: None,
        native_advance: advance,
        raster_x: x,
        raster_width: PAGE_WIDTH_MM - RIGHT_MARGIN - x,
        raster_px: pt,
        raster_offset: 0.0,
        raster_gap: 2.0,
        placeholder: "[Content could not be rendered]",
        placeholder_pt: pt,
        placeholder_advance: advance,
    }
}

fn question_run(line: &str) -> TextRun {
    if contains_devanagari(line) {
        TextRun {
            raster_x: 15.0,
            raster_width: 170.0,
            raster_px: 14.0,
            placeholder: "[Hindi content could not be displayed]",
            placeholder_pt: 14.0,
            placeholder_advance: 16.0,
            ..run(line, 20.0, 12.0, 12.0)
        }
    } else {
        TextRun {
            wrap_width: Some(PAGE_WIDTH_MM - RIGHT_MARGIN - 20.0),
            raster_x: 15.0,
            raster_width: 170.0,
            ..run(line, 20.0, 12.0, 12.0)
        }
    }
}

fn options_run(joined: &str) -> TextRun {
    if contains_devanagari(joined) {
        TextRun {
            raster_width: 160.0,
            raster_px: 12.0,
            raster_gap: 3.0,
            placeholder: "[Hindi options could not be displayed]",
            placeholder_pt: 12.0,
            placeholder_advance: 12.0,
            ..run(joined, 25.0, 10.0, 10.0)
        }
    } else {
        TextRun {
            wrap_width: Some(PAGE_WIDTH_MM - RIGHT_MARGIN - 25.0),
            raster_width: 160.0,
            placeholder: "[Options could not be rendered]",
            ..run(joined, 25.0, 10.0, 10.0)
        }
    }
}

fn trailing_run(line: &str) -> TextRun {
    if contains_devanagari(line) {
        TextRun {
            raster_width: 160.0,
            raster_px: 11.0,
            placeholder: "[Hindi content]",
            placeholder_pt: 11.0,
            placeholder_advance: 11.0,
            ..run(line, 25.0, 10.0, 8.0)
        }
    } else {
        TextRun {
            wrap_width: Some(PAGE_WIDTH_MM - RIGHT_MARGIN - 25.0),
            raster_width: 160.0,
            placeholder: "[Content]",
            ..run(line, 25.0, 10.0, 8.0)
        }
    }
}

fn centered_run(text: &str, pt: f32) -> TextRun {
    TextRun {
        align: Align::Center,
        raster_x: 50.0,
        raster_width: 100.0,
        raster_offset: -5.0,
        ..run(text, CENTER_X, pt, 0.0)
    }
}

fn field_row(left: String, right: String) -> TextRun {
    TextRun {
        second_column: Some((120.0, right.clone())),
        raster_x: 15.0,
        raster_width: 170.0,
        raster_offset: -5.0,
        ..run(format!("{left}        {right}"), 20.0, 10.0, 0.0)
    }
}

fn value_or_blank(value: &str) -> String {
    let v = value.trim();
    if v.is_empty() {
        BLANK_FIELD.to_string()
    } else {
        v.to_string()
    }
}

// ── Canvas ───────────────────────────────────────────────────────────────

struct EmbeddedImage {
    width: u32,
    height: u32,
    /// Zlib-compressed RGB samples.
    data: Vec<u8>,
}

struct Canvas<'f> {
    fonts: &'f FontStack,
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    images: Vec<EmbeddedImage>,
    y: f32,
    stats: PdfStats,
}

impl<'f> Canvas<'f> {
    fn new(fonts: &'f FontStack) -> Self {
        Self {
            fonts,
            pages: Vec::new(),
            ops: Vec::new(),
            images: Vec::new(),
            y: TOP_Y,
            stats: PdfStats::default(),
        }
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = TOP_Y;
    }

    fn stats(&self) -> PdfStats {
        PdfStats {
            pages: self.pages.len() + 1,
            ..self.stats
        }
    }

    /// Draw `run` at the cursor; returns the advance the strategy reported.
    fn draw(&mut self, run: &TextRun) -> f32 {
        let (strategy, advance) = draw_with_fallback(self, run);
        match strategy {
            TextStrategy::NativeText => self.stats.native_runs += 1,
            TextStrategy::RasterText => self.stats.raster_runs += 1,
            TextStrategy::Placeholder => {
                warn!("Placeholder drawn for {:?}", run.text);
                self.stats.placeholder_runs += 1;
            }
        }
        advance
    }

    // ── Headers ──

    fn upload_header(&mut self, image: &ImagePayload) {
        match self.place_image_bytes(image, 15.0, 15.0, 180.0, 40.0) {
            Ok(()) => self.y += 50.0,
            Err(e) => {
                warn!("Header image could not be embedded: {}", e);
                self.draw(&centered_run("School Header Image", 16.0));
                self.y += 20.0;
            }
        }
    }

    fn custom_header(&mut self, template: &HeaderTemplate) {
        if let Some(logo) = &template.logo {
            match self.place_image_bytes(logo, 15.0, 15.0, 25.0, 25.0) {
                Ok(()) => self.y = self.y.max(45.0),
                Err(e) => warn!("Logo could not be embedded: {}", e),
            }
        }

        self.draw(&centered_run(template.school_name_or_default(), 16.0));
        self.y += 15.0;

        if let Some(title) = template.exam_title() {
            self.draw(&centered_run(title, 12.0));
            self.y += 12.0;
        }

        self.draw(&field_row(
            format!("Class: {}", value_or_blank(&template.class)),
            format!("Subject: {}", value_or_blank(&template.subject)),
        ));
        self.y += 12.0;

        self.draw(&field_row(
            format!("Date: {}", value_or_blank(&template.date)),
            format!("Marks: {}", value_or_blank(&template.marks)),
        ));
        self.y += 12.0;

        if let Some(time) = template.time() {
            let run = TextRun {
                raster_x: 115.0,
                raster_width: 80.0,
                raster_offset: -5.0,
                ..run(format!("Time: {time}"), 120.0, 10.0, 0.0)
            };
            self.draw(&run);
            self.y += 12.0;
        }

        self.y += 10.0;
    }

    fn premade_header(&mut self) {
        self.draw(&centered_run("School Name", 16.0));
        self.y += 15.0;
        self.draw(&field_row(format!("Class: {BLANK_FIELD}"), format!("Subject: {BLANK_FIELD}")));
        self.y += 12.0;
        self.draw(&field_row(format!("Date: {BLANK_FIELD}"), format!("Marks: {BLANK_FIELD}")));
        self.y += 12.0;
        self.draw(&centered_run("Practice Worksheet", 12.0));
        self.y += 20.0;
    }

    // ── Questions ──

    fn question_block(&mut self, block: &QuestionBlock) {
        let devanagari = contains_devanagari(&block.question_line)
            || block.trailing_lines.iter().any(|l| contains_devanagari(l));
        let (head, per_line) = if devanagari { (20.0, 8.0) } else { (12.0, 6.0) };
        let estimate = head + block.trailing_lines.len() as f32 * per_line + 15.0;
        if self.y + estimate > BOTTOM_LIMIT {
            self.new_page();
        }

        let advance = self.draw(&question_run(&block.question_line));
        self.y += advance;

        for line in block.continuation_lines() {
            let advance = self.draw(&trailing_run(line));
            self.y += advance;
        }

        let options = block.option_lines();
        if !options.is_empty() {
            let joined = options.join("  ");
            let advance = self.draw(&options_run(&joined));
            self.y += advance;
        }

        self.y += BLOCK_GAP;
    }

    // ── Primitives ──

    fn push_text(&mut self, x_mm: f32, baseline_mm: f32, pt: f32, encoded: Vec<u8>) {
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(FONT_RESOURCE.to_vec()), pt.into()],
        ));
        self.ops.push(Operation::new(
            "Td",
            vec![mm(x_mm).into(), (PAGE_HEIGHT_PT - mm(baseline_mm)).into()],
        ));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(encoded, StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
    }

    fn anchor_x(align: Align, x: f32, text: &str, pt: f32) -> f32 {
        match align {
            Align::Left => x,
            Align::Center => x - text_width_mm(text, pt) / 2.0,
        }
    }

    fn embed(&mut self, img: &RgbImage) -> Result<usize, RenderError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(img.as_raw())
            .map_err(|e| RenderError::Image(e.to_string()))?;
        let data = encoder.finish().map_err(|e| RenderError::Image(e.to_string()))?;
        self.images.push(EmbeddedImage {
            width: img.width(),
            height: img.height(),
            data,
        });
        Ok(self.images.len() - 1)
    }

    /// Place image `index` with its top-left corner at (`x`, `top`).
    fn place_image(&mut self, index: usize, x: f32, top: f32, width: f32, height: f32) {
        let bottom_pt = PAGE_HEIGHT_PT - mm(top + height);
        self.ops.push(Operation::new("q", vec![]));
        self.ops.push(Operation::new(
            "cm",
            vec![
                mm(width).into(),
                Object::Integer(0),
                Object::Integer(0),
                mm(height).into(),
                mm(x).into(),
                bottom_pt.into(),
            ],
        ));
        self.ops.push(Operation::new(
            "Do",
            vec![Object::Name(image_name(index).into_bytes())],
        ));
        self.ops.push(Operation::new("Q", vec![]));
    }

    fn place_image_bytes(
        &mut self,
        payload: &ImagePayload,
        x: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> Result<(), RenderError> {
        let decoded = image::load_from_memory(&payload.bytes).map_err(|e| RenderError::Image(e.to_string()))?;
        let index = self.embed(&flatten_onto_white(&decoded))?;
        self.place_image(index, x, top, width, height);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, ExamQuizError> {
        self.pages.push(std::mem::take(&mut self.ops));

        let export_err = |detail: String| ExamQuizError::ExportFailed {
            format: "pdf".into(),
            detail,
        };

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut xobjects = Dictionary::new();
        for (index, img) in self.images.into_iter().enumerate() {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => img.width as i64,
                    "Height" => img.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                    "Filter" => "FlateDecode",
                },
                img.data,
            );
            xobjects.set(image_name(index), doc.add_object(stream));
        }

        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations }
                .encode()
                .map_err(|e| export_err(format!("encoding page content: {e}")))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    PAGE_WIDTH_PT.into(),
                    PAGE_HEIGHT_PT.into(),
                ],
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| export_err(format!("writing document: {e}")))?;
        Ok(bytes)
    }
}

impl TextSurface for Canvas<'_> {
    fn draw_native(&mut self, run: &TextRun) -> Result<f32, RenderError> {
        // Encode everything before drawing so a failure leaves the page untouched.
        if let Some((right_x, right)) = &run.second_column {
            let left = run
                .text
                .strip_suffix(right.as_str())
                .map(str::trim_end)
                .unwrap_or(run.text.as_str());
            let left_bytes = encode_win_ansi(left)?;
            let right_bytes = encode_win_ansi(right)?;
            self.push_text(run.x, self.y, run.native_pt, left_bytes);
            self.push_text(*right_x, self.y, run.native_pt, right_bytes);
            return Ok(run.native_advance);
        }

        let lines = match run.wrap_width {
            Some(width) => super::raster::wrap_lines(&run.text, width, |s| text_width_mm(s, run.native_pt)),
            None => vec![run.text.clone()],
        };
        let encoded: Vec<Vec<u8>> = lines
            .iter()
            .map(|line| encode_win_ansi(line))
            .collect::<Result<_, _>>()?;

        let step = run.native_pt * WRAP_LEADING / PT_PER_MM;
        for (i, (line, bytes)) in lines.iter().zip(encoded).enumerate() {
            let x = Self::anchor_x(run.align, run.x, line, run.native_pt);
            self.push_text(x, self.y + i as f32 * step, run.native_pt, bytes);
        }
        Ok(run.native_advance + lines.len().saturating_sub(1) as f32 * step)
    }

    fn draw_raster(&mut self, run: &TextRun) -> Result<f32, RenderError> {
        let img = self.fonts.render(&run.text, run.raster_px)?;
        let height = run.raster_width * img.height() as f32 / img.width().max(1) as f32;
        let index = self.embed(&img)?;
        self.place_image(index, run.raster_x, self.y + run.raster_offset, run.raster_width, height);
        Ok(height + run.raster_gap)
    }

    fn draw_placeholder(&mut self, run: &TextRun) -> f32 {
        let x = Self::anchor_x(run.align, run.x, run.placeholder, run.placeholder_pt);
        self.push_text(x, self.y, run.placeholder_pt, encode_win_ansi_lossy(run.placeholder));
        run.placeholder_advance
    }
}

fn image_name(index: usize) -> String {
    format!("Im{index}")
}

fn mm(v: f32) -> f32 {
    v * PT_PER_MM
}

fn flatten_onto_white(img: &image::DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

// ── WinAnsi text ─────────────────────────────────────────────────────────

/// Encode `text` for the built-in Helvetica font.
pub fn encode_win_ansi(text: &str) -> Result<Vec<u8>, RenderError> {
    text.chars().map(win_ansi_byte).collect()
}

fn encode_win_ansi_lossy(text: &str) -> Vec<u8> {
    text.chars().map(|c| win_ansi_byte(c).unwrap_or(b'?')).collect()
}

fn win_ansi_byte(c: char) -> Result<u8, RenderError> {
    let byte = match c {
        '\t' => b' ',
        ' '..='~' => c as u8,
        '\u{A0}'..='\u{FF}' => c as u32 as u8,
        '€' => 0x80,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        _ => return Err(RenderError::Unencodable(c)),
    };
    Ok(byte)
}

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const DEFAULT_GLYPH_WIDTH: u16 = 556;

/// Width of `text` set in Helvetica at `pt`, in millimetres.
pub fn text_width_mm(text: &str, pt: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' '..='~' => HELVETICA_WIDTHS[c as usize - 32] as u32,
            _ => DEFAULT_GLYPH_WIDTH as u32,
        })
        .sum();
    units as f32 / 1000.0 * pt / PT_PER_MM
}
