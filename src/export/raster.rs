//! Raster text: draw a run of text into an RGB image.
//!
//! The built-in PDF font only covers WinAnsi, so Devanagari (and any other
//! script it cannot encode) is drawn into a bitmap here and embedded as an
//! image instead. Fonts are tried in priority order; the first one that has
//! a glyph for every visible character wins.
//!
//! ## Canvas geometry
//!
//! Text wraps at 700 logical px inside an 800 px canvas with 20 px padding
//! and a 1.4 line-height factor, on a white background. The canvas is drawn
//! at [`PIXEL_DENSITY`]x so the embedded image stays sharp when printed.

use crate::error::RenderError;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

const BACKGROUND_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Width available to text before wrapping, in logical px.
pub const WRAP_WIDTH: f32 = 700.0;

/// Full canvas width in logical px.
pub const CANVAS_WIDTH: f32 = WRAP_WIDTH + 100.0;

const PADDING: f32 = 20.0;

const LINE_HEIGHT_FACTOR: f32 = 1.4;

const MIN_CANVAS_HEIGHT: f32 = 50.0;

/// Device pixels per logical px.
pub const PIXEL_DENSITY: f32 = 3.0;

/// System font files tried after any configured fonts, in priority order:
/// Noto Sans Devanagari, Mangal, Aparajita, Kokila, Utsaah, Arial Unicode MS,
/// Lucida Sans Unicode, Arial, then general-purpose fallbacks.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansDevanagari-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSansDevanagari-Regular.ttf",
    "/Library/Fonts/NotoSansDevanagari-Regular.ttf",
    "C:\\Windows\\Fonts\\NotoSansDevanagari-Regular.ttf",
    "C:\\Windows\\Fonts\\mangal.ttf",
    "C:\\Windows\\Fonts\\aparaj.ttf",
    "C:\\Windows\\Fonts\\kokila.ttf",
    "C:\\Windows\\Fonts\\utsaah.ttf",
    "/usr/share/fonts/truetype/lohit-devanagari/Lohit-Devanagari.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\ARIALUNI.TTF",
    "C:\\Windows\\Fonts\\l_10646.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

struct LoadedFont {
    path: PathBuf,
    font: FontVec,
}

/// Prioritised font fallback stack, loaded on first use.
pub struct FontStack {
    candidates: Vec<PathBuf>,
    loaded: OnceCell<Vec<LoadedFont>>,
}

impl std::fmt::Debug for FontStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontStack")
            .field("candidates", &self.candidates.len())
            .field("loaded", &self.loaded.get().map(Vec::len))
            .finish()
    }
}

impl FontStack {
    /// `extra` fonts are tried before the system list.
    pub fn new(extra: &[PathBuf]) -> Self {
        let candidates = extra
            .iter()
            .cloned()
            .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
            .collect();
        Self {
            candidates,
            loaded: OnceCell::new(),
        }
    }

    /// Only the given fonts; no system fallbacks.
    pub fn only(paths: &[PathBuf]) -> Self {
        Self {
            candidates: paths.to_vec(),
            loaded: OnceCell::new(),
        }
    }

    fn fonts(&self) -> &[LoadedFont] {
        self.loaded.get_or_init(|| {
            let fonts: Vec<LoadedFont> = self
                .candidates
                .iter()
                .filter_map(|path| load_font(path).map(|font| LoadedFont {
                    path: path.clone(),
                    font,
                }))
                .collect();
            info!("Raster text: {} font(s) available", fonts.len());
            fonts
        })
    }

    /// The best font for `text`: the first with full coverage, else the one
    /// covering the most characters.
    fn select(&self, text: &str) -> Option<&FontVec> {
        let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut best: Option<(&LoadedFont, usize)> = None;

        for candidate in self.fonts() {
            let covered = visible
                .iter()
                .filter(|&&c| candidate.font.glyph_id(c).0 != 0)
                .count();
            if covered == visible.len() {
                debug!("Raster text font: {}", candidate.path.display());
                return Some(&candidate.font);
            }
            if covered > 0 && best.is_none_or(|(_, n)| covered > n) {
                best = Some((candidate, covered));
            }
        }

        best.map(|(candidate, covered)| {
            debug!(
                "Raster text font: {} (partial coverage {}/{})",
                candidate.path.display(),
                covered,
                visible.len()
            );
            &candidate.font
        })
    }

    /// Draw `text` at `font_px` logical pixels.
    pub fn render(&self, text: &str, font_px: f32) -> Result<RgbImage, RenderError> {
        let font = self.select(text).ok_or(RenderError::NoFont)?;
        Ok(draw_wrapped(font, text, font_px))
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let data = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(_) => {
            debug!("Skipping unparseable font: {}", path.display());
            None
        }
    }
}

fn measure_text_width(text: &str, font: &FontVec, scale: f32) -> f32 {
    let scaled_font = font.as_scaled(scale);
    text.chars()
        .map(|ch| scaled_font.h_advance(scaled_font.glyph_id(ch)))
        .sum()
}

/// Greedy word wrap keeping whitespace runs as separate tokens, so a line
/// breaks only between words.
pub fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for token in split_keep_whitespace(text) {
        let candidate = format!("{current}{token}");
        if measure(&candidate) > max_width && !current.trim().is_empty() {
            lines.push(current.trim().to_string());
            current = format!("{} ", token.trim());
        } else {
            current = candidate;
        }
    }
    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }
    lines
}

fn split_keep_whitespace(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            tokens.push(&text[start..i]);
            start = i;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

fn draw_wrapped(font: &FontVec, text: &str, font_px: f32) -> RgbImage {
    let lines = wrap_lines(text, WRAP_WIDTH, |s| measure_text_width(s, font, font_px));
    let line_height = font_px * LINE_HEIGHT_FACTOR;
    let logical_height = (lines.len() as f32 * line_height + PADDING * 2.0).max(MIN_CANVAS_HEIGHT);

    let width = (CANVAS_WIDTH * PIXEL_DENSITY).round() as u32;
    let height = (logical_height * PIXEL_DENSITY).round() as u32;
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND_COLOR);

    let scale = PxScale::from(font_px * PIXEL_DENSITY);
    for (index, line) in lines.iter().enumerate() {
        let x = (PADDING * PIXEL_DENSITY) as i32;
        let y = ((PADDING + index as f32 * line_height) * PIXEL_DENSITY) as i32;
        draw_text_mut(&mut img, TEXT_COLOR, x, y, scale, font, line);
    }
    img
}
