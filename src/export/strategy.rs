//! Script-aware text drawing with an ordered fallback chain.
//!
//! Every run of text on a PDF page goes through the same chain:
//!
//! ```text
//! NativeText ──fail──▶ RasterText ──fail──▶ Placeholder (always succeeds)
//! ```
//!
//! Runs containing Devanagari skip `NativeText`: the built-in PDF font has no
//! Devanagari glyphs, so trying it first would only ever fail.

use crate::error::RenderError;
use tracing::{debug, warn};

/// Whether `text` contains any Devanagari code point (U+0900–U+097F).
pub fn contains_devanagari(text: &str) -> bool {
    text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c))
}

/// One way of putting text on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStrategy {
    /// Vector text in the built-in font.
    NativeText,
    /// Text drawn into a bitmap and embedded as an image.
    RasterText,
    /// A fixed bracketed message in place of the content.
    Placeholder,
}

const LATIN_CHAIN: &[TextStrategy] = &[
    TextStrategy::NativeText,
    TextStrategy::RasterText,
    TextStrategy::Placeholder,
];

const DEVANAGARI_CHAIN: &[TextStrategy] = &[TextStrategy::RasterText, TextStrategy::Placeholder];

/// Strategies to try for `text`, in order.
pub fn chain_for(text: &str) -> &'static [TextStrategy] {
    if contains_devanagari(text) {
        DEVANAGARI_CHAIN
    } else {
        LATIN_CHAIN
    }
}

/// Horizontal anchoring of a native run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    /// `x` is the centre of the run.
    Center,
}

/// A run of text plus how each strategy should place it. All lengths are
/// millimetres on the page; `y` advances are returned by the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub align: Align,
    /// Native anchor and size.
    pub x: f32,
    /// A second native column on the same baseline; the raster form joins
    /// both columns with spaces in `text`.
    pub second_column: Option<(f32, String)>,
    pub native_pt: f32,
    /// Wrap native text at this width; `None` keeps it on one line.
    pub wrap_width: Option<f32>,
    /// Cursor advance after a single native line.
    pub native_advance: f32,
    /// Raster box and font size (logical px).
    pub raster_x: f32,
    pub raster_width: f32,
    pub raster_px: f32,
    /// Offset of the raster image top from the cursor (negative = above).
    pub raster_offset: f32,
    /// Extra advance after the raster image.
    pub raster_gap: f32,
    /// Fixed message when nothing else works.
    pub placeholder: &'static str,
    pub placeholder_pt: f32,
    pub placeholder_advance: f32,
}

/// A drawing target that can attempt each strategy.
pub trait TextSurface {
    /// Draw vector text; returns the cursor advance.
    fn draw_native(&mut self, run: &TextRun) -> Result<f32, RenderError>;

    /// Draw rasterised text; returns the cursor advance.
    fn draw_raster(&mut self, run: &TextRun) -> Result<f32, RenderError>;

    /// Draw the placeholder message; returns the cursor advance.
    fn draw_placeholder(&mut self, run: &TextRun) -> f32;
}

/// Walk the chain for `run`, returning the strategy that succeeded and the
/// cursor advance it produced.
pub fn draw_with_fallback<S: TextSurface + ?Sized>(surface: &mut S, run: &TextRun) -> (TextStrategy, f32) {
    for &strategy in chain_for(&run.text) {
        let attempt = match strategy {
            TextStrategy::NativeText => surface.draw_native(run),
            TextStrategy::RasterText => surface.draw_raster(run),
            TextStrategy::Placeholder => Ok(surface.draw_placeholder(run)),
        };
        match attempt {
            Ok(advance) => return (strategy, advance),
            Err(e) => debug!("{:?} failed for {:?}: {}", strategy, run.text, e),
        }
    }
    // Unreachable in practice: Placeholder always succeeds.
    warn!("No strategy rendered {:?}", run.text);
    (TextStrategy::Placeholder, run.placeholder_advance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct ScriptedSurface {
        native_ok: bool,
        raster_ok: bool,
        tried: Vec<TextStrategy>,
    }

    impl TextSurface for ScriptedSurface {
        fn draw_native(&mut self, _run: &TextRun) -> Result<f32, RenderError> {
            self.tried.push(TextStrategy::NativeText);
            if self.native_ok {
                Ok(1.0)
            } else {
                Err(RenderError::Unencodable('ä'))
            }
        }

        fn draw_raster(&mut self, _run: &TextRun) -> Result<f32, RenderError> {
            self.tried.push(TextStrategy::RasterText);
            if self.raster_ok {
                Ok(2.0)
            } else {
                Err(RenderError::NoFont)
            }
        }

        fn draw_placeholder(&mut self, _run: &TextRun) -> f32 {
            self.tried.push(TextStrategy::Placeholder);
            3.0
        }
    }

    fn run(text: &str) -> TextRun {
        TextRun {
            text: text.into(),
            align: Align::Left,
            x: 20.0,
            second_column: None,
            native_pt: 12.0,
            wrap_width: None,
            native_advance: 12.0,
            raster_x: 15.0,
            raster_width: 170.0,
            raster_px: 14.0,
            raster_offset: 0.0,
            raster_gap: 2.0,
            placeholder: "[Content could not be rendered]",
            placeholder_pt: 12.0,
            placeholder_advance: 12.0,
        }
    }

    #[test]
    fn devanagari_detection() {
        assert!(contains_devanagari("Q.1 भारत"));
        assert!(contains_devanagari("\u{0900}"));
        assert!(contains_devanagari("\u{097F}"));
        assert!(!contains_devanagari("Q.1 Paris"));
        assert!(!contains_devanagari("\u{0980}")); // Bengali
    }

    #[test]
    fn latin_uses_native_first() {
        let mut s = ScriptedSurface {
            native_ok: true,
            ..Default::default()
        };
        assert_eq!(draw_with_fallback(&mut s, &run("Hello")), (TextStrategy::NativeText, 1.0));
        assert_eq!(s.tried, vec![TextStrategy::NativeText]);
    }

    #[test]
    fn native_failure_falls_back_to_raster() {
        let mut s = ScriptedSurface {
            raster_ok: true,
            ..Default::default()
        };
        assert_eq!(draw_with_fallback(&mut s, &run("Grüße")), (TextStrategy::RasterText, 2.0));
        assert_eq!(s.tried, vec![TextStrategy::NativeText, TextStrategy::RasterText]);
    }

    #[test]
    fn devanagari_skips_native() {
        let mut s = ScriptedSurface {
            native_ok: true,
            raster_ok: true,
            ..Default::default()
        };
        let (strategy, _) = draw_with_fallback(&mut s, &run("Q.1 भारत की राजधानी"));
        assert_eq!(strategy, TextStrategy::RasterText);
        assert_eq!(s.tried, vec![TextStrategy::RasterText]);
    }

    #[test]
    fn everything_failing_yields_placeholder() {
        let mut s = ScriptedSurface::default();
        assert_eq!(draw_with_fallback(&mut s, &run("नमस्ते")), (TextStrategy::Placeholder, 3.0));
        assert_eq!(s.tried, vec![TextStrategy::RasterText, TextStrategy::Placeholder]);
    }
}
