//! Image encoding: `DynamicImage` → PNG bytes, page image → data URI.
//!
//! Chat-completion APIs accept images as `data:` URIs inside the JSON body.
//! PNG is used for everything we rasterise ourselves because it is lossless:
//! handwriting strokes and Devanagari matras suffer badly under JPEG
//! artefacts. Pass-through uploads keep their own format and MIME type.

use crate::pipeline::render::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode an image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// `data:<mime>;base64,<payload>` for a page image.
pub fn to_data_uri(page: &PageImage) -> String {
    let b64 = STANDARD.encode(&page.data);
    debug!(
        "Encoded page {} → {} bytes base64",
        page.page_index + 1,
        b64.len()
    );
    format!("data:{};base64,{}", page.mime, b64)
}
