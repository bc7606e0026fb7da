//! Document rasterisation: turn an upload into ordered page images.
//!
//! PDFs are rendered page by page through pdfium at a fixed scale factor
//! (2x the page's point size by default) and PNG-encoded. Raster uploads are
//! passed through untouched as a single page.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! runtime's worker threads never stall during CPU-heavy rendering.
//!
//! ## Binding pdfium
//!
//! The library is located in this order: an explicit path from the config,
//! `PDFIUM_LIB_PATH`, then the platform's library search path. A path may name
//! the shared library itself or the directory containing it.

use crate::config::PipelineConfig;
use crate::error::ExamQuizError;
use crate::pipeline::encode::encode_png;
use crate::pipeline::input::Upload;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One rasterised page, ready to send to an OCR model.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 0-based position in the source document.
    pub page_index: usize,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Encoded image bytes (PNG for rendered pages, original bytes for
    /// pass-through uploads).
    pub data: Vec<u8>,
    pub mime: String,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_index", &self.page_index)
            .field("pixel_width", &self.pixel_width)
            .field("pixel_height", &self.pixel_height)
            .field("data", &self.data.len())
            .field("mime", &self.mime)
            .finish()
    }
}

/// Rasterise an upload into page images in page order.
pub async fn to_page_images(
    upload: &Upload,
    config: &PipelineConfig,
) -> Result<Vec<PageImage>, ExamQuizError> {
    if !upload.kind.is_pdf() {
        return passthrough_image(upload).map(|page| vec![page]);
    }

    let bytes = upload.bytes.clone();
    let path = upload.path.clone();
    let scale = config.scale;
    let max_pages = config.max_pages;
    let library = pdfium_library_path(config);

    tokio::task::spawn_blocking(move || {
        render_pdf_blocking(&bytes, &path, scale, max_pages, library.as_deref())
    })
    .await
    .map_err(|e| ExamQuizError::Internal(format!("Render task panicked: {}", e)))?
}

/// Count pages without rendering them. Raster uploads count as one page.
pub async fn page_count(upload: &Upload, config: &PipelineConfig) -> Result<usize, ExamQuizError> {
    if !upload.kind.is_pdf() {
        return Ok(1);
    }
    let bytes = upload.bytes.clone();
    let path = upload.path.clone();
    let library = pdfium_library_path(config);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(library.as_deref())?;
        let document = load_document(&pdfium, &bytes, &path)?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| ExamQuizError::Internal(format!("Page-count task panicked: {}", e)))?
}

fn passthrough_image(upload: &Upload) -> Result<PageImage, ExamQuizError> {
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(&upload.bytes))
        .with_guessed_format()
        .map_err(|e| ExamQuizError::DocumentParse {
            path: upload.path.clone(),
            detail: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| ExamQuizError::DocumentParse {
            path: upload.path.clone(),
            detail: e.to_string(),
        })?;

    debug!("Passing {} image through ({}x{} px)", upload.kind, width, height);
    Ok(PageImage {
        page_index: 0,
        pixel_width: width,
        pixel_height: height,
        data: upload.bytes.clone(),
        mime: upload.kind.mime().to_string(),
    })
}

fn pdfium_library_path(config: &PipelineConfig) -> Option<PathBuf> {
    config.pdfium_library_path.clone().or_else(|| {
        std::env::var_os("PDFIUM_LIB_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, ExamQuizError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ExamQuizError::RenderSurfaceUnavailable(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    path: &Path,
) -> Result<PdfDocument<'a>, ExamQuizError> {
    pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        let detail = if err_str.contains("Password") || err_str.contains("password") {
            String::from("document is encrypted")
        } else {
            err_str
        };
        ExamQuizError::DocumentParse {
            path: path.to_path_buf(),
            detail,
        }
    })
}

/// Blocking implementation of page rendering.
fn render_pdf_blocking(
    bytes: &[u8],
    path: &Path,
    scale: f32,
    max_pages: usize,
    library: Option<&Path>,
) -> Result<Vec<PageImage>, ExamQuizError> {
    let pdfium = bind_pdfium(library)?;
    let document = load_document(&pdfium, bytes, path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    if total_pages == 0 {
        return Err(ExamQuizError::DocumentParse {
            path: path.to_path_buf(),
            detail: "document has no pages".into(),
        });
    }
    if total_pages > max_pages {
        return Err(ExamQuizError::TooManyPages {
            pages: total_pages,
            limit: max_pages,
        });
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExamQuizError::RenderSurfaceUnavailable(format!("page {}: {:?}", idx + 1, e))
        })?;

        let image = bitmap.as_image();
        let data = encode_png(&image)
            .map_err(|e| ExamQuizError::Internal(format!("PNG encoding failed: {e}")))?;
        debug!(
            "Rendered page {} → {}x{} px ({} bytes PNG)",
            idx + 1,
            image.width(),
            image.height(),
            data.len()
        );

        results.push(PageImage {
            page_index: idx,
            pixel_width: image.width(),
            pixel_height: image.height(),
            data,
            mime: String::from("image/png"),
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::DocumentKind;
    use image::{DynamicImage, Rgb, RgbImage};

    #[tokio::test]
    async fn raster_upload_passes_through_unchanged() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([200, 200, 200])));
        let png = encode_png(&img).unwrap();
        let upload = Upload::from_bytes("scan.png", png.clone(), 1 << 20).unwrap();
        assert_eq!(upload.kind, DocumentKind::Png);

        let pages = to_page_images(&upload, &PipelineConfig::default()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_index, 0);
        assert_eq!((pages[0].pixel_width, pages[0].pixel_height), (30, 20));
        assert_eq!(pages[0].data, png);
        assert_eq!(pages[0].mime, "image/png");
    }

    #[tokio::test]
    async fn truncated_image_is_a_parse_error() {
        let upload = Upload::from_bytes("bad.png", vec![0x89, b'P', b'N', b'G'], 1 << 20).unwrap();
        let err = to_page_images(&upload, &PipelineConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExamQuizError::DocumentParse { .. }));
    }

    #[tokio::test]
    async fn raster_upload_counts_as_one_page() {
        let upload = Upload::from_bytes("x.gif", b"GIF89a....".to_vec(), 1 << 20).unwrap();
        assert_eq!(page_count(&upload, &PipelineConfig::default()).await.unwrap(), 1);
    }

    #[test]
    fn missing_library_is_surface_unavailable() {
        let err = bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))).unwrap_err();
        assert!(matches!(err, ExamQuizError::RenderSurfaceUnavailable(_)));
    }
}
