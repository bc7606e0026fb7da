//! Input resolution: read a user upload and work out what it is.
//!
//! ## Why sniff magic bytes?
//!
//! Uploads arrive with arbitrary names (`scan.jpg` that is really a PNG, a PDF
//! saved without an extension). The leading bytes are the only reliable
//! signal, and checking them up front turns "pdfium refused the file" into a
//! clear `UnsupportedInput` error before any model is called.

use crate::error::ExamQuizError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What an upload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
}

impl DocumentKind {
    /// MIME type used when the bytes are sent to a model unchanged.
    pub fn mime(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Webp => "image/webp",
            DocumentKind::Gif => "image/gif",
            DocumentKind::Bmp => "image/bmp",
        }
    }

    pub fn is_pdf(self) -> bool {
        self == DocumentKind::Pdf
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Png => "PNG",
            DocumentKind::Jpeg => "JPEG",
            DocumentKind::Webp => "WebP",
            DocumentKind::Gif => "GIF",
            DocumentKind::Bmp => "BMP",
        })
    }
}

/// Identify an upload from its leading bytes.
pub fn detect_kind(bytes: &[u8]) -> Option<DocumentKind> {
    if bytes.starts_with(b"%PDF") {
        Some(DocumentKind::Pdf)
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some(DocumentKind::Png)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(DocumentKind::Jpeg)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(DocumentKind::Webp)
    } else if bytes.starts_with(b"GIF8") {
        Some(DocumentKind::Gif)
    } else if bytes.starts_with(b"BM") {
        Some(DocumentKind::Bmp)
    } else {
        None
    }
}

/// A validated upload held in memory.
#[derive(Clone)]
pub struct Upload {
    /// Where the bytes came from; a synthetic name for in-memory uploads.
    pub path: PathBuf,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    /// Validate bytes that are already in memory.
    pub fn from_bytes(
        name: impl Into<PathBuf>,
        bytes: Vec<u8>,
        max_bytes: u64,
    ) -> Result<Self, ExamQuizError> {
        let path = name.into();
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(ExamQuizError::UploadTooLarge {
                path,
                size,
                limit: max_bytes,
            });
        }
        let kind = detect_kind(&bytes).ok_or_else(|| ExamQuizError::UnsupportedInput {
            path: path.clone(),
            magic: bytes.iter().take(8).copied().collect(),
        })?;
        debug!("Upload {} detected as {} ({} bytes)", path.display(), kind, size);
        Ok(Self { path, kind, bytes })
    }
}

/// Read and validate a local upload.
///
/// The size limit is checked against file metadata before the file is read.
pub async fn read_upload(path: &Path, max_bytes: u64) -> Result<Upload, ExamQuizError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_error(path, e))?;
    if !meta.is_file() {
        return Err(ExamQuizError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if meta.len() > max_bytes {
        return Err(ExamQuizError::UploadTooLarge {
            path: path.to_path_buf(),
            size: meta.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
    Upload::from_bytes(path, bytes, max_bytes)
}

fn io_error(path: &Path, e: std::io::Error) -> ExamQuizError {
    match e.kind() {
        std::io::ErrorKind::NotFound => ExamQuizError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ExamQuizError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ExamQuizError::Internal(format!("reading {}: {e}", path.display())),
    }
}
