//! Pipeline stages for turning notes into questions.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ fallback(OCR) ──▶ postprocess ──▶ fallback(format) ──▶ postprocess ──▶ parse
//! (upload)  (pdfium)  (data URI)   (gateway)         (cleanup)        (gateway)           (cleanup)     (questions)
//! ```
//!
//! 1. [`input`]    — read the upload and identify it by magic bytes
//! 2. [`render`]   — rasterise PDF pages at 2x in `spawn_blocking`; images pass through
//! 3. [`encode`]   — PNG-encode and wrap page images as `data:` URIs
//! 4. [`gateway`]  — one chat-completion request per call; the only network I/O
//! 5. [`fallback`] — walk a role's model list until one model answers
//! 6. [`postprocess`] — deterministic cleanup of model quirks (fences, bold markers)
//! 7. [`parse`]    — line state machine from formatted text to typed questions

pub mod encode;
pub mod fallback;
pub mod gateway;
pub mod input;
pub mod parse;
pub mod postprocess;
pub mod render;
