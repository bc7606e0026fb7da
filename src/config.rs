//! Configuration types for question-paper generation.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config across tasks and to log exactly what a run used.
//!
//! # Credentials
//! The API key is never compiled in. It comes from
//! [`PipelineConfigBuilder::api_key`] or, failing that, from the
//! `OPENROUTER_API_KEY` / `EXAMQUIZ_API_KEY` environment variables at call
//! time. `Debug` output redacts it.

use crate::error::ExamQuizError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default OpenAI-compatible chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["OPENROUTER_API_KEY", "EXAMQUIZ_API_KEY"];

/// Default OCR models, highest priority first.
pub const DEFAULT_OCR_MODELS: [&str; 3] = [
    "mistralai/mistral-small-3.2-24b-instruct:free",
    "gemini/gemini-2.0-flash-exp:free",
    "qwen/qwen2.5-vl-72b-instruct:free",
];

/// Default formatting models, highest priority first.
pub const DEFAULT_FORMATTING_MODELS: [&str; 4] = [
    "openai/gpt-4o-mini",
    "google/gemini-pro",
    "deepseek/deepseek-chat",
    "qwen/qwen2-72b-instruct",
];

// ── Models ───────────────────────────────────────────────────────────────

/// What a model is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelRole {
    /// Read text off page images.
    Ocr,
    /// Rewrite raw text into numbered questions.
    Formatting,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Ocr => f.write_str("OCR"),
            ModelRole::Formatting => f.write_str("formatting"),
        }
    }
}

/// One hosted model and the role it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub identifier: String,
    pub role: ModelRole,
}

impl ModelDescriptor {
    pub fn new(identifier: impl Into<String>, role: ModelRole) -> Self {
        Self {
            identifier: identifier.into(),
            role,
        }
    }
}

/// Priority-ordered model lists, one per role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoster {
    ocr: Vec<ModelDescriptor>,
    formatting: Vec<ModelDescriptor>,
}

impl Default for ModelRoster {
    fn default() -> Self {
        Self {
            ocr: DEFAULT_OCR_MODELS
                .iter()
                .map(|id| ModelDescriptor::new(*id, ModelRole::Ocr))
                .collect(),
            formatting: DEFAULT_FORMATTING_MODELS
                .iter()
                .map(|id| ModelDescriptor::new(*id, ModelRole::Formatting))
                .collect(),
        }
    }
}

impl ModelRoster {
    /// The ordered list for `role`.
    pub fn models(&self, role: ModelRole) -> &[ModelDescriptor] {
        match role {
            ModelRole::Ocr => &self.ocr,
            ModelRole::Formatting => &self.formatting,
        }
    }

    /// Replace the list for `role`, preserving the given order.
    pub fn set_models<I, S>(&mut self, role: ModelRole, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<ModelDescriptor> = ids
            .into_iter()
            .map(|id| ModelDescriptor::new(id, role))
            .collect();
        match role {
            ModelRole::Ocr => self.ocr = list,
            ModelRole::Formatting => self.formatting = list,
        }
    }
}

// ── Pipeline configuration ───────────────────────────────────────────────

/// Configuration for a question-paper run.
///
/// # Example
/// ```rust
/// use examquiz::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .ocr_models(["qwen/qwen2.5-vl-72b-instruct:free"])
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.scale, 2.0);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Chat-completions URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Bearer token. When `None` the environment is consulted per call.
    pub api_key: Option<String>,

    /// Ordered models per role.
    pub roster: ModelRoster,

    /// Position in the OCR list to start from. Default: 0.
    pub ocr_start_index: usize,

    /// Position in the formatting list to start from. Default: 0.
    pub formatting_start_index: usize,

    /// PDF render scale relative to the page's point size. Range: 0.5–4.0. Default: 2.0.
    ///
    /// At 2x an A4 page becomes roughly 1190 × 1684 px, which keeps handwriting
    /// legible to vision models without producing oversized uploads.
    pub scale: f32,

    /// Per-model-call timeout in seconds. Default: 60.
    ///
    /// A model that has not answered by then counts as failed and the next
    /// model in the list is tried.
    pub api_timeout_secs: u64,

    /// Largest accepted upload in bytes. Default: 25 MiB.
    pub max_upload_bytes: u64,

    /// Largest accepted PDF page count. Default: 50.
    pub max_pages: usize,

    /// Extra font files tried first by the raster text renderer.
    pub font_paths: Vec<PathBuf>,

    /// Explicit pdfium shared library. Falls back to `PDFIUM_LIB_PATH`, then
    /// the system library search path.
    pub pdfium_library_path: Option<PathBuf>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            roster: ModelRoster::default(),
            ocr_start_index: 0,
            formatting_start_index: 0,
            scale: 2.0,
            api_timeout_secs: 60,
            max_upload_bytes: 25 * 1024 * 1024,
            max_pages: 50,
            font_paths: Vec::new(),
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("roster", &self.roster)
            .field("ocr_start_index", &self.ocr_start_index)
            .field("formatting_start_index", &self.formatting_start_index)
            .field("scale", &self.scale)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_pages", &self.max_pages)
            .field("font_paths", &self.font_paths)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The API key to send: the configured one, else the first non-empty
    /// variable from [`API_KEY_ENV_VARS`].
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|v| !v.is_empty())
    }

    /// Starting position for `role`'s fallback chain.
    pub fn start_index(&self, role: ModelRole) -> usize {
        match role {
            ModelRole::Ocr => self.ocr_start_index,
            ModelRole::Formatting => self.formatting_start_index,
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl fmt::Debug for PipelineConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl PipelineConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn ocr_models<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.roster.set_models(ModelRole::Ocr, ids);
        self
    }

    pub fn formatting_models<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.roster.set_models(ModelRole::Formatting, ids);
        self
    }

    pub fn ocr_start_index(mut self, index: usize) -> Self {
        self.config.ocr_start_index = index;
        self
    }

    pub fn formatting_start_index(mut self, index: usize) -> Self {
        self.config.formatting_start_index = index;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_pages(mut self, pages: usize) -> Self {
        self.config.max_pages = pages.max(1);
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_paths.push(path.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ExamQuizError> {
        let c = &self.config;
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(ExamQuizError::InvalidConfig(format!(
                "endpoint must be an HTTP or HTTPS URL, got '{}'",
                c.endpoint
            )));
        }
        for role in [ModelRole::Ocr, ModelRole::Formatting] {
            let models = c.roster.models(role);
            if models.is_empty() {
                return Err(ExamQuizError::InvalidConfig(format!(
                    "at least one {role} model is required"
                )));
            }
            if models.iter().any(|m| m.identifier.trim().is_empty()) {
                return Err(ExamQuizError::InvalidConfig(format!(
                    "{role} model identifiers must not be blank"
                )));
            }
        }
        if !(0.5..=4.0).contains(&c.scale) {
            return Err(ExamQuizError::InvalidConfig(format!(
                "scale must be 0.5–4.0, got {}",
                c.scale
            )));
        }
        if c.max_upload_bytes == 0 {
            return Err(ExamQuizError::InvalidConfig(
                "max upload size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}
