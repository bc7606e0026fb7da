//! Fallback orchestration: try a role's models in priority order until one
//! answers.
//!
//! ## Why strictly sequential?
//!
//! The model lists mix free-tier and paid models. Racing them in parallel
//! would bill the paid ones on every request and burn the free tiers' rate
//! limits; walking the list one model at a time only spends on a lower
//! priority model when every higher one has already failed.
//!
//! Every failure is logged at `warn` and kept, in order, in the outcome so
//! callers (and tests) can see exactly which models were attempted.

use crate::config::{ModelDescriptor, ModelRole, ModelRoster};
use crate::error::{ExamQuizError, ModelInvocationError};
use crate::pipeline::encode::to_data_uri;
use crate::pipeline::gateway::{ModelGateway, ModelPayload};
use crate::pipeline::render::PageImage;
use crate::progress::ProgressCallback;
use crate::prompts::formatting_prompt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OCR request: page images plus the starting position in the OCR list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// `data:` URIs, in page order.
    pub images: Vec<String>,
    pub model_index: usize,
}

/// Formatting request: raw text plus the starting position in the
/// formatting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattingRequest {
    pub raw_text: String,
    pub model_index: usize,
}

/// Result of walking one fallback chain.
#[derive(Debug, Clone)]
pub enum FallbackOutcome {
    /// A model answered. `attempts` holds the failures that preceded it.
    Success {
        text: String,
        model: ModelDescriptor,
        attempts: Vec<ModelInvocationError>,
    },
    /// Every model from the starting index on failed.
    Exhausted { attempts: Vec<ModelInvocationError> },
}

impl FallbackOutcome {
    /// Failures recorded along the way, in attempt order.
    pub fn failures(&self) -> &[ModelInvocationError] {
        match self {
            FallbackOutcome::Success { attempts, .. } | FallbackOutcome::Exhausted { attempts } => {
                attempts
            }
        }
    }

    /// Every model that was called, in order, including the one that answered.
    pub fn attempted_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.failures().iter().map(|e| e.model()).collect();
        if let FallbackOutcome::Success { model, .. } = self {
            models.push(&model.identifier);
        }
        models
    }

    /// Collapse into the answer text or [`ExamQuizError::AllModelsFailed`].
    pub fn into_result(self, role: ModelRole) -> Result<String, ExamQuizError> {
        match self {
            FallbackOutcome::Success { text, .. } => Ok(text),
            FallbackOutcome::Exhausted { attempts } => {
                Err(ExamQuizError::AllModelsFailed { role, attempts })
            }
        }
    }
}

/// Answer text from one stage, with the model that produced it and every
/// failure recovered from on the way.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub text: String,
    /// `None` only when the stage had nothing to ask (no pages).
    pub model: Option<String>,
    pub failures: Vec<ModelInvocationError>,
}

impl StageResult {
    fn from_outcome(outcome: FallbackOutcome, role: ModelRole) -> Result<Self, ExamQuizError> {
        match outcome {
            FallbackOutcome::Success {
                text,
                model,
                attempts,
            } => Ok(Self {
                text,
                model: Some(model.identifier),
                failures: attempts,
            }),
            FallbackOutcome::Exhausted { attempts } => {
                Err(ExamQuizError::AllModelsFailed { role, attempts })
            }
        }
    }
}

/// Walks a [`ModelRoster`] through a [`ModelGateway`].
#[derive(Clone)]
pub struct FallbackOrchestrator {
    gateway: Arc<dyn ModelGateway>,
    roster: ModelRoster,
    progress: Option<ProgressCallback>,
}

impl FallbackOrchestrator {
    pub fn new(gateway: Arc<dyn ModelGateway>, roster: ModelRoster) -> Self {
        Self {
            gateway,
            roster,
            progress: None,
        }
    }

    /// Report each model failure to `progress`.
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn roster(&self) -> &ModelRoster {
        &self.roster
    }

    /// Try `role`'s models from `start` on, stopping at the first success.
    ///
    /// A `start` at or past the end of the list attempts nothing.
    pub async fn run(&self, role: ModelRole, payload: &ModelPayload, start: usize) -> FallbackOutcome {
        let models = self.roster.models(role);
        let mut attempts: Vec<ModelInvocationError> = Vec::new();

        for model in models.iter().skip(start) {
            debug!("Trying {} model {}", role, model.identifier);
            match self.gateway.invoke(model, payload).await {
                Ok(text) => {
                    info!(
                        "{} answered by {} after {} failed attempt(s)",
                        role,
                        model.identifier,
                        attempts.len()
                    );
                    return FallbackOutcome::Success {
                        text,
                        model: model.clone(),
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("{} model {} failed: {}", role, model.identifier, e);
                    if let Some(cb) = &self.progress {
                        cb.on_model_failed(role, &model.identifier, &e.to_string());
                    }
                    attempts.push(e);
                }
            }
        }

        warn!("All {} {} models failed", attempts.len(), role);
        FallbackOutcome::Exhausted { attempts }
    }

    /// Read text from images with the OCR chain.
    pub async fn extract_text(&self, request: ExtractionRequest) -> Result<String, ExamQuizError> {
        let payload = ModelPayload::Images(request.images);
        self.run(ModelRole::Ocr, &payload, request.model_index)
            .await
            .into_result(ModelRole::Ocr)
    }

    /// Rewrite raw text into numbered questions with the formatting chain.
    pub async fn format_questions(&self, request: FormattingRequest) -> Result<String, ExamQuizError> {
        self.format_stage(request).await.map(|stage| stage.text)
    }

    /// [`Self::format_questions`], keeping the answering model and failures.
    pub async fn format_stage(&self, request: FormattingRequest) -> Result<StageResult, ExamQuizError> {
        if let Some(cb) = &self.progress {
            cb.on_formatting_start(request.raw_text.len());
        }
        let payload = ModelPayload::Text {
            prompt: formatting_prompt(&request.raw_text),
        };
        let outcome = self
            .run(ModelRole::Formatting, &payload, request.model_index)
            .await;
        StageResult::from_outcome(outcome, ModelRole::Formatting)
    }

    /// OCR every page with its own chain, in page order, joining the texts
    /// with a blank line.
    ///
    /// The first page whose chain is exhausted aborts the whole extraction.
    pub async fn extract_pages(
        &self,
        pages: &[PageImage],
        model_index: usize,
    ) -> Result<StageResult, ExamQuizError> {
        let total = pages.len();
        let mut texts: Vec<String> = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut last_model = None;

        for page in pages {
            let page_num = page.page_index + 1;
            if let Some(cb) = &self.progress {
                cb.on_page_start(page_num, total);
            }
            let payload = ModelPayload::Images(vec![to_data_uri(page)]);
            let outcome = self.run(ModelRole::Ocr, &payload, model_index).await;
            let stage = StageResult::from_outcome(outcome, ModelRole::Ocr)?;
            debug!("Page {}/{}: {} chars", page_num, total, stage.text.len());
            if let Some(cb) = &self.progress {
                cb.on_page_complete(page_num, total, stage.text.len());
            }
            texts.push(stage.text);
            failures.extend(stage.failures);
            last_model = stage.model;
        }

        Ok(StageResult {
            text: texts.join("\n\n").trim().to_string(),
            model: last_model,
            failures,
        })
    }
}
