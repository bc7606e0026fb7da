//! Model gateway: one chat-completion request per invocation.
//!
//! The gateway speaks the OpenAI-compatible `/chat/completions` wire format
//! that OpenRouter and most hosted providers accept. It performs exactly one
//! HTTP request per call and never retries; recovery is the fallback
//! orchestrator's job (see [`crate::pipeline::fallback`]).
//!
//! ## Message Layout
//!
//! * **OCR** — one user message whose content is an array: the fixed
//!   [`OCR_INSTRUCTION`] text part followed by one `image_url` part per page
//!   image, in order.
//! * **Formatting** — one user message whose content is a plain string: the
//!   formatting prompt with the raw text embedded at the end.
//!
//! The [`ModelGateway`] trait is the seam tests use to script model
//! behaviour without a network.

use crate::config::{ModelDescriptor, PipelineConfig};
use crate::error::{ExamQuizError, ModelInvocationError};
use crate::prompts::OCR_INSTRUCTION;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Longest error-body excerpt kept in an [`ModelInvocationError::HttpStatus`].
const BODY_EXCERPT_CHARS: usize = 300;

/// What a model is asked to work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelPayload {
    /// Page images as `data:` URIs, in page order.
    Images(Vec<String>),
    /// A complete text prompt.
    Text { prompt: String },
}

/// Sends one request to one model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Ask `model` to answer `payload`, returning the first choice's text.
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        payload: &ModelPayload,
    ) -> Result<String, ModelInvocationError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_request<'a>(model: &'a ModelDescriptor, payload: &'a ModelPayload) -> ChatRequest<'a> {
    let content = match payload {
        ModelPayload::Images(uris) => {
            let mut parts = Vec::with_capacity(uris.len() + 1);
            parts.push(ContentPart::Text {
                text: OCR_INSTRUCTION,
            });
            parts.extend(uris.iter().map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url: url.as_str() },
            }));
            MessageContent::Parts(parts)
        }
        ModelPayload::Text { prompt } => MessageContent::Text(prompt.as_str()),
    };
    ChatRequest {
        model: &model.identifier,
        messages: vec![ChatMessage {
            role: "user",
            content,
        }],
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn extract_text(model: &str, body: &[u8]) -> Result<String, ModelInvocationError> {
    let response: ChatResponse =
        serde_json::from_slice(body).map_err(|e| ModelInvocationError::Malformed {
            model: model.to_string(),
            detail: e.to_string(),
        })?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ModelInvocationError::EmptyResponse {
            model: model.to_string(),
        })
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(BODY_EXCERPT_CHARS).collect();
    out.push('…');
    out
}

// ── HTTP implementation ──────────────────────────────────────────────────

/// [`ModelGateway`] backed by an OpenAI-compatible HTTP endpoint.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpGateway {
    /// Build a gateway from the pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ExamQuizError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExamQuizError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.resolve_api_key(),
            timeout: Duration::from_secs(config.api_timeout_secs),
        })
    }

    async fn send(&self, model: &ModelDescriptor, payload: &ModelPayload) -> Result<String, ModelInvocationError> {
        let id = model.identifier.as_str();
        let mut request = self.client.post(&self.endpoint).json(&build_request(model, payload));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| transport_error(id, e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| transport_error(id, e))?;

        if !status.is_success() {
            return Err(ModelInvocationError::HttpStatus {
                model: id.to_string(),
                status: status.as_u16(),
                body: excerpt(&String::from_utf8_lossy(&body)),
            });
        }
        extract_text(id, &body)
    }
}

fn transport_error(model: &str, e: reqwest::Error) -> ModelInvocationError {
    ModelInvocationError::Transport {
        model: model.to_string(),
        detail: e.to_string(),
    }
}

#[async_trait]
impl ModelGateway for HttpGateway {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        payload: &ModelPayload,
    ) -> Result<String, ModelInvocationError> {
        debug!("Invoking {} ({})", model.identifier, model.role);
        match tokio::time::timeout(self.timeout, self.send(model, payload)).await {
            Ok(result) => result,
            Err(_) => Err(ModelInvocationError::Timeout {
                model: model.identifier.clone(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRole;
    use serde_json::json;

    #[test]
    fn ocr_request_puts_instruction_before_images() {
        let model = ModelDescriptor::new("vision-1", ModelRole::Ocr);
        let payload = ModelPayload::Images(vec!["data:a".into(), "data:b".into()]);
        let body = serde_json::to_value(build_request(&model, &payload)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "vision-1",
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": OCR_INSTRUCTION },
                        { "type": "image_url", "image_url": { "url": "data:a" } },
                        { "type": "image_url", "image_url": { "url": "data:b" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn formatting_request_uses_string_content() {
        let model = ModelDescriptor::new("text-1", ModelRole::Formatting);
        let payload = ModelPayload::Text {
            prompt: "format this".into(),
        };
        let body = serde_json::to_value(build_request(&model, &payload)).unwrap();
        assert_eq!(body["messages"][0]["content"], json!("format this"));
    }

    #[test]
    fn extract_first_choice() {
        let body = br#"{"choices":[{"message":{"content":"Q.1 hi"}},{"message":{"content":"no"}}]}"#;
        assert_eq!(extract_text("m", body).unwrap(), "Q.1 hi");
    }

    #[test]
    fn empty_choices_is_empty_response() {
        let err = extract_text("m", br#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ModelInvocationError::EmptyResponse { .. }));
        let err = extract_text("m", br#"{"error":{"message":"quota"}}"#).unwrap_err();
        assert!(matches!(err, ModelInvocationError::EmptyResponse { .. }));
        let err = extract_text("m", br#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap_err();
        assert!(matches!(err, ModelInvocationError::EmptyResponse { .. }));
    }

    #[test]
    fn undecodable_body_is_malformed() {
        let err = extract_text("m", b"<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ModelInvocationError::Malformed { .. }));
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let e = excerpt(&long);
        assert_eq!(e.chars().count(), BODY_EXCERPT_CHARS + 1);
        assert!(e.ends_with('…'));
    }

    #[test]
    fn debug_redacts_key() {
        let config = PipelineConfig::builder().api_key("sk-live").build().unwrap();
        let gw = HttpGateway::from_config(&config).unwrap();
        assert!(!format!("{gw:?}").contains("sk-live"));
    }
}
