use async_trait::async_trait;
use tracing::{debug, warn};

use super::NO_ANALYSIS;
use crate::ai::{ChatClient, ChatRequest, Message};
use crate::prompts;

/// Adapter that turns an image reference into a short text description.
///
/// This step is best-effort: any failure degrades to [`NO_ANALYSIS`] so the
/// experiment keeps going without a description.
#[async_trait]
pub trait VisionAnalysis: Send + Sync {
    /// Describe the image behind `image_ref` (an HTTPS, file, or data URL)
    async fn describe_image(&self, image_ref: &str) -> String;
}

/// Vision analysis backed by an OpenAI-compatible multimodal model
pub struct OpenAiVision {
    chat: ChatClient,
    model: String,
}

impl OpenAiVision {
    /// Create a vision adapter using the given chat client and model
    pub fn new(chat: ChatClient, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }
}

#[async_trait]
impl VisionAnalysis for OpenAiVision {
    async fn describe_image(&self, image_ref: &str) -> String {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::user_with_image(prompts::VISION_DESCRIBE, image_ref)],
        )
        .with_max_tokens(300);

        match self.chat.complete(request).await {
            Ok(response) => match response.completion_text() {
                Some(text) if !text.trim().is_empty() => {
                    debug!(chars = text.len(), "Vision analysis completed");
                    text.trim().to_string()
                }
                _ => {
                    warn!("Vision analysis returned empty completion");
                    NO_ANALYSIS.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "Vision analysis failed, continuing without it");
                NO_ANALYSIS.to_string()
            }
        }
    }
}
