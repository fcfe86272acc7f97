use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{info, warn};

use crate::ai::ImageClient;

/// Outcome of one image-synthesis attempt.
///
/// Failure is a value, not an error: a failed render still produces a
/// complete experiment, just one without an image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// The image was rendered; payload is a `data:image/png;base64,` URL.
    Generated { data_url: String },
    /// The render failed; `reason` is recorded on the resulting idea.
    Failed { reason: String },
}

/// Adapter that renders a concept image from a text prompt.
#[async_trait]
pub trait ImageSynthesis: Send + Sync {
    /// Render an image for `prompt`, optionally steered by reference PNG bytes
    async fn synthesize(&self, prompt: &str, reference_png: Option<Vec<u8>>) -> ImageOutcome;
}

/// Image synthesis backed by a Stability-compatible endpoint
pub struct StabilityImageSynthesis {
    client: ImageClient,
}

impl StabilityImageSynthesis {
    /// Create a synthesis adapter around the given image client
    pub fn new(client: ImageClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSynthesis for StabilityImageSynthesis {
    async fn synthesize(&self, prompt: &str, reference_png: Option<Vec<u8>>) -> ImageOutcome {
        match self.client.generate(prompt, reference_png).await {
            Ok(bytes) => {
                info!(size = bytes.len(), "Image synthesis succeeded");
                ImageOutcome::Generated {
                    data_url: format!("data:image/png;base64,{}", STANDARD.encode(bytes)),
                }
            }
            Err(e) => {
                warn!(error = %e, "Image synthesis failed");
                ImageOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
