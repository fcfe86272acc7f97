use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{ImageApiConfig, RequestConfig};
use crate::error::{ImageError, ImageResult};

/// Influence strength applied when a reference image steers generation.
const REFERENCE_STRENGTH: f64 = 0.35;

/// Client for a Stability-style image generation API.
///
/// Requests are multipart forms (prompt, mode, output format, optional
/// reference image); successful responses are raw image bytes.
#[derive(Clone)]
pub struct ImageClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl ImageClient {
    /// Create a new image client
    pub fn new(config: &ImageApiConfig, request_config: RequestConfig) -> ImageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ImageError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Generate an image for the prompt, optionally steered by a reference
    /// image. Returns raw PNG bytes.
    pub async fn generate(
        &self,
        prompt: &str,
        reference_png: Option<Vec<u8>>,
    ) -> ImageResult<Vec<u8>> {
        let url = format!("{}/v2beta/stable-image/generate/core", self.base_url);

        let mode = if reference_png.is_some() {
            "image-to-image"
        } else {
            "text-to-image"
        };

        let mut form = Form::new()
            .text("prompt", prompt.to_string())
            .text("mode", mode.to_string())
            .text("output_format", "png".to_string());

        if let Some(bytes) = reference_png {
            let part = Part::bytes(bytes)
                .file_name("reference.png")
                .mime_str("image/png")
                .map_err(|e| ImageError::NotAnImage {
                    message: format!("Invalid reference image part: {}", e),
                })?;
            form = form
                .part("image", part)
                .text("strength", REFERENCE_STRENGTH.to_string());
        }

        debug!(mode = %mode, "Calling image generation endpoint");
        let start = Instant::now();

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "image/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImageError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ImageError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                status = status.as_u16(),
                latency_ms = start.elapsed().as_millis(),
                "Image generation failed"
            );
            return Err(ImageError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if !content_type.starts_with("image/") {
            return Err(ImageError::NotAnImage {
                message: format!("Unexpected content type: {}", content_type),
            });
        }

        let bytes = response.bytes().await.map_err(ImageError::Http)?.to_vec();

        info!(
            bytes = bytes.len(),
            latency_ms = start.elapsed().as_millis(),
            "Image generation succeeded"
        );

        Ok(bytes)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
