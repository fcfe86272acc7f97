use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{ChatRequest, ChatResponse};
use crate::config::{ChatApiConfig, RequestConfig};
use crate::error::{ChatError, ChatResult};

/// Client for an OpenAI-compatible chat completions API
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(config: &ChatApiConfig, request_config: RequestConfig) -> ChatResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ChatError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Run a chat completion, retrying transient failures with backoff
    pub async fn complete(&self, request: ChatRequest) -> ChatResult<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = request.model.clone();

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying chat completion"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    let latency = start.elapsed();
                    info!(
                        model = %model,
                        latency_ms = latency.as_millis(),
                        "Chat completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        model = %model,
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "Chat completion failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(ChatError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(&self, url: &str, request: &ChatRequest) -> ChatResult<ChatResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling chat completions endpoint"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ChatError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ChatError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(chat_response)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = ChatApiConfig {
            api_key: "test_key".to_string(),
            base_url: "https://api.openai.com/".to_string(),
        };

        let client = ChatClient::new(&config, RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.openai.com");
    }
}
