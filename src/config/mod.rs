use std::env;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub chat: ChatApiConfig,
    pub image: ImageApiConfig,
    pub database: DatabaseConfig,
    pub blobs: BlobConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub models: ModelConfig,
}

/// Chat completion API configuration (OpenAI-compatible endpoint)
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Image synthesis API configuration
#[derive(Debug, Clone)]
pub struct ImageApiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Blob store configuration
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub root: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Model name configuration
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub vision: String,
    pub text: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let chat = ChatApiConfig {
            api_key: env::var("OPENAI_API_KEY").map_err(|_| AppError::Config {
                message: "OPENAI_API_KEY is required".to_string(),
            })?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
        };

        let image = ImageApiConfig {
            api_key: env::var("IMAGE_API_KEY").map_err(|_| AppError::Config {
                message: "IMAGE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("IMAGE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stability.ai".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/idealab.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        };

        let blobs = BlobConfig {
            root: PathBuf::from(
                env::var("BLOB_ROOT").unwrap_or_else(|_| "./data/blobs".to_string()),
            ),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let models = ModelConfig {
            vision: env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            text: env::var("TEXT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
        };

        Ok(Config {
            chat,
            image,
            database,
            blobs,
            logging,
            request,
            models,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vision: "gpt-4o-mini".to_string(),
            text: "gpt-4o".to_string(),
        }
    }
}
