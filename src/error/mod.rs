use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Chat API error: {0}")]
    Chat(#[from] ChatError),

    #[error("Image API error: {0}")]
    Image(#[from] ImageError),

    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    #[error("Idea not found: {idea_id}")]
    IdeaNotFound { idea_id: String },

    #[error("Experiment not found: {experiment_id}")]
    ExperimentNotFound { experiment_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Chat completion API errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Chat API unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Image synthesis API errors
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Response was not an image: {message}")]
    NotAnImage { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Blob store errors
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid data URL: {message}")]
    InvalidDataUrl { message: String },

    #[error("Write failed for {path}: {message}")]
    Write { path: String, message: String },
}

/// Experiment-flow errors with structured details
#[derive(Debug, Error)]
pub enum LabError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

impl From<LabError> for AppError {
    fn from(err: LabError) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for chat API operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Result type alias for image API operations
pub type ImageResult<T> = Result<T, ImageError>;

/// Result type alias for blob store operations
pub type BlobResult<T> = Result<T, BlobError>;
