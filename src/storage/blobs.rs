use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::BlobConfig;
use crate::error::{BlobError, BlobResult};

/// Trait for storing binary artifacts (result and reference images).
///
/// Paths are relative, slash-separated keys like
/// `projects/project_1/results/exp_1_result.png`. Implementations return a
/// URL that can be stored on an idea and later handed back to the vision
/// adapter.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Decode a `data:` URL and store its payload under `path`
    async fn put_data_url(&self, path: &str, data_url: &str) -> BlobResult<String>;

    /// Store raw bytes under `path`
    async fn put_bytes(&self, path: &str, bytes: &[u8]) -> BlobResult<String>;
}

/// Filesystem-backed blob store rooted at a configured directory
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a blob store rooted at `config.root`
    pub fn new(config: &BlobConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    /// Create a blob store rooted at an explicit directory (for tests)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != "..") {
            full.push(segment);
        }
        full
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put_data_url(&self, path: &str, data_url: &str) -> BlobResult<String> {
        let payload = extract_base64_payload(data_url)?;

        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| BlobError::InvalidDataUrl {
                message: format!("base64 decode failed: {}", e),
            })?;

        self.put_bytes(path, &bytes).await
    }

    async fn put_bytes(&self, path: &str, bytes: &[u8]) -> BlobResult<String> {
        let full = self.resolve(path);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Write {
                    path: path.to_string(),
                    message: format!("failed to create directory: {}", e),
                })?;
        }

        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| BlobError::Write {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        debug!(path = %path, size = bytes.len(), "Stored blob");

        Ok(file_url(&full))
    }
}

/// Extract the base64 payload from a `data:<mime>;base64,<payload>` URL
fn extract_base64_payload(data_url: &str) -> BlobResult<&str> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| BlobError::InvalidDataUrl {
            message: "missing data: prefix".to_string(),
        })?;

    let (meta, payload) = rest.split_once(',').ok_or_else(|| BlobError::InvalidDataUrl {
        message: "missing comma separator".to_string(),
    })?;

    if !meta.ends_with(";base64") {
        return Err(BlobError::InvalidDataUrl {
            message: "payload is not base64-encoded".to_string(),
        });
    }

    Ok(payload)
}

fn file_url(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}
