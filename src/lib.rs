//! # Idealab
//!
//! An idea improvement lab: applies additive transformations (creativity,
//! aesthetics, usability) to product ideas by sequencing AI adapters and
//! tracking the lineage of every derived idea.
//!
//! ## Features
//!
//! - **Additive Experiments**: one-shot pipelines that analyse a source
//!   idea, generate a four-step improvement plan, refine a new concept, and
//!   render a concept image
//! - **Defensive Generation**: JSON repair and deterministic fallbacks keep
//!   every experiment schema-valid even against misbehaving models
//! - **Lineage Tracking**: generation numbers and source back-references
//!   link every derived idea to its root across repeated rounds
//! - **Durable Progress**: experiments are persisted in a processing state
//!   before any AI call, so interrupted runs leave a recoverable record
//!
//! ## Architecture
//!
//! ```text
//! CLI → Experiment Orchestrator → Chat API (vision + generation, HTTP)
//!              ↓                → Image API (synthesis, HTTP)
//!        SQLite + blob store
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use idealab::{Config, ExperimentOrchestrator};
//! use idealab::ai::{ChatClient, ImageClient};
//! use idealab::lab::{OpenAiIdeaGeneration, OpenAiVision, StabilityImageSynthesis};
//! use idealab::storage::{FsBlobStore, SqliteGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let gateway = Arc::new(SqliteGateway::new(&config.database).await?);
//!     let blobs = Arc::new(FsBlobStore::new(&config.blobs));
//!     let chat = ChatClient::new(&config.chat, config.request.clone())?;
//!     let image = ImageClient::new(&config.image, config.request.clone())?;
//!     let orchestrator = ExperimentOrchestrator::new(
//!         gateway,
//!         blobs,
//!         Arc::new(OpenAiVision::new(chat.clone(), config.models.vision.clone())),
//!         Arc::new(OpenAiIdeaGeneration::new(chat, config.models.text.clone())),
//!         Arc::new(StabilityImageSynthesis::new(image)),
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Chat and image API clients.
pub mod ai;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Experiment pipeline: additives, adapters, orchestrator, lineage.
pub mod lab;
/// Prompt construction for the AI adapters.
pub mod prompts;
/// SQLite and blob persistence layer.
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use lab::{Additive, AdditiveConfig, ExperimentOrchestrator, LineageResolver};
pub use storage::{Experiment, Gateway, Idea, Project};
