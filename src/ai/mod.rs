//! HTTP clients for the external generative APIs.
//!
//! [`ChatClient`] talks to an OpenAI-compatible chat completions endpoint
//! (used for vision analysis and idea generation); [`ImageClient`] talks to
//! a Stability-style multipart image generation endpoint.

mod chat;
mod image;
mod types;

pub use chat::ChatClient;
pub use image::ImageClient;
pub use types::*;
