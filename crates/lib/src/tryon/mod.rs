//! Virtual try-on: hosted model client and the invoker that runs one try-on end to end.
//!
//! The model is a black box behind [`TryOnModel`]; [`TryOnInvoker`] downloads the two
//! images, calls the model, and writes the composite under the static directory.

mod gradio;
mod invoker;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::media::MediaError;

pub use gradio::GradioClient;
pub use invoker::{TryOnInvoker, TryOnService};

#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    #[error("downloading input image: {0}")]
    Media(#[from] MediaError),
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model api error: {0}")]
    Api(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("decoding result image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("writing result image: {0}")]
    Io(#[from] std::io::Error),
}

/// What the hosted model handed back. The shape is not under our control.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Remote URL of the generated image.
    Url(String),
    /// Image already materialized on local disk.
    LocalPath(PathBuf),
    /// Anything else.
    Other(serde_json::Value),
}

/// Image synthesis capability: person photo + garment photo in, result image out.
#[async_trait]
pub trait TryOnModel: Send + Sync {
    async fn predict(&self, person: &Path, garment: &Path) -> Result<ModelOutput, TryOnError>;
}
