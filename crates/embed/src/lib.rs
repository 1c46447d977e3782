//! Pharmacien text embedders
//!
//! Turns free text into fixed-length vectors for similarity search. A given
//! embedder is deterministic for its model version: the same text always
//! yields the same vector, and every vector carries the model tag that is
//! written next to it in storage.
//!
//! Two implementations ship with the crate:
//!
//! - **Hash mode** (`"hash"`, default) - signed feature hashing of word
//!   tokens. Runs locally with no model files.
//! - **API mode** (`"api"`) - calls a remote feature-extraction endpoint
//!   (Hugging Face, OpenAI, or a custom service) over HTTP.
//!
//! There is no caching and no silent fallback: if the configured embedder
//! fails, the caller sees the error.
//!
//! ## Quick example
//!
//! ```
//! use embed::{build_embedder, EmbedConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let embedder = build_embedder(&EmbedConfig::default()).unwrap();
//! let vector = embedder.embed("dolor de cabeza").await.unwrap();
//! assert_eq!(vector.len(), embedder.dimension());
//! # }
//! ```

mod api;
pub mod config;
pub mod error;
mod hash;
mod normalize;

pub use crate::api::HttpEmbedder;
pub use crate::config::EmbedConfig;
pub use crate::error::EmbedError;
pub use crate::hash::HashEmbedder;

use async_trait::async_trait;
use std::sync::Arc;

/// Converts text into a vector of fixed length [`dimension`](Embedder::dimension).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. Empty text fails with [`EmbedError::EmptyInput`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Tag recorded as `embedding_model` for vectors from this embedder.
    fn model_version(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Build the embedder selected by `cfg.mode`.
pub fn build_embedder(cfg: &EmbedConfig) -> Result<Arc<dyn Embedder>, EmbedError> {
    match cfg.mode.as_str() {
        "hash" | "fast" => Ok(Arc::new(HashEmbedder::from_config(cfg)?)),
        "api" => Ok(Arc::new(HttpEmbedder::from_config(cfg)?)),
        other => Err(EmbedError::InvalidConfig(format!(
            "unknown embedder mode '{other}' (expected \"hash\" or \"api\")"
        ))),
    }
}
