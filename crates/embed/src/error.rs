use thiserror::Error;

/// Errors surfaced by an [`Embedder`](crate::Embedder).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbedError {
    /// The text was empty after trimming.
    #[error("cannot embed empty text")]
    EmptyInput,
    /// Configuration is inconsistent (e.g. `api` mode without `api_url`).
    #[error("invalid embedder config: {0}")]
    InvalidConfig(String),
    /// The remote endpoint could not be reached or answered with an error status.
    #[error("embedding request failed: {0}")]
    Request(String),
    /// The model answered, but not with a usable embedding.
    #[error("inference failure: {0}")]
    Inference(String),
    /// The model produced vectors of an unexpected length.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}
