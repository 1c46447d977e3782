use serde::{Deserialize, Serialize};

/// Runtime configuration describing which embedder to build.
///
/// # Example
/// ```
/// use embed::{build_embedder, EmbedConfig};
///
/// let cfg = EmbedConfig {
///     mode: "hash".into(),
///     dimension: 64,
///     ..Default::default()
/// };
/// let embedder = build_embedder(&cfg).unwrap();
/// assert_eq!(embedder.dimension(), 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbedConfig {
    /// `"hash"` (local feature hashing, default) or `"api"` (remote HTTP model).
    pub mode: String,
    /// Model version tag written to `embedding_model` next to every vector.
    pub model_name: String,
    /// Length of every produced vector.
    pub dimension: usize,
    /// Feature-extraction endpoint when [`mode`](Self::mode) is `"api"`.
    pub api_url: Option<String>,
    /// Authorization header (e.g. `"Bearer hf_xxx"`).
    pub api_auth_header: Option<String>,
    /// Remote provider hint: `"hf"`, `"openai"`, or `"custom"` (default).
    pub api_provider: Option<String>,
    /// Client timeout for one API call, in seconds.
    pub api_timeout_secs: u64,
    /// Normalize vectors to unit length.
    pub normalize: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            mode: "hash".into(),
            model_name: "feature-hash-v1".into(),
            dimension: 384,
            api_url: None,
            api_auth_header: None,
            api_provider: None,
            api_timeout_secs: 30,
            normalize: true,
        }
    }
}

impl EmbedConfig {
    pub fn hash(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = EmbedConfig::default();
        assert_eq!(cfg.mode, "hash");
        assert_eq!(cfg.model_name, "feature-hash-v1");
        assert_eq!(cfg.dimension, 384);
        assert!(cfg.api_url.is_none());
        assert_eq!(cfg.api_timeout_secs, 30);
        assert!(cfg.normalize);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EmbedConfig = serde_json::from_str(
            r#"{ "mode": "api", "api_url": "http://localhost:8080/embed", "model_name": "bge-small" }"#,
        )
        .unwrap();
        assert_eq!(cfg.mode, "api");
        assert_eq!(cfg.api_url.as_deref(), Some("http://localhost:8080/embed"));
        assert_eq!(cfg.dimension, 384);
        assert!(cfg.normalize);
    }
}
