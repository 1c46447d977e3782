use async_trait::async_trait;
use fxhash::hash64;

use crate::normalize::normalize_l2;
use crate::{EmbedConfig, EmbedError, Embedder};

/// Deterministic local embedder based on signed feature hashing.
///
/// Every lowercase word token is hashed into one of `dimension` buckets and
/// adds `+1` or `-1` there depending on a spare hash bit. Texts that share
/// words therefore share buckets, which is enough for cosine ranking over a
/// small corpus and needs no model files or network.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_name: String,
    dimension: usize,
    normalize: bool,
}

impl HashEmbedder {
    pub fn new(model_name: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimension,
            normalize: true,
        }
    }

    pub fn from_config(cfg: &EmbedConfig) -> Result<Self, EmbedError> {
        if cfg.dimension == 0 {
            return Err(EmbedError::InvalidConfig(
                "dimension must be greater than zero".into(),
            ));
        }
        Ok(Self {
            model_name: cfg.model_name.clone(),
            dimension: cfg.dimension,
            normalize: cfg.normalize,
        })
    }

    fn vectorize(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let lowered = text.to_lowercase();
        let mut tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        // Punctuation-only text still gets a stable, non-zero vector.
        if tokens.is_empty() {
            tokens.push(lowered.as_str());
        }

        let mut v = vec![0f32; self.dimension];
        for token in tokens {
            let h = hash64(token.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
            v[bucket] += sign;
        }
        if self.normalize {
            normalize_l2(&mut v);
        }
        Ok(v)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.vectorize(text)
    }

    fn model_version(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn same_text_same_vector() {
        let e = HashEmbedder::new("feature-hash-v1", 64);
        let a = e.embed("Dolor de cabeza").await.unwrap();
        let b = e.embed("dolor  de CABEZA").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let e = HashEmbedder::new("feature-hash-v1", 128);
        let v = e.embed("ibuprofeno 400 mg").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn shared_words_score_higher() {
        let e = HashEmbedder::new("feature-hash-v1", 384);
        let q = e.embed("dolor de cabeza").await.unwrap();
        let near = e.embed("alivio del dolor de cabeza").await.unwrap();
        let far = e.embed("vitaminas para el invierno").await.unwrap();
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let e = HashEmbedder::new("feature-hash-v1", 16);
        assert_eq!(e.embed("   ").await.unwrap_err(), EmbedError::EmptyInput);
    }

    #[tokio::test]
    async fn punctuation_only_text_still_embeds() {
        let e = HashEmbedder::new("feature-hash-v1", 16);
        let v = e.embed("?!").await.unwrap();
        assert!(v.iter().any(|x| *x != 0.0));
    }

    #[tokio::test]
    async fn batch_matches_single_calls() {
        let e = HashEmbedder::new("feature-hash-v1", 32);
        let texts = vec!["uno".to_string(), "dos tres".to_string()];
        let batch = e.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], e.embed("dos tres").await.unwrap());
    }

    #[test]
    fn zero_dimension_is_invalid() {
        let cfg = EmbedConfig::hash(0);
        assert!(matches!(
            HashEmbedder::from_config(&cfg),
            Err(EmbedError::InvalidConfig(_))
        ));
    }
}
