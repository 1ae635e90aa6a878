//! Deterministic placeholder provider, adapted from the teacher's
//! `ml::bi_encoder::BiEncoder::encode` — per-byte accumulation into a
//! fixed-size vector, L2-normalized. This is just for testing; a real
//! provider would run ONNX inference (`ort`) over the tokenizer's output
//! the way the teacher's `ModelLoader`/`BiEncoder` pairing was headed.

use crate::error::CoreResult;

use super::EmbeddingProvider;

pub struct OnnxProvider {
    dim: usize,
    model: String,
}

impl OnnxProvider {
    pub fn new(dim: usize, model: String) -> Self {
        Self { dim, model }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OnnxProvider {
    async fn embed_raw(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dim];
        for (i, byte) in text.bytes().enumerate() {
            embedding[i % self.dim] += byte as f32 / 255.0;
        }

        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in embedding.iter_mut() {
                *v /= norm;
            }
        }

        Ok(embedding)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embedding_has_configured_dimension() {
        let provider = OnnxProvider::new(384, "test-model".to_string());
        let vector = provider.embed_raw("hello world").await.unwrap();
        assert_eq!(vector.len(), 384);
    }

    #[tokio::test]
    async fn embedding_is_unit_normalized() {
        let provider = OnnxProvider::new(16, "test-model".to_string());
        let vector = provider.embed_raw("some text to embed").await.unwrap();
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn same_text_produces_same_embedding() {
        let provider = OnnxProvider::new(32, "test-model".to_string());
        let a = provider.embed_raw("deterministic").await.unwrap();
        let b = provider.embed_raw("deterministic").await.unwrap();
        assert_eq!(a, b);
    }
}
