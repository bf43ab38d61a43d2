use anyhow::Result;
use async_trait::async_trait;
use novacite_retrieval::{tokenize, EmbeddingModel};

/// Deterministic feature-hashing embedder for runs without an API key.
#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(32) }
    }
}

#[async_trait]
impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &str {
        "hash-fallback"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0.0_f32; self.dims];

        for token in tokenize(text) {
            let hash = fxhash(token.as_bytes());
            let index = (hash as usize) % self.dims;
            let sign = if (hash & 1) == 0 { 1.0 } else { -1.0 };
            vec[index] += sign;
        }

        normalize(&mut vec);
        Ok(vec)
    }
}

fn fxhash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn normalize(values: &mut [f32]) {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in values.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use novacite_retrieval::cosine_similarity;

    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let model = HashEmbeddingModel::new(64);
        let a = model.embed("Exam timetable").await.unwrap();
        let b = model.embed("exam   TIMETABLE!").await.unwrap();
        assert_eq!(a.len(), 64);
        assert!(cosine_similarity(&a, &b) > 0.99);
    }
}
