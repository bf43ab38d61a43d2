use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::tokenize::tokenize;
use crate::EmbeddingModel;

const KEYWORD_WEIGHT: f32 = 0.65;
const VECTOR_WEIGHT: f32 = 0.35;

/// Tokens and (when available) the embedding of one query.
#[derive(Debug, Clone)]
pub struct QueryFeatures {
    pub tokens: HashSet<String>,
    pub embedding: Option<Vec<f32>>,
}

impl QueryFeatures {
    /// An embedding failure degrades the search to keyword scoring.
    pub async fn build(query: &str, embedder: Option<&Arc<dyn EmbeddingModel>>) -> Self {
        let tokens = tokenize(query).into_iter().collect::<HashSet<_>>();
        let embedding = match embedder {
            Some(model) => match model.embed(query).await {
                Ok(vector) => Some(vector),
                Err(err) => {
                    warn!(
                        model = model.model_name(),
                        error = %err,
                        "query embedding failed, keyword scoring only"
                    );
                    None
                }
            },
            None => None,
        };

        Self { tokens, embedding }
    }

    pub fn score(&self, doc_tokens: &HashSet<String>, doc_embedding: Option<&[f32]>) -> f32 {
        let keyword = keyword_score(&self.tokens, doc_tokens);
        match &self.embedding {
            Some(query) => {
                let vector = doc_embedding
                    .map(|doc| cosine_similarity(query, doc).max(0.0))
                    .unwrap_or(0.0);
                (KEYWORD_WEIGHT * keyword) + (VECTOR_WEIGHT * vector)
            }
            None => keyword,
        }
    }
}

pub fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;

    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}
