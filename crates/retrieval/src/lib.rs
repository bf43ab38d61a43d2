mod scoring;
mod tokenize;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use novacite_core::prompts::{faculty_qa_prompt, faculty_qa_system, NO_FACULTY_MATCH_REPLY};
use novacite_core::{FacultyAnswerer, FacultyRecord, Prompt, RetrievedFaculty, TextGenerator};
use novacite_storage::FacultyRepository;
use tracing::{info, instrument, warn};

pub use scoring::{cosine_similarity, keyword_score, QueryFeatures};
pub use tokenize::tokenize;

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone)]
struct IndexedFaculty {
    record: FacultyRecord,
    keywords: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct RetrievalStats {
    pub records_loaded: usize,
    pub embedded_records: usize,
    pub vector_enabled: bool,
}

/// Similarity search over the stored faculty rows.
#[derive(Clone)]
pub struct FacultyIndex {
    entries: Vec<IndexedFaculty>,
    embedder: Option<Arc<dyn EmbeddingModel>>,
}

impl FacultyIndex {
    pub fn from_records(
        records: Vec<FacultyRecord>,
        embedder: Option<Arc<dyn EmbeddingModel>>,
    ) -> Self {
        let entries = records
            .into_iter()
            .map(|record| IndexedFaculty {
                keywords: tokenize(&record.context_text()).into_iter().collect(),
                record,
            })
            .collect();

        Self { entries, embedder }
    }

    pub async fn load<S>(store: &S, embedder: Option<Arc<dyn EmbeddingModel>>) -> Result<Self>
    where
        S: FacultyRepository,
    {
        let records = store
            .list_faculty()
            .await
            .context("failed loading faculty records")?;

        if records.is_empty() {
            warn!("faculty table is empty; run `novacite ingest-faculty` first");
        }

        let index = Self::from_records(records, embedder);
        let stats = index.stats();
        info!(
            records = stats.records_loaded,
            embedded = stats.embedded_records,
            vector_enabled = stats.vector_enabled,
            "faculty index loaded"
        );
        Ok(index)
    }

    pub fn stats(&self) -> RetrievalStats {
        RetrievalStats {
            records_loaded: self.entries.len(),
            embedded_records: self
                .entries
                .iter()
                .filter(|entry| entry.record.embedding.is_some())
                .count(),
            vector_enabled: self.embedder.is_some(),
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Vec<RetrievedFaculty> {
        let features = QueryFeatures::build(query, self.embedder.as_ref()).await;

        let mut scored = self
            .entries
            .iter()
            .map(|entry| {
                let score = features.score(&entry.keywords, entry.record.embedding.as_deref());
                (score, entry)
            })
            .filter(|(score, _)| *score > 0.0)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| RetrievedFaculty {
                record: entry.record.clone(),
                score,
            })
            .collect()
    }
}

/// Retrieve-then-generate answering over [`FacultyIndex`].
pub struct FacultyQaChain {
    index: FacultyIndex,
    generator: Arc<dyn TextGenerator>,
    top_k: usize,
}

impl FacultyQaChain {
    pub fn new(index: FacultyIndex, generator: Arc<dyn TextGenerator>, top_k: usize) -> Self {
        Self {
            index,
            generator,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl FacultyAnswerer for FacultyQaChain {
    #[instrument(skip(self))]
    async fn answer(&self, query: &str) -> Result<String> {
        let hits = self.index.search(query, self.top_k).await;
        if hits.is_empty() {
            return Ok(NO_FACULTY_MATCH_REPLY.to_string());
        }

        let records = hits.iter().map(|hit| &hit.record).collect::<Vec<_>>();
        let prompt = Prompt::with_system(faculty_qa_system(), faculty_qa_prompt(query, &records));

        let answer = self
            .generator
            .generate(&prompt)
            .await
            .with_context(|| {
                format!(
                    "faculty answer generation failed ({})",
                    self.generator.model_name()
                )
            })?;

        info!(hits = hits.len(), "faculty answer generated");
        Ok(answer.trim().to_string())
    }
}
