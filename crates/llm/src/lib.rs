mod classifier;
mod fallback;
mod gemini;
mod retry;

use std::sync::Arc;

use anyhow::{Context, Result};
use novacite_core::prompts::{CLASSIFIER_TEMPERATURE, IDENTITY_TEMPERATURE};
use novacite_core::{ClassifierKind, IntentClassifier, Settings, TextGenerator};
use novacite_retrieval::EmbeddingModel;
use tracing::info;

pub use classifier::{LlmIntentClassifier, RuleIntentClassifier};
pub use fallback::HashEmbeddingModel;
pub use gemini::{GeminiChat, GeminiClient, GeminiEmbedder, LlmError, DEFAULT_BASE_URL};
pub use retry::{is_retryable_status, RetryPolicy};

/// Chat model handles; only present when an API key is configured.
#[derive(Clone)]
pub struct Generators {
    /// Temperature 0, shared by the classifier and the faculty answerer.
    pub deterministic: Arc<dyn TextGenerator>,
    /// Temperature 0.3, persona replies.
    pub identity: Arc<dyn TextGenerator>,
}

/// Process-wide model clients, built once at startup.
#[derive(Clone)]
pub struct LlmStack {
    pub embedder: Arc<dyn EmbeddingModel>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub generators: Option<Generators>,
}

impl LlmStack {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let Some(api_key) = settings.gemini_api_key.as_deref() else {
            info!("GEMINI_API_KEY not set; using offline embedder and rule classifier");
            return Ok(Self {
                embedder: Arc::new(HashEmbeddingModel::new(256)),
                classifier: Arc::new(RuleIntentClassifier),
                generators: None,
            });
        };

        let client = GeminiClient::new(
            settings.gemini_base_url.as_str(),
            api_key,
            RetryPolicy::fixed(settings.max_retries, settings.retry_delay),
        )?;

        let deterministic: Arc<dyn TextGenerator> =
            Arc::new(client.chat(settings.gemini_chat_model.as_str(), CLASSIFIER_TEMPERATURE));
        let identity: Arc<dyn TextGenerator> =
            Arc::new(client.chat(settings.gemini_chat_model.as_str(), IDENTITY_TEMPERATURE));

        let classifier: Arc<dyn IntentClassifier> = match settings.classifier {
            ClassifierKind::Llm => Arc::new(LlmIntentClassifier::new(deterministic.clone())),
            ClassifierKind::Rules => Arc::new(RuleIntentClassifier),
        };

        info!(
            chat_model = %settings.gemini_chat_model,
            embedding_model = %settings.gemini_embedding_model,
            classifier = ?settings.classifier,
            "model clients initialised"
        );

        Ok(Self {
            embedder: Arc::new(client.embedder(settings.gemini_embedding_model.as_str())),
            classifier,
            generators: Some(Generators {
                deterministic,
                identity,
            }),
        })
    }

    pub fn require_generators(&self) -> Result<&Generators> {
        self.generators
            .as_ref()
            .context("GEMINI_API_KEY is required to answer questions")
    }
}
