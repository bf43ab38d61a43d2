use std::sync::Arc;

use async_trait::async_trait;
use novacite_core::prompts::classification_prompt;
use novacite_core::{classify_intent_rules, Intent, IntentClassifier, Prompt, TextGenerator};
use tracing::{debug, warn};

/// Classifies through a zero-temperature text-generation call.
///
/// Any failure of the underlying call degrades to [`Intent::Unknown`].
pub struct LlmIntentClassifier {
    generator: Arc<dyn TextGenerator>,
}

impl LlmIntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, query: &str) -> Intent {
        let prompt = Prompt::user(classification_prompt(query));
        match self.generator.generate(&prompt).await {
            Ok(raw) => {
                let intent = Intent::from_label(&raw);
                debug!(raw = %raw.trim(), intent = %intent, "intent classified");
                intent
            }
            Err(err) => {
                warn!(
                    model = self.generator.model_name(),
                    error = %err,
                    "intent classification failed"
                );
                Intent::Unknown
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RuleIntentClassifier;

#[async_trait]
impl IntentClassifier for RuleIntentClassifier {
    async fn classify(&self, query: &str) -> Intent {
        classify_intent_rules(query)
    }
}
