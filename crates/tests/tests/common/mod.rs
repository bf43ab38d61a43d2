#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use novacite_agents::{Assistant, Collaborators};
use novacite_core::{CircularDesk, FacultyAnswerer, IntentClassifier, Prompt, TextGenerator};
use novacite_llm::LlmIntentClassifier;
use novacite_observability::AppMetrics;
use parking_lot::Mutex;

/// Text generator with a fixed reply (or failure) that records every prompt.
pub struct ScriptedGenerator {
    reply: Option<String>,
    pub prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().push(prompt.clone());
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("text-generation service unavailable"))
    }
}

/// Faculty answerer and circulars desk that echo a canned reply.
pub struct RecordingCollaborator {
    reply: String,
    fail: bool,
    pub queries: Mutex<Vec<String>>,
}

impl RecordingCollaborator {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: false,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            fail: true,
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl FacultyAnswerer for RecordingCollaborator {
    async fn answer(&self, query: &str) -> Result<String> {
        self.queries.lock().push(query.to_string());
        if self.fail {
            return Err(anyhow!("faculty index unavailable"));
        }
        Ok(self.reply.clone())
    }
}

#[async_trait]
impl CircularDesk for RecordingCollaborator {
    async fn handle(&self, query: &str) -> String {
        self.queries.lock().push(query.to_string());
        self.reply.clone()
    }
}

pub const FACULTY_REPLY: &str = "Dr. Rajesh K heads Computer Science.";
pub const CIRCULAR_REPLY: &str = "Downloaded and saved to data/pdfs/Exam_Timetable.pdf";
pub const IDENTITY_REPLY: &str = "I am NovaCite, your college assistant.";

/// Stub collaborators wired around a label-producing classification generator.
pub struct Harness {
    pub classifier_llm: Arc<ScriptedGenerator>,
    pub faculty: Arc<RecordingCollaborator>,
    pub circulars: Arc<RecordingCollaborator>,
    pub identity: Arc<ScriptedGenerator>,
    pub metrics: Arc<AppMetrics>,
}

impl Harness {
    pub fn classifying_as(label: &str) -> Self {
        Self::with_classifier(ScriptedGenerator::replying(label))
    }

    pub fn with_classifier(classifier_llm: Arc<ScriptedGenerator>) -> Self {
        Self {
            classifier_llm,
            faculty: RecordingCollaborator::replying(FACULTY_REPLY),
            circulars: RecordingCollaborator::replying(CIRCULAR_REPLY),
            identity: ScriptedGenerator::replying(IDENTITY_REPLY),
            metrics: AppMetrics::shared(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        let classifier: Arc<dyn IntentClassifier> =
            Arc::new(LlmIntentClassifier::new(self.classifier_llm.clone()));
        Collaborators {
            classifier,
            faculty: self.faculty.clone(),
            circulars: self.circulars.clone(),
            identity: self.identity.clone(),
        }
    }

    pub fn assistant(&self) -> Assistant {
        Assistant::new(self.collaborators(), self.metrics.clone())
            .expect("assistant graph compiles")
    }
}
