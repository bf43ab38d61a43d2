//! Seams between the assistant graph and the services it delegates to.
//!
//! Every handle is built once at startup and shared read-only behind an `Arc`.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Intent;

/// Input for one text-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
        }
    }
}

/// External text-generation service. Sampling temperature is fixed per instance.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Maps a raw query onto the closed intent set. Never fails.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Intent;
}

/// Retrieval-augmented answering over faculty records.
///
/// "No results" is a normal answer, not an error.
#[async_trait]
pub trait FacultyAnswerer: Send + Sync {
    async fn answer(&self, query: &str) -> Result<String>;
}

/// Circular lookup and download. Always returns a human-readable status.
#[async_trait]
pub trait CircularDesk: Send + Sync {
    async fn handle(&self, query: &str) -> String;
}
