use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use novacite_core::prompts::{IDENTITY_PERSONA, UNKNOWN_REPLY};
use novacite_core::{
    AgentState, CircularDesk, FacultyAnswerer, IntentClassifier, Prompt, TextGenerator,
};
use tracing::info;

use crate::graph::{GraphState, Node};

impl GraphState for AgentState {
    fn is_complete(&self) -> bool {
        self.result().is_some()
    }
}

/// Entry node: records the query's intent.
pub struct ClassifyNode {
    classifier: Arc<dyn IntentClassifier>,
}

impl ClassifyNode {
    pub fn new(classifier: Arc<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Node<AgentState> for ClassifyNode {
    async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        let intent = self.classifier.classify(state.query()).await;
        info!(query = state.query(), %intent, "query classified");
        state.set_intent(intent)?;
        Ok(state)
    }
}

pub struct FacultyNode {
    answerer: Arc<dyn FacultyAnswerer>,
}

impl FacultyNode {
    pub fn new(answerer: Arc<dyn FacultyAnswerer>) -> Self {
        Self { answerer }
    }
}

#[async_trait]
impl Node<AgentState> for FacultyNode {
    async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        let answer = self
            .answerer
            .answer(state.query())
            .await
            .context("faculty lookup failed")?;
        state.set_result(answer)?;
        Ok(state)
    }
}

pub struct CircularNode {
    desk: Arc<dyn CircularDesk>,
}

impl CircularNode {
    pub fn new(desk: Arc<dyn CircularDesk>) -> Self {
        Self { desk }
    }
}

#[async_trait]
impl Node<AgentState> for CircularNode {
    async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        let status = self.desk.handle(state.query()).await;
        state.set_result(status)?;
        Ok(state)
    }
}

/// Answers "who are you" style questions in the assistant's persona.
pub struct IdentityNode {
    generator: Arc<dyn TextGenerator>,
}

impl IdentityNode {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Node<AgentState> for IdentityNode {
    async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        let prompt = Prompt::with_system(IDENTITY_PERSONA, state.query());
        let reply = self
            .generator
            .generate(&prompt)
            .await
            .with_context(|| format!("identity reply failed ({})", self.generator.model_name()))?;
        state.set_result(reply)?;
        Ok(state)
    }
}

pub struct UnknownNode;

#[async_trait]
impl Node<AgentState> for UnknownNode {
    async fn run(&self, mut state: AgentState) -> Result<AgentState> {
        state.set_result(UNKNOWN_REPLY)?;
        Ok(state)
    }
}
