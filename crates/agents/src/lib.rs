pub mod graph;
mod nodes;
mod runtime;

use std::sync::Arc;
use std::time::Instant;

use novacite_core::{
    AgentState, CircularDesk, FacultyAnswerer, Intent, IntentClassifier, Reply, Route,
    TextGenerator,
};
use novacite_observability::AppMetrics;
use tracing::{info, instrument, warn};

pub use graph::{CompilationError, CompiledGraph, GraphError, GraphState, Node, StateGraph};
pub use nodes::{CircularNode, ClassifyNode, FacultyNode, IdentityNode, UnknownNode};
pub use runtime::AssistantRuntime;

pub const CLASSIFY_NODE: &str = "classify";

/// The services the assistant graph delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn IntentClassifier>,
    pub faculty: Arc<dyn FacultyAnswerer>,
    pub circulars: Arc<dyn CircularDesk>,
    /// Persona generator, sampled at the identity temperature.
    pub identity: Arc<dyn TextGenerator>,
}

/// `classify` followed by exactly one of the four response nodes.
pub fn build_assistant_graph(
    collaborators: Collaborators,
) -> Result<CompiledGraph<AgentState>, CompilationError> {
    let mut graph = StateGraph::new();
    graph
        .add_node(CLASSIFY_NODE, Arc::new(ClassifyNode::new(collaborators.classifier)))
        .add_node(
            Route::Faculty.node_id(),
            Arc::new(FacultyNode::new(collaborators.faculty)),
        )
        .add_node(
            Route::Circular.node_id(),
            Arc::new(CircularNode::new(collaborators.circulars)),
        )
        .add_node(
            Route::Identity.node_id(),
            Arc::new(IdentityNode::new(collaborators.identity)),
        )
        .add_node(Route::Unknown.node_id(), Arc::new(UnknownNode))
        .set_entry_point(CLASSIFY_NODE)
        .add_conditional_edges(
            CLASSIFY_NODE,
            |state: &AgentState| state.route().node_id().to_string(),
            Route::ALL.map(Route::node_id),
        );

    for route in Route::ALL {
        graph.set_finish_point(route.node_id());
    }

    graph.compile()
}

/// Runs one query through the assistant graph with a fresh state.
pub struct Assistant {
    graph: CompiledGraph<AgentState>,
    metrics: Arc<AppMetrics>,
}

impl Assistant {
    pub fn new(
        collaborators: Collaborators,
        metrics: Arc<AppMetrics>,
    ) -> Result<Self, CompilationError> {
        Ok(Self {
            graph: build_assistant_graph(collaborators)?,
            metrics,
        })
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    #[instrument(skip(self))]
    pub async fn ask(&self, query: &str) -> Result<AgentState, GraphError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let outcome = self.graph.invoke_traced(AgentState::new(query)).await;
        self.metrics.observe_latency(started.elapsed());

        match outcome {
            Ok((state, path)) => {
                let intent = state.intent().unwrap_or(Intent::Unknown);
                self.metrics.record_intent(intent);
                info!(
                    query,
                    %intent,
                    node = path.last().map(String::as_str).unwrap_or_default(),
                    "query answered"
                );
                Ok(state)
            }
            Err(err) => {
                self.metrics.inc_failure();
                warn!(query, error = %err, "assistant graph failed");
                Err(err)
            }
        }
    }

    pub async fn respond(&self, query: &str) -> Result<Reply, GraphError> {
        let state = self.ask(query).await?;
        let intent = state.intent().unwrap_or(Intent::Unknown);
        let result = state.into_result().ok_or_else(|| GraphError::ResultMissing {
            node: intent.route().node_id().to_string(),
        })?;
        Ok(Reply { intent, result })
    }
}
