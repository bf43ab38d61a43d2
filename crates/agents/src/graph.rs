//! A small state-machine runner: nodes, direct and conditional edges, finish points.
//!
//! Build with [`StateGraph`], validate with [`StateGraph::compile`], run with
//! [`CompiledGraph::invoke`]. Nodes run one at a time; each receives the whole
//! state and hands it back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use novacite_core::StateError;
use thiserror::Error;
use tracing::debug;

/// State carried through a graph run.
pub trait GraphState: Send + Sync + 'static {
    /// Checked after a finish point has run.
    fn is_complete(&self) -> bool;
}

/// One step of a graph: state in, state out.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: GraphState,
{
    async fn run(&self, state: S) -> anyhow::Result<S>;
}

type Router<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

enum Transition<S> {
    Direct(String),
    Conditional {
        router: Router<S>,
        targets: HashSet<String>,
    },
}

impl<S> Transition<S> {
    fn targets(&self) -> Vec<&String> {
        match self {
            Transition::Direct(to) => vec![to],
            Transition::Conditional { targets, .. } => targets.iter().collect(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompilationError {
    #[error("graph has no entry point")]
    MissingEntryPoint,
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("node {0} has more than one outgoing route")]
    DuplicateRoute(String),
    #[error("node {0} has no outgoing route and is not a finish point")]
    DeadEnd(String),
    #[error("finish point {0} has an outgoing route")]
    FinishHasRoute(String),
    #[error("conditional edges from {0} declare no targets")]
    NoTargets(String),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("node {node} failed: {source}")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("node {node} violated state rules: {source}")]
    State {
        node: String,
        #[source]
        source: StateError,
    },
    #[error("finish point {node} completed without a result")]
    ResultMissing { node: String },
    #[error("graph exceeded {limit} steps")]
    StepLimit { limit: usize },
    #[error("router at {from} chose undeclared node {target}")]
    UnknownNode { from: String, target: String },
}

impl GraphError {
    fn from_node(node: &str, err: anyhow::Error) -> Self {
        match err.downcast::<StateError>() {
            Ok(source) => GraphError::State {
                node: node.to_string(),
                source,
            },
            Err(source) => GraphError::Node {
                node: node.to_string(),
                source,
            },
        }
    }
}

pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: Vec<(String, Transition<S>)>,
    entry: Option<String>,
    finish: HashSet<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            transitions: Vec::new(),
            entry: None,
            finish: HashSet::new(),
        }
    }

    /// Replaces any node already registered under `id`.
    pub fn add_node(&mut self, id: impl Into<String>, node: Arc<dyn Node<S>>) -> &mut Self {
        self.nodes.insert(id.into(), node);
        self
    }

    pub fn set_entry_point(&mut self, id: impl Into<String>) -> &mut Self {
        self.entry = Some(id.into());
        self
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.transitions
            .push((from.into(), Transition::Direct(to.into())));
        self
    }

    /// `router` must return one of `targets`; anything else fails the run.
    pub fn add_conditional_edges<F, I, T>(
        &mut self,
        from: impl Into<String>,
        router: F,
        targets: I,
    ) -> &mut Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.transitions.push((
            from.into(),
            Transition::Conditional {
                router: Arc::new(router),
                targets: targets.into_iter().map(Into::into).collect(),
            },
        ));
        self
    }

    pub fn set_finish_point(&mut self, id: impl Into<String>) -> &mut Self {
        self.finish.insert(id.into());
        self
    }

    pub fn compile(self) -> Result<CompiledGraph<S>, CompilationError> {
        let entry = self.entry.ok_or(CompilationError::MissingEntryPoint)?;
        let known = |id: &String| {
            if self.nodes.contains_key(id) {
                Ok(())
            } else {
                Err(CompilationError::NodeNotFound(id.clone()))
            }
        };

        known(&entry)?;
        for id in &self.finish {
            known(id)?;
        }

        let mut edges = HashMap::new();
        for (from, transition) in self.transitions {
            known(&from)?;
            if let Transition::Conditional { targets, .. } = &transition {
                if targets.is_empty() {
                    return Err(CompilationError::NoTargets(from));
                }
            }
            for target in transition.targets() {
                known(target)?;
            }
            if self.finish.contains(&from) {
                return Err(CompilationError::FinishHasRoute(from));
            }
            if edges.contains_key(&from) {
                return Err(CompilationError::DuplicateRoute(from));
            }
            edges.insert(from, transition);
        }

        let mut ids = self.nodes.keys().collect::<Vec<_>>();
        ids.sort();
        for id in ids {
            if !self.finish.contains(id) && !edges.contains_key(id) {
                return Err(CompilationError::DeadEnd(id.clone()));
            }
        }

        Ok(CompiledGraph {
            step_limit: self.nodes.len(),
            nodes: self.nodes,
            edges,
            entry,
            finish: self.finish,
        })
    }
}

/// Immutable, validated graph. Safe to share across concurrent runs.
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Transition<S>>,
    entry: String,
    finish: HashSet<String>,
    step_limit: usize,
}

impl<S: GraphState> fmt::Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut nodes = self.nodes.keys().collect::<Vec<_>>();
        nodes.sort();
        f.debug_struct("CompiledGraph")
            .field("entry", &self.entry)
            .field("nodes", &nodes)
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl<S: GraphState> CompiledGraph<S> {
    pub async fn invoke(&self, state: S) -> Result<S, GraphError> {
        self.invoke_traced(state).await.map(|(state, _)| state)
    }

    /// Like [`invoke`](Self::invoke), also returning the ids of the nodes that ran.
    pub async fn invoke_traced(&self, mut state: S) -> Result<(S, Vec<String>), GraphError> {
        let mut current = self.entry.clone();
        let mut path = Vec::new();

        for _ in 0..self.step_limit {
            let node = self.nodes.get(&current).ok_or_else(|| GraphError::UnknownNode {
                from: path.last().cloned().unwrap_or_default(),
                target: current.clone(),
            })?;

            debug!(node = %current, "running graph node");
            state = node
                .run(state)
                .await
                .map_err(|err| GraphError::from_node(&current, err))?;
            path.push(current.clone());

            if self.finish.contains(&current) {
                if !state.is_complete() {
                    return Err(GraphError::ResultMissing { node: current });
                }
                return Ok((state, path));
            }

            current = match self.edges.get(&current) {
                Some(Transition::Direct(to)) => to.clone(),
                Some(Transition::Conditional { router, targets }) => {
                    let target = router(&state);
                    if !targets.contains(&target) {
                        return Err(GraphError::UnknownNode { from: current, target });
                    }
                    target
                }
                None => {
                    return Err(GraphError::UnknownNode {
                        from: current,
                        target: String::new(),
                    })
                }
            };
        }

        Err(GraphError::StepLimit {
            limit: self.step_limit,
        })
    }
}
