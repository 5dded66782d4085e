//! Directed-graph executor for run state.
//!
//! Build a [`StateGraph`] from named nodes, plain edges and conditional
//! edges, then [`StateGraph::compile`] it into an immutable
//! [`CompiledGraph`]. Use [`START`] and [`END`] as the entry and exit
//! sentinels.
//!
//! Execution is sequential per run: a node runs to completion, its update is
//! merged through [`GraphState::apply`], then routing picks the next node.
//! Routers are pure functions of the merged state. The engine never retries;
//! the first node error aborts the run.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use super::checkpoint::Checkpointer;
use crate::error::AgentError;

/// Entry sentinel: use as `from` in `add_edge(START, first)`.
pub const START: &str = "__start__";

/// Exit sentinel: use as `to` in `add_edge(last, END)`.
pub const END: &str = "__end__";

/// Default per-invocation step limit.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// State that can absorb a node's partial update.
pub trait GraphState: Clone + Send + Sync + Debug + 'static {
    /// Partial update returned by nodes.
    type Update: Send + Debug + 'static;

    /// Merges `update` using each field's policy.
    fn apply(&mut self, update: Self::Update);
}

/// One step of a graph.
#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    /// Node name, unique within a graph.
    fn name(&self) -> &'static str;

    /// Runs the node against the current state.
    ///
    /// # Errors
    ///
    /// Any error aborts the run.
    async fn run(&self, state: &S) -> Result<S::Update, AgentError>;
}

/// Routing function: current state in, next node name (or [`END`]) out.
pub type Router<S> = Arc<dyn Fn(&S) -> &'static str + Send + Sync>;

enum Transition<S> {
    Direct(String),
    Conditional {
        router: Router<S>,
        targets: Vec<String>,
    },
}

impl<S> Clone for Transition<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Direct(to) => Self::Direct(to.clone()),
            Self::Conditional { router, targets } => Self::Conditional {
                router: Arc::clone(router),
                targets: targets.clone(),
            },
        }
    }
}

/// Per-invocation settings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Checkpoint key. No checkpoints are written when `None`.
    pub thread_id: Option<String>,
    /// Maximum node executions for this invocation.
    pub recursion_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl RunConfig {
    /// Creates a config keyed by `thread_id`.
    #[must_use]
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    /// Sets the step limit.
    #[must_use]
    pub const fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }
}

/// Emitted by [`CompiledGraph::stream`] after each node.
#[derive(Debug, Clone)]
pub struct GraphEvent<S> {
    /// Node that just completed.
    pub node: &'static str,
    /// 1-based step number within the invocation.
    pub step: usize,
    /// Merged state after the node.
    pub state: S,
}

/// Graph under construction.
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: Option<String>,
    problems: Vec<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            transitions: HashMap::new(),
            entry: None,
            problems: Vec::new(),
        }
    }

    /// Registers a node under its own name.
    pub fn add_node(&mut self, node: Arc<dyn Node<S>>) -> &mut Self {
        let name = node.name().to_string();
        if self.nodes.insert(name.clone(), node).is_some() {
            self.problems.push(format!("duplicate node: {name}"));
        }
        self
    }

    /// Adds an unconditional edge.
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        if from == START {
            if self.entry.replace(to.to_string()).is_some() {
                self.problems.push("more than one edge from START".to_string());
            }
            return self;
        }
        self.set_transition(from, Transition::Direct(to.to_string()));
        self
    }

    /// Adds a conditional edge. `router` must return one of `targets`.
    pub fn add_conditional_edges(
        &mut self,
        from: &str,
        router: Router<S>,
        targets: &[&str],
    ) -> &mut Self {
        self.set_transition(
            from,
            Transition::Conditional {
                router,
                targets: targets.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    fn set_transition(&mut self, from: &str, transition: Transition<S>) {
        if self.transitions.insert(from.to_string(), transition).is_some() {
            self.problems
                .push(format!("node has more than one outgoing rule: {from}"));
        }
    }

    /// Validates the graph and freezes it.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::GraphCompile`] if there is no entry edge, an
    /// edge names an unknown node, or a node lacks exactly one outgoing rule.
    pub fn compile(self) -> Result<CompiledGraph<S>, AgentError> {
        self.compile_inner(None)
    }

    /// Like [`StateGraph::compile`], writing state through `checkpointer`
    /// after every node of runs that carry a thread id.
    ///
    /// # Errors
    ///
    /// See [`StateGraph::compile`].
    pub fn compile_with_checkpointer(
        self,
        checkpointer: Arc<dyn Checkpointer<S>>,
    ) -> Result<CompiledGraph<S>, AgentError> {
        self.compile_inner(Some(checkpointer))
    }

    fn compile_inner(
        mut self,
        checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    ) -> Result<CompiledGraph<S>, AgentError> {
        let entry = self.entry.take().unwrap_or_default();
        if entry.is_empty() {
            self.problems.push("missing edge from START".to_string());
        } else if !self.nodes.contains_key(&entry) {
            self.problems.push(format!("entry node not found: {entry}"));
        }

        for (from, transition) in &self.transitions {
            if !self.nodes.contains_key(from) {
                self.problems.push(format!("edge from unknown node: {from}"));
            }
            let targets: Vec<&String> = match transition {
                Transition::Direct(to) => vec![to],
                Transition::Conditional { targets, .. } => targets.iter().collect(),
            };
            for to in targets {
                if to != END && !self.nodes.contains_key(to) {
                    self.problems.push(format!("edge to unknown node: {from} -> {to}"));
                }
            }
        }

        let mut missing: Vec<&String> = self
            .nodes
            .keys()
            .filter(|name| !self.transitions.contains_key(*name))
            .collect();
        missing.sort();
        for name in missing {
            self.problems.push(format!("node has no outgoing edge: {name}"));
        }

        if !self.problems.is_empty() {
            return Err(AgentError::GraphCompile {
                message: self.problems.join("; "),
            });
        }

        Ok(CompiledGraph {
            inner: Arc::new(Inner {
                nodes: self.nodes,
                transitions: self.transitions,
                entry,
                checkpointer,
            }),
        })
    }
}

struct Inner<S: GraphState> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: String,
    checkpointer: Option<Arc<dyn Checkpointer<S>>>,
}

/// Validated, immutable graph. Cheap to clone and safe to share across runs.
pub struct CompiledGraph<S: GraphState> {
    inner: Arc<Inner<S>>,
}

impl<S: GraphState> Clone for CompiledGraph<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: GraphState> CompiledGraph<S> {
    /// Runs from the entry node until [`END`] and returns the final state.
    ///
    /// # Errors
    ///
    /// Returns the first node error, [`AgentError::RecursionLimit`] when the
    /// step limit is hit, or a checkpoint failure.
    pub async fn invoke(&self, state: S, config: &RunConfig) -> Result<S, AgentError> {
        self.execute(state, config, None).await
    }

    /// Runs like [`CompiledGraph::invoke`], yielding an event per node.
    ///
    /// The stream ends after the last node; an error is yielded as the final
    /// item.
    #[must_use]
    pub fn stream(
        &self,
        state: S,
        config: RunConfig,
    ) -> ReceiverStream<Result<GraphEvent<S>, AgentError>> {
        let (tx, rx) = mpsc::channel(32);
        let graph = self.clone();
        tokio::spawn(async move {
            if let Err(e) = graph.execute(state, &config, Some(&tx)).await {
                let _ = tx.send(Err(e)).await;
            }
        });
        ReceiverStream::new(rx)
    }

    /// Loads the latest checkpoint of `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Checkpoint`] on backend failure.
    pub async fn checkpoint(&self, thread_id: &str) -> Result<Option<S>, AgentError> {
        match &self.inner.checkpointer {
            Some(cp) => Ok(cp.get(thread_id).await?.map(|c| c.state)),
            None => Ok(None),
        }
    }

    async fn execute(
        &self,
        mut state: S,
        config: &RunConfig,
        events: Option<&mpsc::Sender<Result<GraphEvent<S>, AgentError>>>,
    ) -> Result<S, AgentError> {
        let mut current = self.inner.entry.clone();
        let mut step = 0usize;

        while current != END {
            if step >= config.recursion_limit {
                warn!(limit = config.recursion_limit, "graph step limit reached");
                return Err(AgentError::RecursionLimit {
                    limit: config.recursion_limit,
                });
            }
            step += 1;

            let node = self.inner.nodes.get(&current).ok_or_else(|| {
                AgentError::Orchestration {
                    message: format!("node not found: {current}"),
                }
            })?;

            debug!(node = node.name(), step, "node start");
            let update = node.run(&state).await?;
            state.apply(update);
            debug!(node = node.name(), step, "node complete");

            if let (Some(cp), Some(thread_id)) = (&self.inner.checkpointer, &config.thread_id) {
                cp.put(thread_id, node.name(), &state).await?;
            }

            if let Some(tx) = events {
                let event = GraphEvent {
                    node: node.name(),
                    step,
                    state: state.clone(),
                };
                // receiver dropped means nobody is listening; keep running
                let _ = tx.send(Ok(event)).await;
            }

            current = self.next(&current, &state)?;
            debug!(from = node.name(), to = %current, "route");
        }

        Ok(state)
    }

    fn next(&self, from: &str, state: &S) -> Result<String, AgentError> {
        match self.inner.transitions.get(from) {
            Some(Transition::Direct(to)) => Ok(to.clone()),
            Some(Transition::Conditional { router, targets }) => {
                let chosen = router(state);
                if targets.iter().any(|t| t == chosen) {
                    Ok(chosen.to_string())
                } else {
                    Err(AgentError::Orchestration {
                        message: format!("router for {from} chose undeclared target {chosen}"),
                    })
                }
            }
            None => Err(AgentError::Orchestration {
                message: format!("no outgoing edge from {from}"),
            }),
        }
    }
}

impl<S: GraphState> Debug for CompiledGraph<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut nodes: Vec<&String> = self.inner.nodes.keys().collect();
        nodes.sort();
        f.debug_struct("CompiledGraph")
            .field("entry", &self.inner.entry)
            .field("nodes", &nodes)
            .field("checkpointed", &self.inner.checkpointer.is_some())
            .finish()
    }
}
