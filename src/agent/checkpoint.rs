//! Run-state checkpoints keyed by thread id.
//!
//! A compiled graph with a checkpointer writes the merged state through
//! after every node when the run carries a thread id.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AgentError;

/// Latest saved state of one thread.
#[derive(Debug, Clone)]
pub struct Checkpoint<S> {
    /// State after the most recent node.
    pub state: S,
    /// Node that produced this state.
    pub node: String,
    /// Number of writes recorded for the thread.
    pub version: u64,
}

/// Stores and loads checkpoints.
#[async_trait]
pub trait Checkpointer<S>: Send + Sync
where
    S: Clone + Send + Sync + 'static,
{
    /// Saves `state` as the latest checkpoint of `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Checkpoint`] if the backend rejects the write.
    async fn put(&self, thread_id: &str, node: &str, state: &S) -> Result<(), AgentError>;

    /// Loads the latest checkpoint of `thread_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Checkpoint`] if the backend cannot be read.
    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, AgentError>;
}

/// In-memory checkpointer. Contents are lost when the process exits.
#[derive(Debug)]
pub struct MemoryCheckpointer<S> {
    threads: RwLock<HashMap<String, Checkpoint<S>>>,
}

impl<S> Default for MemoryCheckpointer<S> {
    fn default() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl<S> MemoryCheckpointer<S> {
    /// Creates an empty checkpointer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<S> Checkpointer<S> for MemoryCheckpointer<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(&self, thread_id: &str, node: &str, state: &S) -> Result<(), AgentError> {
        if thread_id.is_empty() {
            return Err(AgentError::Checkpoint {
                message: "thread id must not be empty".to_string(),
            });
        }
        let mut threads = self.threads.write().await;
        let version = threads.get(thread_id).map_or(1, |c| c.version + 1);
        threads.insert(
            thread_id.to_string(),
            Checkpoint {
                state: state.clone(),
                node: node.to_string(),
                version,
            },
        );
        Ok(())
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, AgentError> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }
}
