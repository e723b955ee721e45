use crate::{CheckpointStore, Logger, NodeError, TracingLogger};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Results of successfully completed nodes, keyed by node name.
///
/// Only the engine records entries; node bodies read. An entry exists only
/// once its node has terminated successfully.
#[derive(Clone, Default)]
pub struct OutputStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, node: &str) -> Option<Value> {
        self.inner.read().await.get(node).cloned()
    }

    pub async fn contains(&self, node: &str) -> bool {
        self.inner.read().await.contains_key(node)
    }

    /// Engine-side write. Node bodies must not call this.
    pub async fn record(&self, node: &str, value: Value) {
        self.inner.write().await.insert(node.to_string(), value);
    }

    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().await.clone()
    }
}

/// Execution context shared by every node of one run
#[derive(Clone)]
pub struct RunContext {
    run_id: Option<String>,
    logger: Arc<dyn Logger>,
    outputs: OutputStore,
    checkpoint: Option<Arc<dyn CheckpointStore>>,
    node: Option<String>,
    cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            run_id: None,
            logger,
            outputs: OutputStore::new(),
            checkpoint: None,
            node: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_checkpoint(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint = Some(store);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    pub fn checkpoint(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpoint.as_ref()
    }

    /// Name of the node this context was handed to, if any.
    pub fn node_name(&self) -> Option<&str> {
        self.node.as_deref()
    }

    /// Signalled when the engine stops waiting on the current attempt.
    ///
    /// Work is never forcibly stopped; bodies that want to give up early on
    /// a timeout can select on this token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Get a dependency's output or return error
    pub async fn require_output(&self, node: &str) -> Result<Value, NodeError> {
        self.outputs
            .get(node)
            .await
            .ok_or_else(|| NodeError::MissingOutput(node.to_string()))
    }

    /// Get a dependency's output decoded into `T`
    pub async fn output_as<T: DeserializeOwned>(&self, node: &str) -> Result<T, NodeError> {
        let value = self.require_output(node).await?;
        serde_json::from_value(value).map_err(|e| NodeError::InvalidOutput {
            node: node.to_string(),
            reason: e.to_string(),
        })
    }

    /// Fresh per-run copy: same collaborators, empty outputs.
    pub fn fork_run(&self, run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            logger: Arc::clone(&self.logger),
            outputs: OutputStore::new(),
            checkpoint: self.checkpoint.clone(),
            node: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Copy handed to a single attempt of `node`.
    pub fn for_attempt(&self, node: &str, cancellation: CancellationToken) -> Self {
        Self {
            node: Some(node.to_string()),
            cancellation,
            ..self.clone()
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}
