use crate::runner::NodeOutcome;
use graphcore::{NodeError, Value};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// Terminal status of a node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Result of a graph run.
///
/// `succeeded`, `failed` and `skipped` partition the node set.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub outputs: HashMap<String, Value>,
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, NodeError>,
    pub skipped: BTreeSet<String>,
    /// Invocations of each attempted node's work; zero for checkpoint hits
    pub attempts: BTreeMap<String, u32>,
    pub levels: Vec<Vec<String>>,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn total_nodes(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn output(&self, node: &str) -> Option<&Value> {
        self.outputs.get(node)
    }

    pub fn output_as<T: DeserializeOwned>(&self, node: &str) -> Result<T, NodeError> {
        let value = self
            .outputs
            .get(node)
            .ok_or_else(|| NodeError::MissingOutput(node.to_string()))?;
        T::deserialize(value).map_err(|e| NodeError::InvalidOutput {
            node: node.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn status(&self, node: &str) -> Option<NodeStatus> {
        if self.succeeded.contains(node) {
            Some(NodeStatus::Succeeded)
        } else if self.failed.contains_key(node) {
            Some(NodeStatus::Failed)
        } else if self.skipped.contains(node) {
            Some(NodeStatus::Skipped)
        } else {
            None
        }
    }

    pub fn into_outputs(self) -> HashMap<String, Value> {
        self.outputs
    }
}

/// Collects node outcomes as a run progresses
#[derive(Debug, Default)]
pub(crate) struct RunAggregator {
    succeeded: BTreeSet<String>,
    failed: BTreeMap<String, NodeError>,
    skipped: BTreeSet<String>,
    attempts: BTreeMap<String, u32>,
}

impl RunAggregator {
    pub(crate) fn record(&mut self, node: String, outcome: NodeOutcome) {
        match outcome {
            NodeOutcome::Succeeded { attempts, .. } => {
                self.attempts.insert(node.clone(), attempts);
                self.succeeded.insert(node);
            }
            NodeOutcome::Failed { reason, attempts } => {
                self.attempts.insert(node.clone(), attempts);
                self.failed.insert(node, reason);
            }
        }
    }

    pub(crate) fn skip(&mut self, node: &str) {
        self.skipped.insert(node.to_string());
    }

    pub(crate) fn is_succeeded(&self, node: &str) -> bool {
        self.succeeded.contains(node)
    }

    pub(crate) fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        (self.succeeded.len(), self.failed.len(), self.skipped.len())
    }

    pub(crate) fn finish(
        self,
        run_id: String,
        outputs: HashMap<String, Value>,
        levels: Vec<Vec<String>>,
        elapsed: Duration,
    ) -> RunResult {
        RunResult {
            run_id,
            outputs,
            succeeded: self.succeeded,
            failed: self.failed,
            skipped: self.skipped,
            attempts: self.attempts,
            levels,
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}
