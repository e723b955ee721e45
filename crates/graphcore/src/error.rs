use std::collections::BTreeMap;
use thiserror::Error;

/// Run-fatal errors. These surface before any node executes.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("Cyclic dependency detected at node '{node}'")]
    CycleDetected { node: String },

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Unknown work kind: {0}")]
    UnknownWorkKind(String),

    #[error("Invalid graph: {0}")]
    Invalid(String),

    #[error("{} node(s) failed: {}", failed.len(), failed.keys().cloned().collect::<Vec<_>>().join(", "))]
    RunFailed { failed: BTreeMap<String, NodeError> },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Work failed: {0}")]
    WorkFailed(String),

    #[error("Fallback failed: {fallback} (after: {primary})")]
    FallbackFailed {
        primary: Box<NodeError>,
        fallback: Box<NodeError>,
    },

    #[error("Compensation failed: {0}")]
    CompensationFailed(String),

    #[error("Missing output of node '{0}'")]
    MissingOutput(String),

    #[error("Invalid output of node '{node}': {reason}")]
    InvalidOutput { node: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Coarse classification of a [`NodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    WorkFailure,
    FallbackFailure,
    CompensationFailure,
}

impl NodeError {
    pub fn work(message: impl Into<String>) -> Self {
        NodeError::WorkFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NodeError::Timeout { .. } => ErrorKind::Timeout,
            NodeError::FallbackFailed { .. } => ErrorKind::FallbackFailure,
            NodeError::CompensationFailed(_) => ErrorKind::CompensationFailure,
            _ => ErrorKind::WorkFailure,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NodeError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classifies_every_failure() {
        let primary = NodeError::work("primary");
        let cases = [
            (NodeError::Timeout { timeout_ms: 10 }, ErrorKind::Timeout),
            (primary.clone(), ErrorKind::WorkFailure),
            (
                NodeError::FallbackFailed {
                    primary: Box::new(primary.clone()),
                    fallback: Box::new(NodeError::Timeout { timeout_ms: 10 }),
                },
                ErrorKind::FallbackFailure,
            ),
            (NodeError::CompensationFailed("rollback".into()), ErrorKind::CompensationFailure),
            (NodeError::MissingOutput("a".into()), ErrorKind::WorkFailure),
            (
                NodeError::InvalidOutput {
                    node: "a".into(),
                    reason: "not a number".into(),
                },
                ErrorKind::WorkFailure,
            ),
            (NodeError::Configuration("bad".into()), ErrorKind::WorkFailure),
            (NodeError::Cancelled, ErrorKind::WorkFailure),
        ];

        for (error, kind) in cases {
            assert_eq!(error.kind(), kind, "{}", error);
        }
        assert!(NodeError::Timeout { timeout_ms: 1 }.is_timeout());
        assert!(!primary.is_timeout());
    }
}
