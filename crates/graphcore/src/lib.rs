//! Core abstractions for the graph engine
//!
//! This crate provides the node model, the per-run context and its
//! collaborators (logger, outputs, checkpoint store), the error taxonomy and
//! run events. Scheduling lives in `graphruntime`.

mod checkpoint;
mod context;
mod error;
pub mod events;
mod graph;
mod logger;
mod node;

pub use checkpoint::{CheckpointStore, JsonFileCheckpoint, MemoryCheckpoint};
pub use context::{OutputStore, RunContext};
pub use error::{CheckpointError, ErrorKind, GraphError, NodeError};
pub use events::*;
pub use graph::{GraphSpec, NodeSpec, RetryPolicy, RunSettings};
pub use logger::{Logger, TracingLogger};
pub use node::{CompensateFn, FallbackFn, FnWork, Node, NodeResult, RetryPredicate, Work};

pub use serde_json::Value;
