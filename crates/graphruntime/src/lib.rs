//! Graph execution runtime
//!
//! Validates a node set, plans it into dependency levels and runs each level
//! with bounded parallelism, retrying, timing out, falling back and
//! compensating per node.

mod dag;
mod executor;
mod loader;
mod options;
mod registry;
mod result;
mod runner;
mod runtime;

pub use dag::{topological_groups, validate, DependencyGraph};
pub use executor::{run_graph, run_graph_outputs, GraphExecutor};
pub use loader::load_nodes;
pub use options::{FailureHook, RunHooks, RunOptions, StartHook, SuccessHook};
pub use registry::{ConfigField, WorkFactory, WorkKindInfo, WorkRegistry};
pub use result::{NodeStatus, RunResult};
pub use runner::{AttemptPolicy, NodeOutcome};
pub use runtime::{GraphRuntime, RuntimeConfig};
