use crate::registry::WorkRegistry;
use graphcore::{GraphError, GraphSpec, Node, NodeSpec};

/// Build runnable nodes from a graph definition
pub fn load_nodes(spec: &GraphSpec, registry: &WorkRegistry) -> Result<Vec<Node>, GraphError> {
    spec.nodes
        .iter()
        .map(|node| build_node(node, registry))
        .collect()
}

fn build_node(spec: &NodeSpec, registry: &WorkRegistry) -> Result<Node, GraphError> {
    let work = registry.create_work(spec)?;

    let mut node = Node::with_work(&spec.name, work)
        .depends_on(spec.depends_on.iter().cloned())
        .with_checkpoint(spec.use_checkpoint);

    if let Some(policy) = spec.retry {
        node = node.with_retry_policy(policy);
    }
    if let Some(timeout_ms) = spec.timeout_ms {
        node = node.with_timeout(timeout_ms);
    }
    if let Some(value) = &spec.fallback_value {
        node = node.with_fallback_value(value.clone());
    }

    Ok(node)
}
