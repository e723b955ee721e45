use async_trait::async_trait;
use graphcore::{NodeError, NodeResult, NodeSpec, RunContext, Work};
use graphruntime::{ConfigField, WorkFactory, WorkKindInfo};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Gathers the outputs of other nodes into one object keyed by node name
pub struct CollectWork {
    from: Vec<String>,
}

#[async_trait]
impl Work for CollectWork {
    async fn run(&self, ctx: RunContext) -> NodeResult {
        let mut collected = Map::new();
        for name in &self.from {
            collected.insert(name.clone(), ctx.require_output(name).await?);
        }
        Ok(Value::Object(collected))
    }
}

pub struct CollectWorkFactory;

impl WorkFactory for CollectWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        let from = match spec.config.get("from") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        NodeError::Configuration(format!("'from' entries must be strings, got {}", item))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(NodeError::Configuration(format!(
                    "'from' must be an array of node names, got {}",
                    other
                )))
            }
            None => spec.depends_on.clone(),
        };

        // Reading a node that is not a declared dependency has no ordering guarantee
        if let Some(undeclared) = from.iter().find(|name| !spec.depends_on.contains(name)) {
            return Err(NodeError::Configuration(format!(
                "'{}' is not a dependency of '{}'",
                undeclared, spec.name
            )));
        }

        Ok(Arc::new(CollectWork { from }))
    }

    fn kind(&self) -> &str {
        "transform.collect"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Merge dependency outputs into one object".to_string(),
            category: "transform".to_string(),
            config: vec![ConfigField::new(
                "from",
                "Dependencies to collect (default: all)",
                false,
            )],
        }
    }
}
