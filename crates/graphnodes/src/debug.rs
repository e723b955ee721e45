use async_trait::async_trait;
use graphcore::{NodeError, NodeResult, NodeSpec, RunContext, Work};
use graphruntime::{ConfigField, WorkFactory, WorkKindInfo};
use serde_json::json;
use std::sync::Arc;

/// Logs a message through the run logger and returns it
pub struct EchoWork {
    message: String,
}

#[async_trait]
impl Work for EchoWork {
    async fn run(&self, ctx: RunContext) -> NodeResult {
        let node = ctx.node_name().unwrap_or("?");
        ctx.logger()
            .info(&format!("DEBUG [{}]: {}", node, self.message), None);

        Ok(json!({ "message": self.message }))
    }
}

pub struct EchoWorkFactory;

impl WorkFactory for EchoWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        let message = spec.config_str("message").unwrap_or("(no message)").to_string();
        Ok(Arc::new(EchoWork { message }))
    }

    fn kind(&self) -> &str {
        "debug.echo"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Logs a message and returns it".to_string(),
            category: "debug".to_string(),
            config: vec![ConfigField::new("message", "Text to log", false)],
        }
    }
}
