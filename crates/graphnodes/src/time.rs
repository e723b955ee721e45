use async_trait::async_trait;
use graphcore::{NodeError, NodeResult, NodeSpec, RunContext, Work};
use graphruntime::{ConfigField, WorkFactory, WorkKindInfo};
use serde_json::json;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Waits for a fixed duration. Gives up early if the engine stops waiting.
pub struct DelayWork {
    delay_ms: u64,
}

#[async_trait]
impl Work for DelayWork {
    async fn run(&self, ctx: RunContext) -> NodeResult {
        tokio::select! {
            _ = sleep(Duration::from_millis(self.delay_ms)) => {
                Ok(json!({ "delayed_ms": self.delay_ms }))
            }
            _ = ctx.cancellation().cancelled() => Err(NodeError::Cancelled),
        }
    }
}

pub struct DelayWorkFactory;

impl WorkFactory for DelayWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        // Default to 1 second if not specified
        let delay_ms = spec.config_u64("delay_ms").unwrap_or(1000);
        Ok(Arc::new(DelayWork { delay_ms }))
    }

    fn kind(&self) -> &str {
        "time.delay"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Delay for the configured milliseconds".to_string(),
            category: "time".to_string(),
            config: vec![ConfigField::new("delay_ms", "Milliseconds to wait (default 1000)", false)],
        }
    }
}
