use async_trait::async_trait;
use graphcore::{NodeError, NodeResult, NodeSpec, RunContext, Work};
use graphruntime::{ConfigField, WorkFactory, WorkKindInfo};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fails its first `failures` invocations, then succeeds
pub struct FlakyWork {
    failures: u64,
    calls: AtomicU64,
}

#[async_trait]
impl Work for FlakyWork {
    async fn run(&self, _ctx: RunContext) -> NodeResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(NodeError::WorkFailed(format!(
                "injected failure {} of {}",
                call, self.failures
            )));
        }
        Ok(json!({ "attempts": call }))
    }
}

pub struct FlakyWorkFactory;

impl WorkFactory for FlakyWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        Ok(Arc::new(FlakyWork {
            failures: spec.config_u64("failures").unwrap_or(1),
            calls: AtomicU64::new(0),
        }))
    }

    fn kind(&self) -> &str {
        "fault.flaky"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Fail the first N invocations, then succeed".to_string(),
            category: "fault".to_string(),
            config: vec![ConfigField::new("failures", "Invocations to fail (default 1)", false)],
        }
    }
}

/// Always fails
pub struct FailWork {
    message: String,
}

#[async_trait]
impl Work for FailWork {
    async fn run(&self, _ctx: RunContext) -> NodeResult {
        Err(NodeError::WorkFailed(self.message.clone()))
    }
}

pub struct FailWorkFactory;

impl WorkFactory for FailWorkFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError> {
        let message = spec.config_str("message").unwrap_or("injected failure").to_string();
        Ok(Arc::new(FailWork { message }))
    }

    fn kind(&self) -> &str {
        "fault.fail"
    }

    fn info(&self) -> WorkKindInfo {
        WorkKindInfo {
            description: "Always fail with the configured message".to_string(),
            category: "fault".to_string(),
            config: vec![ConfigField::new("message", "Failure message", false)],
        }
    }
}
