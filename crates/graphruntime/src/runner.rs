use crate::options::RunHooks;
use graphcore::{Node, NodeError, NodeResult, RunContext, RunEmitter, RunSettings, SuccessSource, Value};
use futures::future::{BoxFuture, FutureExt};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Terminal state of one node
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    Succeeded {
        value: Value,
        source: SuccessSource,
        attempts: u32,
        elapsed: Duration,
    },
    Failed {
        reason: NodeError,
        attempts: u32,
    },
}

/// Retry and deadline knobs after applying run-wide defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub exponential_backoff: bool,
    pub timeout_ms: Option<u64>,
}

impl AttemptPolicy {
    pub fn resolve(node: &Node, settings: &RunSettings) -> Self {
        Self {
            max_retries: node.max_retries.unwrap_or(settings.default_retries),
            retry_delay: Duration::from_millis(
                node.retry_delay_ms.unwrap_or(settings.default_retry_delay_ms),
            ),
            exponential_backoff: node
                .exponential_backoff
                .unwrap_or(settings.default_exponential_backoff),
            timeout_ms: node.timeout_ms.or(settings.timeout_ms),
        }
    }

    /// Delay before the attempt following `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        if !self.exponential_backoff {
            return self.retry_delay;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_delay.saturating_mul(factor)
    }
}

/// Drives one node from `Pending` to a terminal state.
///
/// Each attempt runs on its own task. When the deadline passes the engine
/// stops waiting, cancels the attempt's token and detaches the task; the
/// work keeps running until it notices or finishes, and a late result is
/// dropped.
pub(crate) struct NodeRunner {
    node: Node,
    ctx: RunContext,
    policy: AttemptPolicy,
    hooks: RunHooks,
    emitter: RunEmitter,
}

impl NodeRunner {
    pub(crate) fn new(
        node: Node,
        ctx: RunContext,
        settings: &RunSettings,
        hooks: RunHooks,
        emitter: RunEmitter,
    ) -> Self {
        let policy = AttemptPolicy::resolve(&node, settings);
        Self {
            node,
            ctx,
            policy,
            hooks,
            emitter,
        }
    }

    pub(crate) async fn run(self) -> NodeOutcome {
        let started = Instant::now();
        let name = self.node.name();

        self.ctx.logger().info(
            &format!("START {}", name),
            Some(&json!({ "run_id": self.ctx.run_id() })),
        );
        self.hooks.node_started(name);
        self.emitter.node_started(name);

        if let Some(value) = self.checkpointed().await {
            return self.succeed(value, SuccessSource::Checkpoint, 0, started).await;
        }

        let mut attempt: u32 = 0;
        let last_error = loop {
            let work = Arc::clone(self.node.work());
            match self.invoke(move |ctx| async move { work.run(ctx).await }.boxed()).await {
                Ok(value) => {
                    return self.succeed(value, SuccessSource::Work, attempt + 1, started).await;
                }
                Err(error) => {
                    if attempt >= self.policy.max_retries || !self.node.should_retry(&error) {
                        break error;
                    }
                    let delay = self.policy.backoff(attempt);
                    attempt += 1;
                    self.ctx.logger().info(
                        &format!("RETRY {}", name),
                        Some(&json!({
                            "run_id": self.ctx.run_id(),
                            "attempt": attempt,
                            "delay_ms": delay.as_millis() as u64,
                            "error": error.to_string(),
                        })),
                    );
                    self.emitter
                        .node_retrying(name, attempt, delay.as_millis() as u64, &error.to_string());
                    tokio::time::sleep(delay).await;
                }
            }
        };
        let attempts = attempt + 1;

        let reason = match self.node.fallback() {
            Some(fallback) => {
                let fallback = Arc::clone(fallback);
                let primary = last_error.clone();
                match self.invoke(move |ctx| fallback(ctx, primary)).await {
                    Ok(value) => {
                        return self
                            .succeed(value, SuccessSource::Fallback, attempts, started)
                            .await;
                    }
                    Err(error) => NodeError::FallbackFailed {
                        primary: Box::new(last_error),
                        fallback: Box::new(error),
                    },
                }
            }
            None => last_error,
        };

        self.fail(reason, attempts, started).await
    }

    async fn checkpointed(&self) -> Option<Value> {
        if !self.node.use_checkpoint {
            return None;
        }
        let store = self.ctx.checkpoint()?;
        match store.get(self.node.name()).await {
            Ok(value) => value,
            Err(e) => {
                self.ctx.logger().error(
                    &format!("CHECKPOINT_FAIL {}", self.node.name()),
                    Some(&json!({ "run_id": self.ctx.run_id(), "error": e.to_string() })),
                );
                None
            }
        }
    }

    /// Run one invocation under the node's deadline
    async fn invoke<F>(&self, make: F) -> NodeResult
    where
        F: FnOnce(RunContext) -> BoxFuture<'static, NodeResult>,
    {
        let token = CancellationToken::new();
        let ctx = self.ctx.for_attempt(self.node.name(), token.clone());
        let handle = tokio::spawn(make(ctx));

        let joined = match self.policy.timeout_ms {
            Some(timeout_ms) => {
                match tokio::time::timeout(Duration::from_millis(timeout_ms), handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        token.cancel();
                        return Err(NodeError::Timeout { timeout_ms });
                    }
                }
            }
            None => handle.await,
        };

        joined.unwrap_or_else(|e| Err(NodeError::WorkFailed(format!("task aborted: {}", e))))
    }

    async fn succeed(
        &self,
        value: Value,
        source: SuccessSource,
        attempts: u32,
        started: Instant,
    ) -> NodeOutcome {
        let name = self.node.name();
        self.ctx.outputs().record(name, value.clone()).await;

        if self.node.use_checkpoint && source != SuccessSource::Checkpoint {
            if let Some(store) = self.ctx.checkpoint() {
                if let Err(e) = store.set(name, value.clone()).await {
                    self.ctx.logger().error(
                        &format!("CHECKPOINT_FAIL {}", name),
                        Some(&json!({ "run_id": self.ctx.run_id(), "error": e.to_string() })),
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        self.ctx.logger().info(
            &format!("DONE {}", name),
            Some(&json!({
                "run_id": self.ctx.run_id(),
                "elapsed_ms": elapsed_ms,
                "source": source.as_str(),
                "attempts": attempts,
            })),
        );
        self.hooks.node_succeeded(name, &value, elapsed);
        self.emitter.node_succeeded(name, source, elapsed_ms);

        NodeOutcome::Succeeded {
            value,
            source,
            attempts,
            elapsed,
        }
    }

    async fn fail(&self, reason: NodeError, attempts: u32, started: Instant) -> NodeOutcome {
        let name = self.node.name();

        if let Some(compensate) = self.node.compensation() {
            let ctx = self.ctx.for_attempt(name, CancellationToken::new());
            let compensation = tokio::spawn(compensate(ctx, reason.clone()))
                .await
                .unwrap_or_else(|e| Err(NodeError::CompensationFailed(e.to_string())));
            if let Err(e) = compensation {
                tracing::warn!(node = %name, error = %e, "compensation failed");
                self.ctx.logger().error(
                    &format!("COMPENSATE_FAIL {}", name),
                    Some(&json!({ "run_id": self.ctx.run_id(), "error": e.to_string() })),
                );
            }
        }

        self.ctx.logger().error(
            &format!("FAIL {}", name),
            Some(&json!({
                "run_id": self.ctx.run_id(),
                "error": reason.to_string(),
                "attempts": attempts,
                "elapsed_ms": started.elapsed().as_millis() as u64,
            })),
        );
        self.hooks.node_failed(name, &reason);
        self.emitter.node_failed(name, &reason.to_string());

        NodeOutcome::Failed { reason, attempts }
    }
}
