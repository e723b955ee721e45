use crate::{NodeError, RetryPolicy, RunContext};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a single work invocation
pub type NodeResult = Result<Value, NodeError>;

/// Decides whether a failed attempt is worth retrying
pub type RetryPredicate = Arc<dyn Fn(&NodeError) -> bool + Send + Sync>;

/// Alternate work invoked with the last error once retries are exhausted
pub type FallbackFn = Arc<dyn Fn(RunContext, NodeError) -> BoxFuture<'static, NodeResult> + Send + Sync>;

/// Best-effort cleanup invoked with the terminal failure reason
pub type CompensateFn =
    Arc<dyn Fn(RunContext, NodeError) -> BoxFuture<'static, Result<(), NodeError>> + Send + Sync>;

/// Core trait that all node bodies implement
#[async_trait]
pub trait Work: Send + Sync {
    /// Execute one attempt with the given context
    async fn run(&self, ctx: RunContext) -> NodeResult;
}

/// Adapts an async closure into [`Work`].
pub struct FnWork<F>(F);

impl<F> FnWork<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Work for FnWork<F>
where
    F: Fn(RunContext) -> Fut + Send + Sync,
    Fut: Future<Output = NodeResult> + Send + 'static,
{
    async fn run(&self, ctx: RunContext) -> NodeResult {
        (self.0)(ctx).await
    }
}

/// A named unit of work with its dependencies and execution policy.
///
/// Policy knobs left unset fall back to the run's settings, and from there
/// to "no retry, no timeout".
#[derive(Clone)]
pub struct Node {
    name: String,
    dependencies: Vec<String>,
    work: Arc<dyn Work>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub exponential_backoff: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub use_checkpoint: bool,
    should_retry: Option<RetryPredicate>,
    fallback: Option<FallbackFn>,
    compensate: Option<CompensateFn>,
}

impl Node {
    pub fn new(name: impl Into<String>, work: impl Work + 'static) -> Self {
        Self::with_work(name, Arc::new(work))
    }

    pub fn with_work(name: impl Into<String>, work: Arc<dyn Work>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            work,
            max_retries: None,
            retry_delay_ms: None,
            exponential_backoff: None,
            timeout_ms: None,
            use_checkpoint: false,
            should_retry: None,
            fallback: None,
            compensate: None,
        }
    }

    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult> + Send + 'static,
    {
        Self::new(name, FnWork::new(f))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn work(&self) -> &Arc<dyn Work> {
        &self.work
    }

    pub fn should_retry(&self, error: &NodeError) -> bool {
        self.should_retry.as_ref().map_or(true, |pred| pred(error))
    }

    pub fn fallback(&self) -> Option<&FallbackFn> {
        self.fallback.as_ref()
    }

    pub fn compensation(&self) -> Option<&CompensateFn> {
        self.compensate.as_ref()
    }

    /// Add dependencies; names already present are ignored.
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.dependencies.contains(&name) {
                self.dependencies.push(name);
            }
        }
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry_delay(mut self, delay_ms: u64) -> Self {
        self.retry_delay_ms = Some(delay_ms);
        self
    }

    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = Some(enabled);
        self
    }

    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        self.with_retries(policy.max_retries)
            .with_retry_delay(policy.retry_delay_ms)
            .with_exponential_backoff(policy.exponential_backoff)
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_checkpoint(mut self, enabled: bool) -> Self {
        self.use_checkpoint = enabled;
        self
    }

    pub fn with_should_retry<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&NodeError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    pub fn with_fallback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RunContext, NodeError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult> + Send + 'static,
    {
        let fallback: FallbackFn = Arc::new(
            move |ctx: RunContext, err: NodeError| -> BoxFuture<'static, NodeResult> {
                Box::pin(f(ctx, err))
            },
        );
        self.fallback = Some(fallback);
        self
    }

    /// Fallback that substitutes a constant value.
    pub fn with_fallback_value(self, value: Value) -> Self {
        self.with_fallback(move |_ctx, _err| {
            let value = value.clone();
            async move { Ok(value) }
        })
    }

    pub fn with_compensation<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RunContext, NodeError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
    {
        let compensate: CompensateFn = Arc::new(
            move |ctx: RunContext, err: NodeError| -> BoxFuture<'static, Result<(), NodeError>> {
                Box::pin(f(ctx, err))
            },
        );
        self.compensate = Some(compensate);
        self
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("exponential_backoff", &self.exponential_backoff)
            .field("timeout_ms", &self.timeout_ms)
            .field("use_checkpoint", &self.use_checkpoint)
            .field("has_fallback", &self.fallback.is_some())
            .field("has_compensation", &self.compensate.is_some())
            .finish()
    }
}
