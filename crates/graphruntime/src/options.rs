use graphcore::{EventBus, NodeError, RunSettings, Value};
use std::sync::Arc;
use std::time::Duration;

pub type StartHook = Arc<dyn Fn(&str) + Send + Sync>;
pub type SuccessHook = Arc<dyn Fn(&str, &Value, Duration) + Send + Sync>;
pub type FailureHook = Arc<dyn Fn(&str, &NodeError) + Send + Sync>;

/// Observer callbacks. They never influence scheduling.
#[derive(Clone, Default)]
pub struct RunHooks {
    pub on_node_start: Option<StartHook>,
    pub on_node_success: Option<SuccessHook>,
    pub on_node_failure: Option<FailureHook>,
}

impl RunHooks {
    pub(crate) fn node_started(&self, node: &str) {
        if let Some(hook) = &self.on_node_start {
            hook(node);
        }
    }

    pub(crate) fn node_succeeded(&self, node: &str, value: &Value, elapsed: Duration) {
        if let Some(hook) = &self.on_node_success {
            hook(node, value, elapsed);
        }
    }

    pub(crate) fn node_failed(&self, node: &str, error: &NodeError) {
        if let Some(hook) = &self.on_node_failure {
            hook(node, error);
        }
    }
}

/// Options for a single graph run
#[derive(Clone, Default)]
pub struct RunOptions {
    pub settings: RunSettings,
    pub hooks: RunHooks,
    pub(crate) events: Option<Arc<EventBus>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: RunSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.settings.concurrency = Some(concurrency);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.settings.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_default_retries(mut self, retries: u32) -> Self {
        self.settings.default_retries = retries;
        self
    }

    pub fn with_default_retry_delay(mut self, delay_ms: u64) -> Self {
        self.settings.default_retry_delay_ms = delay_ms;
        self
    }

    pub fn with_default_exponential_backoff(mut self, enabled: bool) -> Self {
        self.settings.default_exponential_backoff = enabled;
        self
    }

    pub fn allow_partial_success(mut self, allowed: bool) -> Self {
        self.settings.allow_partial_success = allowed;
        self
    }

    pub fn on_node_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.hooks.on_node_start = Some(Arc::new(hook));
        self
    }

    pub fn on_node_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Value, Duration) + Send + Sync + 'static,
    {
        self.hooks.on_node_success = Some(Arc::new(hook));
        self
    }

    pub fn on_node_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &NodeError) + Send + Sync + 'static,
    {
        self.hooks.on_node_failure = Some(Arc::new(hook));
        self
    }

    /// Publish run events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// In-flight bound for a level of `level_len` nodes. Zero is treated as one.
    pub(crate) fn concurrency_limit(&self, level_len: usize) -> usize {
        match self.settings.concurrency {
            Some(limit) => limit.max(1),
            None => level_len.max(1),
        }
    }
}
