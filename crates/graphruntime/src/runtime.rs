use crate::executor::GraphExecutor;
use crate::loader::load_nodes;
use crate::options::{RunHooks, RunOptions};
use crate::registry::WorkRegistry;
use crate::result::RunResult;
use graphcore::{EventBus, GraphError, GraphSpec, Node, RunContext, RunEvent, RunSettings};
use std::sync::Arc;

/// Runtime facade: a work registry, default settings and an event bus
pub struct GraphRuntime {
    registry: Arc<WorkRegistry>,
    config: RuntimeConfig,
    event_bus: Arc<EventBus>,
}

impl GraphRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(WorkRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<WorkRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            config,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<WorkRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run nodes with the runtime's default settings
    pub async fn run(&self, nodes: Vec<Node>, ctx: &RunContext) -> Result<RunResult, GraphError> {
        let options = RunOptions::from_settings(self.config.settings.clone());
        self.run_with(nodes, ctx, options).await
    }

    /// Run nodes with explicit options; events go to the runtime's bus
    pub async fn run_with(
        &self,
        nodes: Vec<Node>,
        ctx: &RunContext,
        options: RunOptions,
    ) -> Result<RunResult, GraphError> {
        let options = options.with_event_bus(Arc::clone(&self.event_bus));
        GraphExecutor::new(options).execute(nodes, ctx).await
    }

    /// Load a graph definition through the registry and run it with its own settings
    pub async fn run_spec(
        &self,
        spec: &GraphSpec,
        ctx: &RunContext,
        hooks: RunHooks,
    ) -> Result<RunResult, GraphError> {
        let nodes = load_nodes(spec, &self.registry)?;
        let options = RunOptions {
            hooks,
            ..RunOptions::from_settings(spec.settings.clone())
        };
        tracing::info!("Running graph '{}' ({} nodes)", spec.name, nodes.len());
        self.run_with(nodes, ctx, options).await
    }

    /// Subscribe to run events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for GraphRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub settings: RunSettings,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settings: RunSettings::default(),
            event_buffer_size: 1000,
        }
    }
}
