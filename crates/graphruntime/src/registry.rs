use graphcore::{GraphError, NodeError, NodeSpec, Work};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating work instances from graph definitions
pub trait WorkFactory: Send + Sync {
    /// Create the work body for one node definition
    fn create(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, NodeError>;

    /// Get work kind identifier
    fn kind(&self) -> &str;

    /// Optional: describe the kind and its config keys
    fn info(&self) -> WorkKindInfo {
        WorkKindInfo::default()
    }
}

/// Metadata about a work kind
#[derive(Debug, Clone)]
pub struct WorkKindInfo {
    pub description: String,
    pub category: String,
    pub config: Vec<ConfigField>,
}

impl Default for WorkKindInfo {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            config: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigField {
    pub name: String,
    pub description: String,
    pub required: bool,
}

impl ConfigField {
    pub fn new(name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required,
        }
    }
}

/// Registry of available work kinds.
///
/// Passed explicitly to the loader; there is no process-wide registry.
pub struct WorkRegistry {
    factories: HashMap<String, Arc<dyn WorkFactory>>,
}

impl WorkRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a work factory
    pub fn register(&mut self, factory: Arc<dyn WorkFactory>) {
        let kind = factory.kind().to_string();
        tracing::debug!("Registering work kind: {}", kind);
        self.factories.insert(kind, factory);
    }

    /// Create the work body for a node definition
    pub fn create_work(&self, spec: &NodeSpec) -> Result<Arc<dyn Work>, GraphError> {
        let factory = self
            .factories
            .get(&spec.kind)
            .ok_or_else(|| GraphError::UnknownWorkKind(spec.kind.clone()))?;

        factory
            .create(spec)
            .map_err(|e| GraphError::Invalid(format!("Failed to create node '{}': {}", spec.name, e)))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Get all registered kinds, sorted
    pub fn list_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn info(&self, kind: &str) -> Option<WorkKindInfo> {
        self.factories.get(kind).map(|f| f.info())
    }
}

impl Default for WorkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
