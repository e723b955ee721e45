//! Standard work library
//!
//! Collection of built-in work kinds for graph definition files

mod debug;
mod fault;
mod http;
mod time;
mod transform;

pub use debug::{EchoWork, EchoWorkFactory};
pub use fault::{FailWork, FailWorkFactory, FlakyWork, FlakyWorkFactory};
pub use http::{HttpRequestWork, HttpRequestWorkFactory};
pub use time::{DelayWork, DelayWorkFactory};
pub use transform::{CollectWork, CollectWorkFactory};

use graphruntime::WorkRegistry;
use std::sync::Arc;

/// Register all standard work kinds with a registry
pub fn register_all(registry: &mut WorkRegistry) {
    registry.register(Arc::new(debug::EchoWorkFactory));
    registry.register(Arc::new(fault::FailWorkFactory));
    registry.register(Arc::new(fault::FlakyWorkFactory));
    registry.register(Arc::new(http::HttpRequestWorkFactory));
    registry.register(Arc::new(time::DelayWorkFactory));
    registry.register(Arc::new(transform::CollectWorkFactory));
}

/// Registry preloaded with every standard work kind
pub fn standard_registry() -> WorkRegistry {
    let mut registry = WorkRegistry::new();
    register_all(&mut registry);
    registry
}
