use serde_json::Value;

/// Structured log sink shared by the engine and node bodies during a run.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str, meta: Option<&Value>);

    fn error(&self, message: &str, meta: Option<&Value>);
}

/// Forwards to `tracing`, rendering metadata as a `meta` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str, meta: Option<&Value>) {
        match meta {
            Some(meta) => tracing::info!(meta = %meta, "{}", message),
            None => tracing::info!("{}", message),
        }
    }

    fn error(&self, message: &str, meta: Option<&Value>) {
        match meta {
            Some(meta) => tracing::error!(meta = %meta, "{}", message),
            None => tracing::error!("{}", message),
        }
    }
}
