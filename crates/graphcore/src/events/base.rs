use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// How a node reached its successful terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessSource {
    Work,
    Fallback,
    Checkpoint,
}

impl SuccessSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuccessSource::Work => "work",
            SuccessSource::Fallback => "fallback",
            SuccessSource::Checkpoint => "checkpoint",
        }
    }
}

/// Events emitted during a graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        node_count: usize,
        level_count: usize,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: String,
        node: String,
        timestamp: DateTime<Utc>,
    },
    NodeRetrying {
        run_id: String,
        node: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeSucceeded {
        run_id: String,
        node: String,
        source: SuccessSource,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: String,
        node: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    NodeSkipped {
        run_id: String,
        node: String,
        blocked_by: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: String,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Emitter bound to one run id
#[derive(Clone)]
pub struct RunEmitter {
    run_id: String,
    sender: Option<broadcast::Sender<RunEvent>>,
}

impl RunEmitter {
    /// Emitter that drops everything, for runs without a bus.
    pub fn disabled(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            sender: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn send(&self, event: RunEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn run_started(&self, node_count: usize, level_count: usize) {
        self.send(RunEvent::RunStarted {
            run_id: self.run_id.clone(),
            node_count,
            level_count,
            timestamp: Utc::now(),
        });
    }

    pub fn node_started(&self, node: &str) {
        self.send(RunEvent::NodeStarted {
            run_id: self.run_id.clone(),
            node: node.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn node_retrying(&self, node: &str, attempt: u32, delay_ms: u64, error: &str) {
        self.send(RunEvent::NodeRetrying {
            run_id: self.run_id.clone(),
            node: node.to_string(),
            attempt,
            delay_ms,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn node_succeeded(&self, node: &str, source: SuccessSource, duration_ms: u64) {
        self.send(RunEvent::NodeSucceeded {
            run_id: self.run_id.clone(),
            node: node.to_string(),
            source,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    pub fn node_failed(&self, node: &str, error: &str) {
        self.send(RunEvent::NodeFailed {
            run_id: self.run_id.clone(),
            node: node.to_string(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn node_skipped(&self, node: &str, blocked_by: Vec<String>) {
        self.send(RunEvent::NodeSkipped {
            run_id: self.run_id.clone(),
            node: node.to_string(),
            blocked_by,
            timestamp: Utc::now(),
        });
    }

    pub fn run_completed(&self, succeeded: usize, failed: usize, skipped: usize, duration_ms: u64) {
        self.send(RunEvent::RunCompleted {
            run_id: self.run_id.clone(),
            succeeded,
            failed,
            skipped,
            duration_ms,
            timestamp: Utc::now(),
        });
    }
}

/// Broadcast bus for run events
pub struct EventBus {
    sender: broadcast::Sender<RunEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn emitter(&self, run_id: impl Into<String>) -> RunEmitter {
        RunEmitter {
            run_id: run_id.into(),
            sender: Some(self.sender.clone()),
        }
    }
}
