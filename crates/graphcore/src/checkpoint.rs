use crate::CheckpointError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};

/// Key-value store of completed node results, keyed by node name.
///
/// A store may outlive a single run; reusing it on a later run lets
/// checkpointed nodes be treated as already complete. Isolation between
/// concurrent runs sharing one store is the implementation's concern.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, node: &str) -> Result<Option<Value>, CheckpointError>;

    async fn set(&self, node: &str, value: Value) -> Result<(), CheckpointError>;

    /// Remove one entry, or every entry when `node` is `None`.
    async fn clear(&self, node: Option<&str>) -> Result<(), CheckpointError>;
}

/// In-process checkpoint store.
#[derive(Debug, Default)]
pub struct MemoryCheckpoint {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpoint {
    async fn get(&self, node: &str) -> Result<Option<Value>, CheckpointError> {
        Ok(self.entries.read().await.get(node).cloned())
    }

    async fn set(&self, node: &str, value: Value) -> Result<(), CheckpointError> {
        self.entries.write().await.insert(node.to_string(), value);
        Ok(())
    }

    async fn clear(&self, node: Option<&str>) -> Result<(), CheckpointError> {
        let mut entries = self.entries.write().await;
        match node {
            Some(name) => {
                entries.remove(name);
            }
            None => entries.clear(),
        }
        Ok(())
    }
}

/// Checkpoint store persisted as a single JSON object on disk.
///
/// The file is read on first access and rewritten in full after every
/// mutation (write to a sibling temp file, then rename). The cached map only
/// changes once the write has succeeded.
pub struct JsonFileCheckpoint {
    path: PathBuf,
    entries: Mutex<Option<HashMap<String, Value>>>,
}

impl JsonFileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Value>, CheckpointError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &HashMap<String, Value>) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpoint {
    async fn get(&self, node: &str) -> Result<Option<Value>, CheckpointError> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard.as_ref().and_then(|entries| entries.get(node).cloned()))
    }

    async fn set(&self, node: &str, value: Value) -> Result<(), CheckpointError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => self.load().await?,
        };
        entries.insert(node.to_string(), value);
        self.persist(&entries).await?;
        *guard = Some(entries);
        Ok(())
    }

    async fn clear(&self, node: Option<&str>) -> Result<(), CheckpointError> {
        let mut guard = self.entries.lock().await;
        let mut entries = match guard.as_ref() {
            Some(entries) => entries.clone(),
            None => self.load().await?,
        };
        match node {
            Some(name) => {
                entries.remove(name);
            }
            None => entries.clear(),
        }
        self.persist(&entries).await?;
        *guard = Some(entries);
        Ok(())
    }
}
