//! State store collaborators
//!
//! The prober only needs get/set of a full snapshot. Writes are whole
//! snapshots and the last one wins.

use crate::errors::{ProberError, Result};
use crate::target::{MonitorConfig, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Persisted form of the monitor: targets plus scheduler settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub targets: Vec<Target>,
    pub interval_minutes: u32,
    #[serde(default)]
    pub running: bool,
}

impl Snapshot {
    pub fn empty(interval_minutes: u32) -> Self {
        Self {
            targets: Vec::new(),
            interval_minutes,
            running: false,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval_minutes: self.interval_minutes,
            running: self.running,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty(MonitorConfig::default().interval_minutes)
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the last written snapshot, if any
    async fn get(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot
    async fn set(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Read the snapshot, writing an empty one on first access
pub async fn load_or_init(store: &dyn StateStore, default_interval_minutes: u32) -> Result<Snapshot> {
    if let Some(snapshot) = store.get().await? {
        return Ok(snapshot);
    }

    let snapshot = Snapshot::empty(default_interval_minutes);
    store.set(&snapshot).await?;
    info!("Initialized empty state snapshot");
    Ok(snapshot)
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<Snapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn set(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

/// Pretty-printed JSON file store.
///
/// Writes are serialized and land through a sibling temp file renamed over
/// the target, so readers only ever see a complete snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("state"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get(&self) -> Result<Option<Snapshot>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProberError::StoreUnavailable(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let snapshot = serde_json::from_str(&raw).map_err(|e| {
            ProberError::StoreUnavailable(format!("corrupt snapshot in {}: {}", self.path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    async fn set(&self, snapshot: &Snapshot) -> Result<()> {
        let body = serde_json::to_string_pretty(snapshot)?;
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ProberError::StoreUnavailable(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await.map_err(|e| {
            ProberError::StoreUnavailable(format!("failed to write {}: {}", temp.display(), e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            ProberError::StoreUnavailable(format!("failed to replace {}: {}", self.path.display(), e))
        })?;

        debug!("Wrote snapshot with {} targets to {}", snapshot.targets.len(), self.path.display());
        Ok(())
    }
}
