//! Set of monitored targets and their last observed state

use crate::errors::Result;
use crate::probe::{Classification, ProbeResult};
use crate::target::{normalize_url, Target, TargetId, TargetStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe, insertion-ordered target registry
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: Arc<RwLock<Vec<Target>>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize `url` and register a new idle target
    pub async fn add(&self, url: &str) -> Result<Target> {
        let target = Target::new(normalize_url(url)?);
        self.targets.write().await.push(target.clone());
        debug!("Registered target {} ({})", target.url, target.id);
        Ok(target)
    }

    /// Remove a target, returning it if it was present
    pub async fn remove(&self, id: TargetId) -> Option<Target> {
        let mut targets = self.targets.write().await;
        let index = targets.iter().position(|t| t.id == id)?;
        Some(targets.remove(index))
    }

    /// Remove every target, returning how many were dropped
    pub async fn clear(&self) -> usize {
        let mut targets = self.targets.write().await;
        let count = targets.len();
        targets.clear();
        count
    }

    /// Replace the contents with persisted targets
    pub async fn restore(&self, restored: Vec<Target>) {
        *self.targets.write().await = restored;
    }

    /// Record a completed probe. Returns false when the target is gone,
    /// in which case nothing changes.
    pub async fn apply_probe_result(&self, id: TargetId, result: &ProbeResult, at: DateTime<Utc>) -> bool {
        let mut targets = self.targets.write().await;
        let Some(target) = targets.iter_mut().find(|t| t.id == id) else {
            debug!("Dropping late probe result for removed target {}", id);
            return false;
        };

        target.status = match result.classification {
            Classification::Success => TargetStatus::Success,
            Classification::Warning => TargetStatus::Warning,
            Classification::Error => TargetStatus::Error,
        };
        target.last_probe_at = Some(at);
        target.last_latency_ms = result.latency_ms;
        if result.classification.is_success() {
            target.consecutive_errors = 0;
        } else {
            target.consecutive_errors += 1;
        }
        debug!(
            "Target {} is {} ({} consecutive errors)",
            target.url, target.status, target.consecutive_errors
        );

        true
    }

    pub async fn get(&self, id: TargetId) -> Option<Target> {
        self.targets.read().await.iter().find(|t| t.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Target> {
        self.targets.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }
}
