//! Bounded in-memory activity log

use crate::probe::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
    Info,
}

impl From<Classification> for Severity {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Success => Severity::Success,
            Classification::Warning => Severity::Warning,
            Classification::Error => Severity::Error,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Most-recent-first ring buffer of activity entries
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: Arc<RwLock<VecDeque<ActivityLogEntry>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Prepend an entry, evicting the oldest past capacity
    pub async fn append(&self, message: impl Into<String>, severity: Severity) -> ActivityLogEntry {
        let entry = ActivityLogEntry {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.into(),
            severity,
        };

        let mut entries = self.entries.write().await;
        entries.push_front(entry.clone());
        entries.truncate(self.capacity);

        entry
    }

    /// Entries, newest first
    pub async fn entries(&self) -> Vec<ActivityLogEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
