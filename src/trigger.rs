//! One-shot round against the state store
//!
//! Used by the `trigger` subcommand, where an external cron drives the
//! rounds and no scheduler is running in-process. The HTTP trigger goes
//! through [`crate::scheduler::Scheduler::trigger_round`] instead.

use crate::errors::Result;
use crate::probe::{ProbeExecutor, ProbeResult};
use crate::registry::TargetRegistry;
use crate::store::{load_or_init, StateStore};
use crate::target::TargetId;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProbe {
    pub id: TargetId,
    pub url: String,
    #[serde(flatten)]
    pub result: ProbeResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReport {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<TargetProbe>,
}

impl TriggerReport {
    pub(crate) fn skipped(reason: &str) -> Self {
        Self {
            skipped: true,
            reason: Some(reason.to_string()),
            timestamp: Utc::now(),
            results: Vec::new(),
        }
    }

    pub(crate) fn completed(results: Vec<TargetProbe>) -> Self {
        Self {
            skipped: false,
            reason: None,
            timestamp: Utc::now(),
            results,
        }
    }
}

/// Probe every stored target once if monitoring is running.
///
/// Results are applied to a freshly read snapshot so targets removed while
/// the round was in flight are not written back.
#[instrument(skip_all)]
pub async fn run_stored_round(
    store: &dyn StateStore,
    executor: &ProbeExecutor,
    default_interval_minutes: u32,
) -> Result<TriggerReport> {
    let snapshot = load_or_init(store, default_interval_minutes).await?;

    if !snapshot.running {
        info!("Trigger skipped: monitoring is not running");
        return Ok(TriggerReport::skipped("monitoring is not running"));
    }

    if snapshot.targets.is_empty() {
        info!("Trigger skipped: no targets registered");
        return Ok(TriggerReport::skipped("no targets registered"));
    }

    info!("Triggered round for {} targets", snapshot.targets.len());
    let results: Vec<TargetProbe> = join_all(snapshot.targets.iter().map(|target| async move {
        TargetProbe {
            id: target.id,
            url: target.url.clone(),
            result: executor.probe(&target.url).await,
        }
    }))
    .await;

    let mut latest = match store.get().await {
        Ok(Some(latest)) => latest,
        Ok(None) => snapshot,
        Err(e) => {
            warn!("Could not re-read state before writing results: {}", e);
            snapshot
        }
    };

    let registry = TargetRegistry::new();
    registry.restore(latest.targets).await;
    let now = Utc::now();
    for probe in &results {
        registry.apply_probe_result(probe.id, &probe.result, now).await;
    }
    latest.targets = registry.list().await;

    if let Err(e) = store.set(&latest).await {
        warn!("Failed to persist triggered round: {}", e);
    }

    Ok(TriggerReport {
        skipped: false,
        reason: None,
        timestamp: now,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Classification, ProbeSettings};
    use crate::store::{MemoryStore, Snapshot};
    use crate::target::{Target, TargetStatus};
    use crate::testing::{Behavior, ScriptedTransport};
    use std::sync::Arc;
    use std::time::Duration;

    fn executor(transport: ScriptedTransport) -> ProbeExecutor {
        ProbeExecutor::with_transport(Arc::new(transport), ProbeSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_when_not_running() {
        let store = MemoryStore::new();
        let mut snapshot = Snapshot::empty(1);
        snapshot.targets.push(Target::new("https://a.com".to_string()));
        store.set(&snapshot).await.unwrap();

        let transport = ScriptedTransport::new();
        let report = run_stored_round(&store, &executor(transport.clone()), 1).await.unwrap();

        assert!(report.skipped);
        assert_eq!(transport.total_fetch_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_on_first_access() {
        let store = MemoryStore::new();
        let report = run_stored_round(&store, &executor(ScriptedTransport::new()), 1).await.unwrap();

        assert!(report.skipped);
        assert_eq!(store.get().await.unwrap(), Some(Snapshot::empty(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_round_updates_store() {
        let store = MemoryStore::new();
        let mut snapshot = Snapshot::empty(1);
        snapshot.running = true;
        snapshot.targets.push(Target::new("https://up.com".to_string()));
        snapshot.targets.push(Target::new("https://down.com".to_string()));
        store.set(&snapshot).await.unwrap();

        let transport = ScriptedTransport::new()
            .with("https://down.com", Behavior::network(Duration::from_millis(5), "dns failure"));
        let report = run_stored_round(&store, &executor(transport), 1).await.unwrap();

        assert!(!report.skipped);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].result.classification, Classification::Success);
        assert_eq!(report.results[1].result.classification, Classification::Error);

        let saved = store.get().await.unwrap().unwrap();
        assert_eq!(saved.targets[0].status, TargetStatus::Success);
        assert_eq!(saved.targets[1].status, TargetStatus::Error);
        assert_eq!(saved.targets[1].consecutive_errors, 1);
        assert!(saved.running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_removed_mid_round_is_not_written_back() {
        let store = Arc::new(MemoryStore::new());
        let mut snapshot = Snapshot::empty(1);
        snapshot.running = true;
        let slow = Target::new("https://slow.com".to_string());
        let kept = Target::new("https://kept.com".to_string());
        snapshot.targets.push(slow.clone());
        snapshot.targets.push(kept.clone());
        store.set(&snapshot).await.unwrap();

        let transport = ScriptedTransport::new()
            .with("https://slow.com", Behavior::respond(Duration::from_secs(3), 200));
        let round = {
            let store = Arc::clone(&store);
            let executor = executor(transport);
            tokio::spawn(async move { run_stored_round(store.as_ref(), &executor, 1).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut edited = store.get().await.unwrap().unwrap();
        edited.targets.retain(|t| t.id != slow.id);
        store.set(&edited).await.unwrap();

        let report = round.await.unwrap().unwrap();
        assert_eq!(report.results.len(), 2);

        let saved = store.get().await.unwrap().unwrap();
        assert_eq!(saved.targets.len(), 1);
        assert_eq!(saved.targets[0].id, kept.id);
        assert_eq!(saved.targets[0].status, TargetStatus::Success);
    }

    #[test]
    fn test_report_serialization() {
        let report = TriggerReport::skipped("monitoring is not running");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["skipped"], true);
        assert_eq!(json["reason"], "monitoring is not running");
    }
}
