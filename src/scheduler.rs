//! Interval scheduler driving probe rounds
//!
//! The scheduler owns the registry, the activity log and a single timer
//! task. Starting runs one round immediately and arms a repeating timer;
//! each tick spawns one task per target and returns without waiting, so
//! a hanging probe never delays the next tick or the other targets.
//! Rounds may overlap when probes outlive the interval.

use crate::activity::{ActivityLog, ActivityLogEntry, Severity};
use crate::config::Config;
use crate::errors::{ProberError, Result};
use crate::metrics::{ProbeMetrics, ProbeMetricsSnapshot};
use crate::probe::{Classification, ProbeExecutor, ProbeResult};
use crate::registry::TargetRegistry;
use crate::store::{load_or_init, Snapshot, StateStore};
use crate::target::{validate_interval, MonitorConfig, Target, TargetId};
use crate::trigger::{TargetProbe, TriggerReport};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    /// Nothing to monitor; the scheduler stays stopped
    NoTargets,
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub activity_log_capacity: usize,
    pub default_interval_minutes: u32,
    pub resume_on_start: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            activity_log_capacity: crate::activity::DEFAULT_CAPACITY,
            default_interval_minutes: 1,
            resume_on_start: true,
        }
    }
}

impl From<&Config> for SchedulerOptions {
    fn from(config: &Config) -> Self {
        Self {
            activity_log_capacity: config.activity_log_capacity,
            default_interval_minutes: config.default_interval_minutes,
            resume_on_start: config.resume_on_start,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub interval_minutes: u32,
    pub targets: usize,
    pub in_flight: usize,
    pub rounds_started: u64,
    pub metrics: ProbeMetricsSnapshot,
}

/// Probes spawned for one round
pub struct RoundHandle {
    tasks: Vec<JoinHandle<TargetProbe>>,
}

impl RoundHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every probe of the round; the scheduler itself never does
    pub async fn wait(self) -> Vec<TargetProbe> {
        join_all(self.tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(result) => Some(result),
                Err(e) => {
                    error!("Probe task failed: {}", e);
                    None
                }
            })
            .collect()
    }
}

struct TimerState {
    config: MonitorConfig,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    registry: TargetRegistry,
    activity: ActivityLog,
    executor: ProbeExecutor,
    store: Arc<dyn StateStore>,
    metrics: ProbeMetrics,
    timer: Mutex<TimerState>,
    persist_lock: Mutex<()>,
    in_flight: AtomicUsize,
    rounds_started: AtomicU64,
}

/// Decrements the in-flight counter even if the probe future is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    async fn spawn_round(self: &Arc<Self>) -> RoundHandle {
        let targets = self.registry.list().await;
        let round = self.rounds_started.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Starting round {} for {} targets", round, targets.len());

        let tasks = targets
            .into_iter()
            .map(|target| {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let result = shared.probe_target(target.id, target.url.clone()).await;
                    TargetProbe {
                        id: target.id,
                        url: target.url,
                        result,
                    }
                })
            })
            .collect();

        RoundHandle { tasks }
    }

    #[instrument(skip(self))]
    async fn probe_target(&self, id: TargetId, url: String) -> ProbeResult {
        let result = {
            let _guard = InFlight::enter(&self.in_flight);
            self.executor.probe(&url).await
        };

        let applied = self.registry.apply_probe_result(id, &result, Utc::now()).await;
        if !applied {
            debug!("Target {} was removed while its probe was in flight", url);
        }

        self.metrics.record(&result).await;

        let message = result.describe(&url);
        match result.classification {
            Classification::Success => info!("{}", message),
            Classification::Warning => warn!("{}", message),
            Classification::Error => error!("{}", message),
        }
        self.activity.append(message, result.classification.into()).await;

        self.persist().await;
        result
    }

    async fn snapshot(&self) -> Snapshot {
        let targets = self.registry.list().await;
        let config = self.timer.lock().await.config;

        Snapshot {
            targets,
            interval_minutes: config.interval_minutes,
            running: config.running,
        }
    }

    /// Write the full snapshot; failures are logged and never abort probing
    async fn persist(&self) {
        // Snapshot and write under one lock so an older view never lands last.
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.snapshot().await;
        if let Err(e) = self.store.set(&snapshot).await {
            warn!("Failed to persist snapshot: {}", e);
            self.activity
                .append(format!("Could not persist state: {}", e), Severity::Warning)
                .await;
        }
    }
}

fn arm_timer(shared: &Arc<Shared>, interval_minutes: u32) -> JoinHandle<()> {
    let period = Duration::from_secs(u64::from(interval_minutes) * 60);
    let weak: Weak<Shared> = Arc::downgrade(shared);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                debug!("Scheduler dropped, timer exiting");
                break;
            };

            info!("Timer tick (every {} min)", interval_minutes);
            // Fire and forget: the next tick never waits for this round.
            drop(shared.spawn_round().await);
        }
    })
}

/// Owned scheduler; clones share the same state
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Stopped scheduler with an empty registry
    pub fn new(executor: ProbeExecutor, store: Arc<dyn StateStore>, options: SchedulerOptions) -> Self {
        let shared = Shared {
            registry: TargetRegistry::new(),
            activity: ActivityLog::new(options.activity_log_capacity),
            executor,
            store,
            metrics: ProbeMetrics::new(),
            timer: Mutex::new(TimerState {
                config: MonitorConfig {
                    interval_minutes: options.default_interval_minutes.max(1),
                    running: false,
                },
                handle: None,
            }),
            persist_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            rounds_started: AtomicU64::new(0),
        };

        Self { shared: Arc::new(shared) }
    }

    /// Build a scheduler from the persisted snapshot, resuming monitoring
    /// when it was running. An unavailable store leaves an empty, stopped
    /// scheduler that keeps working in memory.
    pub async fn restore(executor: ProbeExecutor, store: Arc<dyn StateStore>, options: SchedulerOptions) -> Self {
        let resume = options.resume_on_start;
        let default_interval = options.default_interval_minutes.max(1);
        let scheduler = Self::new(executor, Arc::clone(&store), options);

        let snapshot = match load_or_init(store.as_ref(), default_interval).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Starting with empty state: {}", e);
                scheduler
                    .shared
                    .activity
                    .append(format!("Could not load saved state: {}", e), Severity::Warning)
                    .await;
                return scheduler;
            }
        };

        info!(
            "Restored {} targets (interval {} min, running: {})",
            snapshot.targets.len(),
            snapshot.interval_minutes,
            snapshot.running
        );

        scheduler.shared.registry.restore(snapshot.targets).await;
        {
            let mut timer = scheduler.shared.timer.lock().await;
            timer.config.interval_minutes = if snapshot.interval_minutes >= 1 {
                snapshot.interval_minutes
            } else {
                default_interval
            };
        }

        let resumed = snapshot.running
            && resume
            && scheduler.start_with_message("Monitoring resumed").await == StartOutcome::Started;

        if snapshot.running && !resumed {
            info!("Saved state was running but monitoring stays stopped");
            scheduler.shared.persist().await;
        }

        scheduler
    }

    /// Stopped → Running: probe every target now, then once per interval
    pub async fn start(&self) -> StartOutcome {
        self.start_with_message("Monitoring started").await
    }

    async fn start_with_message(&self, message: &str) -> StartOutcome {
        let interval_minutes = {
            let mut timer = self.shared.timer.lock().await;
            if timer.config.running {
                return StartOutcome::AlreadyRunning;
            }

            if self.shared.registry.is_empty().await {
                info!("No targets registered, monitoring stays stopped");
                return StartOutcome::NoTargets;
            }

            timer.config.running = true;
            timer.handle = Some(arm_timer(&self.shared, timer.config.interval_minutes));
            timer.config.interval_minutes
        };

        info!("{} (every {} min)", message, interval_minutes);
        self.shared
            .activity
            .append(format!("{} (every {} min)", message, interval_minutes), Severity::Info)
            .await;
        self.shared.persist().await;

        drop(self.shared.spawn_round().await);
        StartOutcome::Started
    }

    /// Running → Stopped. In-flight probes still complete and are recorded.
    pub async fn stop(&self) -> bool {
        {
            let mut timer = self.shared.timer.lock().await;
            if !timer.config.running {
                return false;
            }

            timer.config.running = false;
            if let Some(handle) = timer.handle.take() {
                handle.abort();
            }
        }

        info!("Monitoring paused");
        self.shared.activity.append("Monitoring paused", Severity::Info).await;
        self.shared.persist().await;
        true
    }

    /// Change the interval. A running timer is re-armed with a fresh full
    /// period; probes already in flight are untouched.
    pub async fn set_interval(&self, minutes: u32) -> Result<()> {
        validate_interval(minutes)?;

        {
            let mut timer = self.shared.timer.lock().await;
            timer.config.interval_minutes = minutes;

            if timer.config.running {
                if let Some(handle) = timer.handle.take() {
                    handle.abort();
                }
                timer.handle = Some(arm_timer(&self.shared, minutes));
            }
        }

        info!("Probe interval set to {} min", minutes);
        self.shared
            .activity
            .append(format!("Interval set to {} min", minutes), Severity::Info)
            .await;
        self.shared.persist().await;
        Ok(())
    }

    pub async fn add_target(&self, url: &str) -> Result<Target> {
        let target = self.shared.registry.add(url).await?;

        info!("Target added: {}", target.url);
        self.shared
            .activity
            .append(format!("Target added: {}", target.url), Severity::Info)
            .await;
        self.shared.persist().await;
        Ok(target)
    }

    pub async fn remove_target(&self, id: TargetId) -> Result<Target> {
        let target = self
            .shared
            .registry
            .remove(id)
            .await
            .ok_or_else(|| ProberError::TargetNotFound(id.to_string()))?;

        info!("Target removed: {}", target.url);
        self.shared
            .activity
            .append(format!("Target removed: {}", target.url), Severity::Info)
            .await;
        self.shared.persist().await;
        Ok(target)
    }

    pub async fn clear_targets(&self) -> usize {
        let removed = self.shared.registry.clear().await;

        info!("Cleared {} targets", removed);
        self.shared
            .activity
            .append(format!("Cleared {} targets", removed), Severity::Info)
            .await;
        self.shared.persist().await;
        removed
    }

    /// Probe one target right away, outside the timer
    pub async fn probe_now(&self, id: TargetId) -> Result<ProbeResult> {
        let target = self
            .shared
            .registry
            .get(id)
            .await
            .ok_or_else(|| ProberError::TargetNotFound(id.to_string()))?;

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move { shared.probe_target(target.id, target.url).await });
        Ok(task.await?)
    }

    /// Externally triggered round: probe every target and wait for the
    /// results. Skipped unless monitoring is running with targets.
    #[instrument(skip(self))]
    pub async fn trigger_round(&self) -> TriggerReport {
        if !self.monitor_config().await.running {
            info!("Trigger skipped: monitoring is not running");
            return TriggerReport::skipped("monitoring is not running");
        }

        if self.shared.registry.is_empty().await {
            info!("Trigger skipped: no targets registered");
            return TriggerReport::skipped("no targets registered");
        }

        let round = self.shared.spawn_round().await;
        info!("Triggered round for {} targets", round.len());
        TriggerReport::completed(round.wait().await)
    }

    /// Spawn one probe per current target without waiting for them
    pub async fn run_round(&self) -> RoundHandle {
        self.shared.spawn_round().await
    }

    pub async fn state(&self) -> SchedulerState {
        if self.shared.timer.lock().await.config.running {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    pub async fn monitor_config(&self) -> MonitorConfig {
        self.shared.timer.lock().await.config
    }

    pub async fn targets(&self) -> Vec<Target> {
        self.shared.registry.list().await
    }

    pub async fn target(&self, id: TargetId) -> Option<Target> {
        self.shared.registry.get(id).await
    }

    pub async fn activity(&self) -> Vec<ActivityLogEntry> {
        self.shared.activity.entries().await
    }

    /// Drop every activity entry
    pub async fn clear_activity(&self) -> usize {
        let cleared = self.shared.activity.len().await;
        self.shared.activity.clear().await;
        info!("Cleared {} activity entries", cleared);
        cleared
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.shared.snapshot().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        let config = self.monitor_config().await;

        SchedulerStatus {
            state: if config.running {
                SchedulerState::Running
            } else {
                SchedulerState::Stopped
            },
            interval_minutes: config.interval_minutes,
            targets: self.shared.registry.len().await,
            in_flight: self.shared.in_flight.load(Ordering::SeqCst),
            rounds_started: self.shared.rounds_started.load(Ordering::SeqCst),
            metrics: self.shared.metrics.snapshot().await,
        }
    }

    /// Stop the timer for process shutdown without touching persisted state
    pub async fn shutdown(&self) {
        if let Some(handle) = self.shared.timer.lock().await.handle.take() {
            handle.abort();
        }
    }
}
