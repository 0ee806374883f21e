//! Keep-alive prober library
//!
//! Periodically probes a set of registered URLs so that free-tier hosts
//! stay warm, classifies each probe as success, warning or error, keeps a
//! bounded activity log and persists targets plus scheduler settings.

pub mod activity;
pub mod config;
pub mod controllers;
pub mod errors;
pub mod metrics;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod target;
pub mod trigger;

#[cfg(test)]
mod testing;

pub use activity::{ActivityLog, ActivityLogEntry, Severity};
pub use config::Config;
pub use errors::{ProberError, Result};
pub use probe::{Classification, ProbeExecutor, ProbeResult, ProbeSettings};
pub use registry::TargetRegistry;
pub use scheduler::{Scheduler, SchedulerOptions, SchedulerState, StartOutcome};
pub use state::AppState;
pub use store::{JsonFileStore, MemoryStore, Snapshot, StateStore};
pub use target::{MonitorConfig, Target, TargetId, TargetStatus};
pub use trigger::{run_stored_round, TriggerReport};
