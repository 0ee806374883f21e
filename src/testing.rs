//! Scripted collaborators shared by unit tests

use crate::errors::{ProberError, Result};
use crate::probe::{ProbeTransport, TransportFailure};
use crate::store::{Snapshot, StateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub enum Outcome {
    Respond(u16),
    Network(String),
    /// Primary fails opaquely; the fallback signal arrives after the delay, or never
    Opaque(Option<Duration>),
}

#[derive(Clone, Debug)]
pub struct Behavior {
    delay: Duration,
    outcome: Outcome,
}

impl Behavior {
    pub fn respond(delay: Duration, status: u16) -> Self {
        Self { delay, outcome: Outcome::Respond(status) }
    }

    pub fn network(delay: Duration, reason: &str) -> Self {
        Self { delay, outcome: Outcome::Network(reason.to_string()) }
    }

    pub fn opaque(signal_after: Option<Duration>) -> Self {
        Self { delay: Duration::ZERO, outcome: Outcome::Opaque(signal_after) }
    }
}

/// Transport answering from a per-URL script; unknown URLs respond 200 at once
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    behaviors: Arc<Mutex<HashMap<String, Behavior>>>,
    fetches: Arc<Mutex<HashMap<String, usize>>>,
    signals: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, behavior: Behavior) -> Self {
        self.set(url, behavior);
        self
    }

    pub fn set(&self, url: &str, behavior: Behavior) {
        self.behaviors.lock().unwrap().insert(url.to_string(), behavior);
    }

    pub fn fetch_calls(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn signal_calls(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }

    fn behavior(&self, url: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Behavior::respond(Duration::ZERO, 200))
    }
}

#[async_trait]
impl ProbeTransport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> std::result::Result<u16, TransportFailure> {
        *self.fetches.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        let behavior = self.behavior(url);
        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }

        match behavior.outcome {
            Outcome::Respond(status) => Ok(status),
            Outcome::Network(reason) => Err(TransportFailure::Network(reason)),
            Outcome::Opaque(_) => Err(TransportFailure::Opaque("opaque response".to_string())),
        }
    }

    async fn signal(&self, url: &str) {
        self.signals.fetch_add(1, Ordering::SeqCst);
        match self.behavior(url).outcome {
            Outcome::Opaque(Some(after)) => tokio::time::sleep(after).await,
            Outcome::Opaque(None) => std::future::pending::<()>().await,
            _ => {}
        }
    }
}

/// In-memory store that can be switched into a failing mode
#[derive(Clone, Default)]
pub struct FlakyStore {
    snapshot: Arc<Mutex<Option<Snapshot>>>,
    failing: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<Snapshot> {
        self.snapshot.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get(&self) -> Result<Option<Snapshot>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProberError::StoreUnavailable("store offline".to_string()));
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn set(&self, snapshot: &Snapshot) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProberError::StoreUnavailable("store offline".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }
}
