//! Running probe outcome counters

use crate::probe::{Classification, ProbeResult};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    probes: u64,
    successes: u64,
    warnings: u64,
    errors: u64,
    fallbacks: u64,
    measured: u64,
    total_latency_ms: u64,
    min_latency_ms: Option<u64>,
    max_latency_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct ProbeMetrics {
    counters: RwLock<Counters>,
}

impl ProbeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, result: &ProbeResult) {
        let mut counters = self.counters.write().await;
        counters.probes += 1;

        match result.classification {
            Classification::Success => counters.successes += 1,
            Classification::Warning => counters.warnings += 1,
            Classification::Error => counters.errors += 1,
        }

        if result.via_fallback {
            counters.fallbacks += 1;
        }

        if let Some(latency) = result.latency_ms {
            counters.measured += 1;
            counters.total_latency_ms += latency;
            counters.min_latency_ms = Some(counters.min_latency_ms.map_or(latency, |m| m.min(latency)));
            counters.max_latency_ms = Some(counters.max_latency_ms.map_or(latency, |m| m.max(latency)));
        }
    }

    pub async fn snapshot(&self) -> ProbeMetricsSnapshot {
        let counters = *self.counters.read().await;

        let success_rate = if counters.probes > 0 {
            (counters.successes as f64 / counters.probes as f64) * 100.0
        } else {
            0.0
        };

        let avg_latency_ms = if counters.measured > 0 {
            counters.total_latency_ms / counters.measured
        } else {
            0
        };

        ProbeMetricsSnapshot {
            probes: counters.probes,
            successes: counters.successes,
            warnings: counters.warnings,
            errors: counters.errors,
            fallbacks: counters.fallbacks,
            success_rate,
            avg_latency_ms,
            min_latency_ms: counters.min_latency_ms,
            max_latency_ms: counters.max_latency_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeMetricsSnapshot {
    pub probes: u64,
    pub successes: u64,
    pub warnings: u64,
    pub errors: u64,
    pub fallbacks: u64,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub min_latency_ms: Option<u64>,
    pub max_latency_ms: Option<u64>,
}
