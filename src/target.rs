//! Monitored targets and the persisted monitor configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::errors::{ProberError, Result};

pub type TargetId = Uuid;

/// Last observed health of a target
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Idle,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Idle => write!(f, "idle"),
            TargetStatus::Success => write!(f, "success"),
            TargetStatus::Warning => write!(f, "warning"),
            TargetStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: TargetId,
    pub url: String,
    #[serde(default)]
    pub status: TargetStatus,
    #[serde(default)]
    pub last_probe_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_latency_ms: Option<u64>,
    #[serde(default)]
    pub consecutive_errors: u32,
}

impl Target {
    /// Create an unprobed target for an already normalized URL
    pub fn new(url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            status: TargetStatus::Idle,
            last_probe_at: None,
            last_latency_ms: None,
            consecutive_errors: 0,
        }
    }
}

/// Trim the input and prefix `https://` when no scheme is given.
/// Only http and https are accepted; the scheme is lowercased.
pub fn normalize_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ProberError::validation("URL cannot be empty"));
    }

    let formatted = match trimmed.split_once("://") {
        Some((scheme, rest)) if is_scheme(scheme) => {
            let scheme = scheme.to_ascii_lowercase();
            if scheme != "http" && scheme != "https" {
                return Err(ProberError::validation(format!(
                    "Unsupported scheme '{}' in '{}'",
                    scheme, trimmed
                )));
            }
            format!("{}://{}", scheme, rest)
        }
        _ => format!("https://{}", trimmed),
    };

    let parsed = Url::parse(&formatted)
        .map_err(|e| ProberError::validation(format!("Invalid URL '{}': {}", trimmed, e)))?;
    if parsed.host_str().is_none() {
        return Err(ProberError::validation(format!("URL '{}' has no host", trimmed)));
    }

    Ok(formatted)
}

fn is_scheme(candidate: &str) -> bool {
    candidate.starts_with(|c: char| c.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Scheduler settings that survive restarts
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub interval_minutes: u32,
    pub running: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 1,
            running: false,
        }
    }
}

pub fn validate_interval(minutes: u32) -> Result<()> {
    if minutes == 0 {
        return Err(ProberError::validation("interval must be at least 1 minute"));
    }
    Ok(())
}
