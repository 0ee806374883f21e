//! Configuration management for the prober service

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ProberError, Result};
use crate::probe::ProbeSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP surface listens on
    pub bind_address: String,

    /// JSON file holding the persisted snapshot
    pub state_file: PathBuf,

    /// Hard timeout for the primary GET request
    pub primary_timeout: Duration,

    /// Timeout for the passive fallback signal
    pub fallback_timeout: Duration,

    /// Fallback signals at or after this are classified as slow
    pub slow_threshold: Duration,

    /// Number of activity entries kept in memory
    pub activity_log_capacity: usize,

    /// Interval used when no snapshot exists yet
    pub default_interval_minutes: u32,

    /// Resume monitoring on startup when the snapshot says it was running
    pub resume_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            state_file: PathBuf::from("data/targets.json"),
            primary_timeout: Duration::from_millis(10_000),
            fallback_timeout: Duration::from_millis(8_000),
            slow_threshold: Duration::from_millis(5_000),
            activity_log_capacity: 50,
            default_interval_minutes: 1,
            resume_on_start: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(bind_address) = env::var("BIND_ADDRESS") {
            config.bind_address = bind_address;
        }

        if let Ok(state_file) = env::var("STATE_FILE") {
            config.state_file = PathBuf::from(state_file);
        }

        if let Ok(timeout) = env::var("PRIMARY_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.primary_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(timeout) = env::var("FALLBACK_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.fallback_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(threshold) = env::var("SLOW_THRESHOLD_MS") {
            if let Ok(ms) = threshold.parse::<u64>() {
                config.slow_threshold = Duration::from_millis(ms);
            }
        }

        if let Ok(capacity) = env::var("ACTIVITY_LOG_CAPACITY") {
            if let Ok(size) = capacity.parse() {
                config.activity_log_capacity = size;
            }
        }

        if let Ok(interval) = env::var("DEFAULT_INTERVAL_MINUTES") {
            if let Ok(minutes) = interval.parse() {
                config.default_interval_minutes = minutes;
            }
        }

        if let Ok(resume) = env::var("RESUME_ON_START") {
            config.resume_on_start = resume.to_lowercase() == "true";
        }

        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.is_empty() {
            return Err(ProberError::Config("bind_address cannot be empty".to_string()));
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(ProberError::Config("state_file cannot be empty".to_string()));
        }

        if self.primary_timeout.is_zero() {
            return Err(ProberError::Config("primary_timeout must be greater than 0".to_string()));
        }

        if self.fallback_timeout.is_zero() {
            return Err(ProberError::Config("fallback_timeout must be greater than 0".to_string()));
        }

        if self.slow_threshold >= self.fallback_timeout {
            return Err(ProberError::Config("slow_threshold must be shorter than fallback_timeout".to_string()));
        }

        if self.activity_log_capacity == 0 {
            return Err(ProberError::Config("activity_log_capacity must be greater than 0".to_string()));
        }

        if self.default_interval_minutes == 0 {
            return Err(ProberError::Config("default_interval_minutes must be at least 1".to_string()));
        }

        Ok(())
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            primary_timeout: self.primary_timeout,
            fallback_timeout: self.fallback_timeout,
            slow_threshold: self.slow_threshold,
        }
    }
}
