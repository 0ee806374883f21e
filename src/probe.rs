//! Reachability probing and outcome classification
//!
//! A probe issues one GET request bounded by a hard timeout. When the
//! response exists but cannot be observed (redirect loops, broken bodies),
//! the executor falls back to a passive signal probe and classifies on
//! timing alone: a fast signal is a success, a late one is a warning and
//! no signal at all is an error.

use crate::errors::{ProberError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, instrument};

/// Three-way outcome of a probe
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Success,
    Warning,
    Error,
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Success => write!(f, "success"),
            Classification::Warning => write!(f, "warning"),
            Classification::Error => write!(f, "error"),
        }
    }
}

/// Why a probe did not succeed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "reason", rename_all = "camelCase")]
pub enum ProbeFailure {
    /// Primary request got no response before its timeout
    Timeout,
    /// Connection refused, DNS or TLS failure
    Network(String),
    /// Fallback probe saw nothing before its own timeout
    NoSignal,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Timeout => write!(f, "timeout (no response)"),
            ProbeFailure::Network(reason) => write!(f, "{}", reason),
            ProbeFailure::NoSignal => write!(f, "no signal from fallback probe"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub classification: Classification,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub failure: Option<ProbeFailure>,
    pub via_fallback: bool,
}

impl ProbeResult {
    pub fn success(latency_ms: u64, status_code: Option<u16>) -> Self {
        Self {
            classification: Classification::Success,
            latency_ms: Some(latency_ms),
            status_code,
            failure: None,
            via_fallback: false,
        }
    }

    pub fn slow(latency_ms: u64) -> Self {
        Self {
            classification: Classification::Warning,
            latency_ms: Some(latency_ms),
            status_code: None,
            failure: None,
            via_fallback: false,
        }
    }

    pub fn failed(latency_ms: Option<u64>, failure: ProbeFailure) -> Self {
        Self {
            classification: Classification::Error,
            latency_ms,
            status_code: None,
            failure: Some(failure),
            via_fallback: false,
        }
    }

    fn from_fallback(mut self) -> Self {
        self.via_fallback = true;
        self
    }

    /// One-line description used for activity entries
    pub fn describe(&self, url: &str) -> String {
        let latency = self
            .latency_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "n/a".to_string());

        match (&self.classification, &self.failure) {
            (Classification::Success, _) => match self.status_code {
                Some(code) => format!("{} responded with {} ({})", url, code, latency),
                None => format!("{} is reachable ({})", url, latency),
            },
            (Classification::Warning, _) => format!("{} responded slowly ({})", url, latency),
            (Classification::Error, Some(failure)) => {
                format!("{} unreachable: {} ({})", url, failure, latency)
            }
            (Classification::Error, None) => format!("{} unreachable ({})", url, latency),
        }
    }
}

/// Failure reported by a transport's primary request
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFailure {
    Timeout,
    Network(String),
    /// A response exists but could not be observed; worth a fallback probe
    Opaque(String),
}

/// Network side of a probe
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Issue the primary GET and return the response status
    async fn fetch(&self, url: &str) -> std::result::Result<u16, TransportFailure>;

    /// Passive load of the target; resolves as soon as any response or
    /// failure is observed
    async fn signal(&self, url: &str);
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpProbeTransport {
    client: Client,
}

impl HttpProbeTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("keepalive_prober/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProberError::Http)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for HttpProbeTransport {
    async fn fetch(&self, url: &str) -> std::result::Result<u16, TransportFailure> {
        let response = self
            .client
            .get(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        Ok(response.status().as_u16())
    }

    async fn signal(&self, url: &str) {
        let busted = cache_busted_url(url, chrono::Utc::now().timestamp_millis());
        match self.client.get(&busted).send().await {
            Ok(response) => debug!("Fallback signal from {}: {}", url, response.status()),
            Err(e) => debug!("Fallback signal from {} (failure): {}", url, e),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else if err.is_connect() {
        TransportFailure::Network(format!("connection failed: {}", err))
    } else if err.is_redirect() || err.is_decode() || err.is_body() {
        TransportFailure::Opaque(err.to_string())
    } else {
        TransportFailure::Network(err.to_string())
    }
}

/// Append a `_ping` query parameter so caches cannot answer the fallback
pub fn cache_busted_url(url: &str, stamp_ms: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_ping={}", url, separator, stamp_ms)
}

/// Classify a fallback probe from the time its signal arrived
pub fn classify_fallback(signal_after: Option<Duration>, slow_threshold: Duration) -> Classification {
    match signal_after {
        None => Classification::Error,
        Some(elapsed) if elapsed < slow_threshold => Classification::Success,
        Some(_) => Classification::Warning,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub primary_timeout: Duration,
    pub fallback_timeout: Duration,
    pub slow_threshold: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_millis(10_000),
            fallback_timeout: Duration::from_millis(8_000),
            slow_threshold: Duration::from_millis(5_000),
        }
    }
}

/// Executes single probes; cheap to clone and share across tasks
#[derive(Clone)]
pub struct ProbeExecutor {
    transport: Arc<dyn ProbeTransport>,
    settings: ProbeSettings,
}

impl ProbeExecutor {
    /// Executor backed by a real HTTP client
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpProbeTransport::new()?), settings))
    }

    pub fn with_transport(transport: Arc<dyn ProbeTransport>, settings: ProbeSettings) -> Self {
        Self { transport, settings }
    }

    /// Probe `url` once. Never fails: every failure mode is a classified result.
    #[instrument(skip(self))]
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();

        match timeout(self.settings.primary_timeout, self.transport.fetch(url)).await {
            Ok(Ok(status)) => ProbeResult::success(elapsed_ms(start), Some(status)),
            Ok(Err(TransportFailure::Opaque(reason))) => {
                debug!("Response from {} not observable ({}), using fallback probe", url, reason);
                self.fallback(url).await
            }
            Ok(Err(TransportFailure::Network(reason))) => {
                ProbeResult::failed(Some(elapsed_ms(start)), ProbeFailure::Network(reason))
            }
            Ok(Err(TransportFailure::Timeout)) | Err(_) => {
                ProbeResult::failed(Some(elapsed_ms(start)), ProbeFailure::Timeout)
            }
        }
    }

    async fn fallback(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let signal_after = timeout(self.settings.fallback_timeout, self.transport.signal(url))
            .await
            .ok()
            .map(|_| start.elapsed());

        let latency_ms = elapsed_ms(start);
        let result = match classify_fallback(signal_after, self.settings.slow_threshold) {
            Classification::Success => ProbeResult::success(latency_ms, None),
            Classification::Warning => ProbeResult::slow(latency_ms),
            Classification::Error => ProbeResult::failed(Some(latency_ms), ProbeFailure::NoSignal),
        };

        result.from_fallback()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, ScriptedTransport};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor(transport: ScriptedTransport) -> ProbeExecutor {
        ProbeExecutor::with_transport(Arc::new(transport), ProbeSettings::default())
    }

    #[test]
    fn test_fallback_boundaries() {
        let threshold = Duration::from_millis(5_000);
        assert_eq!(
            classify_fallback(Some(Duration::from_millis(4_999)), threshold),
            Classification::Success
        );
        assert_eq!(
            classify_fallback(Some(Duration::from_millis(5_001)), threshold),
            Classification::Warning
        );
        assert_eq!(classify_fallback(None, threshold), Classification::Error);
    }

    #[test]
    fn test_cache_busted_url() {
        assert_eq!(cache_busted_url("https://a.com", 42), "https://a.com?_ping=42");
        assert_eq!(cache_busted_url("https://a.com/?x=1", 42), "https://a.com/?x=1&_ping=42");
    }

    #[test]
    fn test_describe_mentions_failure_reason() {
        let result = ProbeResult::failed(Some(10_000), ProbeFailure::Timeout);
        let text = result.describe("https://a.com");
        assert!(text.contains("https://a.com"));
        assert!(text.contains("timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_response_is_success() {
        let transport = ScriptedTransport::new()
            .with("https://a.com", Behavior::respond(Duration::from_millis(120), 503));
        let result = executor(transport).probe("https://a.com").await;

        assert_eq!(result.classification, Classification::Success);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.latency_ms, Some(120));
        assert!(!result.via_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_timeout_is_error_with_elapsed_latency() {
        let transport = ScriptedTransport::new()
            .with("https://hang.com", Behavior::respond(Duration::from_secs(60), 200));
        let result = executor(transport).probe("https://hang.com").await;

        assert_eq!(result.classification, Classification::Error);
        assert_eq!(result.failure, Some(ProbeFailure::Timeout));
        assert_eq!(result.latency_ms, Some(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_is_error_without_fallback() {
        let transport = ScriptedTransport::new().with(
            "https://down.com",
            Behavior::network(Duration::from_millis(30), "connection refused"),
        );
        let transport_handle = transport.clone();
        let result = executor(transport).probe("https://down.com").await;

        assert_eq!(result.classification, Classification::Error);
        assert!(matches!(result.failure, Some(ProbeFailure::Network(_))));
        assert_eq!(result.latency_ms, Some(30));
        assert_eq!(transport_handle.signal_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_fallback_signal_is_success() {
        let transport = ScriptedTransport::new().with(
            "https://opaque.com",
            Behavior::opaque(Some(Duration::from_millis(4_900))),
        );
        let result = executor(transport).probe("https://opaque.com").await;

        assert_eq!(result.classification, Classification::Success);
        assert!(result.via_fallback);
        assert_eq!(result.latency_ms, Some(4_900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_fallback_signal_is_warning() {
        let transport = ScriptedTransport::new().with(
            "https://opaque.com",
            Behavior::opaque(Some(Duration::from_millis(5_100))),
        );
        let result = executor(transport).probe("https://opaque.com").await;

        assert_eq!(result.classification, Classification::Warning);
        assert!(result.via_fallback);
        assert!(result.failure.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fallback_signal_is_error() {
        let transport = ScriptedTransport::new()
            .with("https://opaque.com", Behavior::opaque(None));
        let result = executor(transport).probe("https://opaque.com").await;

        assert_eq!(result.classification, Classification::Error);
        assert_eq!(result.failure, Some(ProbeFailure::NoSignal));
        assert_eq!(result.latency_ms, Some(8_000));
    }

    #[tokio::test]
    async fn test_http_transport_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = ProbeExecutor::new(ProbeSettings::default()).unwrap();
        let result = executor.probe(&format!("{}/health", server.uri())).await;

        assert_eq!(result.classification, Classification::Success);
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn test_http_transport_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let settings = ProbeSettings {
            primary_timeout: Duration::from_millis(200),
            ..ProbeSettings::default()
        };
        let executor = ProbeExecutor::new(settings).unwrap();
        let result = executor.probe(&server.uri()).await;

        assert_eq!(result.classification, Classification::Error);
        assert_eq!(result.failure, Some(ProbeFailure::Timeout));
    }

    #[tokio::test]
    async fn test_http_transport_connection_refused() {
        let executor = ProbeExecutor::new(ProbeSettings::default()).unwrap();
        let result = executor.probe("http://127.0.0.1:1").await;

        assert_eq!(result.classification, Classification::Error);
        assert!(matches!(result.failure, Some(ProbeFailure::Network(_))));
        assert!(!result.via_fallback);
    }

    #[tokio::test]
    async fn test_http_redirect_loop_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
            .mount(&server)
            .await;

        let executor = ProbeExecutor::new(ProbeSettings::default()).unwrap();
        let result = executor.probe(&format!("{}/loop", server.uri())).await;

        assert!(result.via_fallback);
        assert_eq!(result.classification, Classification::Success);
    }
}
