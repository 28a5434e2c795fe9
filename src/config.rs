//! Configuration module for kumawatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use async_trait::async_trait;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::history::{DEFAULT_BUCKET_COUNT, DEFAULT_RANGE_SECONDS};
use crate::request::RetryPolicy;

/// Upstream payload shape to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMode {
    StatusPage,
    Api,
    Metrics,
}

impl ApiMode {
    /// Parse a mode selector. Unrecognized values fall back to the
    /// status-page default.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "api" | "api-key" => ApiMode::Api,
            "metrics" => ApiMode::Metrics,
            _ => ApiMode::StatusPage,
        }
    }
}

/// Async accessor for the API credential. Yields nothing when no
/// credential is stored; the orchestrator decides whether that is fatal
/// for the selected mode.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn api_key(&self) -> Option<String>;
}

/// Credential provider backed by the `KUMAWATCH_API_KEY` variable.
#[derive(Debug, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn api_key(&self) -> Option<String> {
        env::var("KUMAWATCH_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Poller configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base address of the server, e.g. "https://status.example.org".
    pub base_url: String,
    pub mode: ApiMode,
    pub status_page_slug: String,
    /// Endpoint template; `{{slug}}` is substituted before the request.
    pub status_page_endpoint: String,
    /// Full override for the status-page JSON location.
    pub status_page_json_url: String,
    pub api_endpoint: String,
    pub metrics_endpoint: String,
    pub heartbeat_endpoint: String,
    /// Interval between poll cycles.
    pub refresh: Duration,
    /// Monitor ids to keep; empty keeps all of them.
    pub selected: HashSet<String>,
    pub include_history: bool,
    pub bucket_count: usize,
    /// History lookback window in seconds.
    pub history_window: i64,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub retries: u32,
    /// Use fixture monitors instead of the network.
    pub demo_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            mode: ApiMode::StatusPage,
            status_page_slug: "default".to_string(),
            status_page_endpoint: "status/{{slug}}/status.json".to_string(),
            status_page_json_url: String::new(),
            api_endpoint: "api/monitor".to_string(),
            metrics_endpoint: "metrics".to_string(),
            heartbeat_endpoint: "api/heartbeat".to_string(),
            refresh: Duration::from_secs(60),
            selected: HashSet::new(),
            include_history: true,
            bucket_count: DEFAULT_BUCKET_COUNT,
            history_window: DEFAULT_RANGE_SECONDS,
            timeout: Duration::from_secs(8),
            retries: 3,
            demo_mode: false,
        }
    }
}

impl Settings {
    /// Load configuration from `KUMAWATCH_*` environment variables.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = env::var("KUMAWATCH_BASE_URL") {
            cfg.base_url = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_MODE") {
            cfg.mode = ApiMode::parse(&v);
        }
        if let Ok(v) = env::var("KUMAWATCH_STATUS_PAGE_SLUG") {
            cfg.status_page_slug = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_STATUS_PAGE_ENDPOINT") {
            cfg.status_page_endpoint = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_STATUS_PAGE_JSON_URL") {
            cfg.status_page_json_url = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_API_ENDPOINT") {
            cfg.api_endpoint = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_METRICS_ENDPOINT") {
            cfg.metrics_endpoint = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_HEARTBEAT_ENDPOINT") {
            cfg.heartbeat_endpoint = v.trim().to_string();
        }
        if let Ok(v) = env::var("KUMAWATCH_REFRESH_SECONDS") {
            if let Ok(seconds) = v.trim().parse::<u64>() {
                cfg.refresh = Duration::from_secs(seconds.max(10));
            }
        }
        if let Ok(v) = env::var("KUMAWATCH_SELECTED") {
            cfg.selected = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(v) = env::var("KUMAWATCH_INCLUDE_HISTORY") {
            cfg.include_history = parse_bool(&v);
        }
        if let Ok(v) = env::var("KUMAWATCH_BUCKET_COUNT") {
            if let Ok(count) = v.trim().parse::<usize>() {
                if count > 0 {
                    cfg.bucket_count = count;
                }
            }
        }
        if let Ok(v) = env::var("KUMAWATCH_HISTORY_WINDOW_SECONDS") {
            if let Ok(seconds) = v.trim().parse::<i64>() {
                if seconds > 0 {
                    cfg.history_window = seconds;
                }
            }
        }
        if let Ok(v) = env::var("KUMAWATCH_TIMEOUT_SECONDS") {
            if let Ok(seconds) = v.trim().parse::<u64>() {
                if seconds > 0 {
                    cfg.timeout = Duration::from_secs(seconds);
                }
            }
        }
        if let Ok(v) = env::var("KUMAWATCH_RETRIES") {
            if let Ok(retries) = v.trim().parse::<u32>() {
                if retries > 0 {
                    cfg.retries = retries;
                }
            }
        }
        if let Ok(v) = env::var("KUMAWATCH_DEMO") {
            cfg.demo_mode = parse_bool(&v);
        }

        cfg
    }

    /// Retry schedule for the request executor.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retries,
            ..RetryPolicy::default()
        }
    }

    /// Cache key for configuration-scoped state. Any change here makes
    /// previously cached per-monitor history unusable.
    pub fn fingerprint(&self) -> String {
        let mut selected: Vec<&str> = self.selected.iter().map(String::as_str).collect();
        selected.sort_unstable();
        format!(
            "{}|{:?}|{}|{}|{}|{}|{}|{}|{}",
            self.base_url,
            self.mode,
            self.status_page_slug,
            self.status_page_endpoint,
            self.status_page_json_url,
            self.api_endpoint,
            self.metrics_endpoint,
            self.heartbeat_endpoint,
            selected.join(",")
        )
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
