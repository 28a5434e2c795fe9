//! Fetch orchestration: mode dispatch, normalization, history assembly.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ApiMode, CredentialProvider, Settings};
use crate::history;
use crate::monitor::{FetchResult, Monitor, Source, StatusBucket, StatusEvent};
use crate::parse;
use crate::request::{RequestError, RequestExecutor};

/// Fetch error types. Field-level payload anomalies are absorbed by the
/// normalizers; only configuration problems, exhausted transport
/// failures, and structurally unparseable bodies surface here.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("invalid response payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Drives one poll cycle: selects the normalizer for the configured
/// mode, executes requests, and assembles per-monitor history.
///
/// Also owns the cycle-spanning history cache, which only ever mutates
/// at the end of a completed cycle.
pub struct Fetcher {
    executor: RequestExecutor,
    history_cache: HashMap<String, Vec<StatusBucket>>,
    cache_fingerprint: String,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let executor = RequestExecutor::new(settings.timeout, settings.retry_policy())?;
        Ok(Self {
            executor,
            history_cache: HashMap::new(),
            cache_fingerprint: settings.fingerprint(),
        })
    }

    /// Run one fetch cycle against the configured server.
    pub async fn fetch(
        &mut self,
        settings: &Settings,
        credentials: &dyn CredentialProvider,
    ) -> Result<FetchResult, FetchError> {
        self.invalidate_if_reconfigured(settings);

        if settings.base_url.trim().is_empty() {
            return Err(FetchError::Config("base URL is missing".into()));
        }

        let mut result = match settings.mode {
            ApiMode::StatusPage => self.fetch_status_page(settings).await?,
            ApiMode::Api => self.fetch_api(settings, credentials).await?,
            ApiMode::Metrics => self.fetch_metrics(settings, credentials).await?,
        };

        if !settings.selected.is_empty() {
            result.monitors.retain(|m| settings.selected.contains(&m.id));
            tracing::debug!(count = result.monitors.len(), "filtered to selected monitors");
        }

        if settings.include_history {
            self.populate_history(&mut result, settings, credentials).await;
            self.cache_history(&result.monitors);
        }

        Ok(result)
    }

    /// Fetch the 24-hour uptime badge for one monitor and extract its
    /// percentage figure from the SVG.
    pub async fn fetch_uptime_badge(
        &self,
        id: &str,
        settings: &Settings,
    ) -> Result<Option<f64>, FetchError> {
        if settings.base_url.trim().is_empty() {
            return Err(FetchError::Config("base URL is missing".into()));
        }

        let endpoint = format!("api/badge/{}/uptime/24h", urlencoding::encode(id));
        let url = join_url(&settings.base_url, &endpoint);
        tracing::debug!(%url, "fetching uptime badge");

        let request = self
            .executor
            .client()
            .get(&url)
            .header(ACCEPT, "image/svg+xml,*/*;q=0.8")
            .build()
            .map_err(RequestError::from)?;
        let svg = self.executor.execute(request).await?;
        Ok(badge_percentage(&svg))
    }

    async fn fetch_status_page(&self, settings: &Settings) -> Result<FetchResult, FetchError> {
        let url = join_url(&settings.base_url, &status_page_endpoint(settings));
        tracing::debug!(%url, "fetching status page");

        let payload = self.get_json(&url, None).await?;
        let (monitors, heartbeats) = parse::normalize_status_page(&payload);

        let mut history = HashMap::new();
        if settings.include_history && !heartbeats.is_empty() {
            let now = Utc::now().timestamp();
            for (id, events) in heartbeats {
                history.insert(
                    id,
                    history::bucketize(&events, now, settings.history_window, settings.bucket_count),
                );
            }
        }

        Ok(FetchResult {
            source: Source::StatusPage,
            monitors,
            history,
        })
    }

    async fn fetch_api(
        &self,
        settings: &Settings,
        credentials: &dyn CredentialProvider,
    ) -> Result<FetchResult, FetchError> {
        let token = require_token(credentials).await?;
        let url = join_url(&settings.base_url, &settings.api_endpoint);
        tracing::debug!(%url, "fetching private API");

        let payload = self.get_json(&url, Some(&token)).await?;
        let monitors = parse::normalize_api(&payload);

        Ok(FetchResult {
            source: Source::Api,
            monitors,
            history: HashMap::new(),
        })
    }

    async fn fetch_metrics(
        &self,
        settings: &Settings,
        credentials: &dyn CredentialProvider,
    ) -> Result<FetchResult, FetchError> {
        let token = require_token(credentials).await?;
        let url = join_url(&settings.base_url, &settings.metrics_endpoint);
        tracing::debug!(%url, "fetching metrics exposition");

        // The metrics endpoint authenticates with HTTP Basic, empty
        // username and the token as password.
        let request = self
            .executor
            .client()
            .get(&url)
            .header(ACCEPT, "text/plain")
            .basic_auth("", Some(&token))
            .build()
            .map_err(RequestError::from)?;
        let text = self.executor.execute(request).await?;
        let monitors = parse::normalize_metrics(&text);

        Ok(FetchResult {
            source: Source::Metrics,
            monitors,
            history: HashMap::new(),
        })
    }

    /// Attach a history to every monitor, consulting the inline
    /// status-page heartbeats, then the cycle-spanning cache, and
    /// finally the per-monitor backfill endpoint. Backfill failures are
    /// isolated per monitor.
    async fn populate_history(
        &mut self,
        result: &mut FetchResult,
        settings: &Settings,
        credentials: &dyn CredentialProvider,
    ) {
        for monitor in &mut result.monitors {
            if monitor.history.is_some() {
                continue;
            }
            if let Some(buckets) = result.history.get(&monitor.id) {
                monitor.history = Some(buckets.clone());
            } else if let Some(cached) = self.history_cache.get(&monitor.id) {
                monitor.history = Some(cached.clone());
            }
        }

        if result.monitors.iter().all(|m| m.history.is_some()) {
            return;
        }

        if settings.mode != ApiMode::Api {
            tracing::debug!("heartbeat backfill is not available in this mode");
            return;
        }

        let Some(token) = credentials.api_key().await else {
            tracing::debug!("cannot backfill heartbeat history without an API token");
            return;
        };

        let now = Utc::now().timestamp();
        for monitor in result.monitors.iter_mut().filter(|m| m.history.is_none()) {
            let buckets = match backfill_monitor(&self.executor, &monitor.id, settings, &token).await
            {
                Ok(events) => {
                    history::bucketize(&events, now, settings.history_window, settings.bucket_count)
                }
                Err(e) => {
                    tracing::debug!(monitor = %monitor.id, error = %e, "heartbeat backfill failed");
                    history::bucketize(&[], now, settings.history_window, settings.bucket_count)
                }
            };
            result.history.insert(monitor.id.clone(), buckets.clone());
            monitor.history = Some(buckets);
        }
    }

    async fn get_json(&self, url: &str, authorization: Option<&str>) -> Result<Value, FetchError> {
        let mut builder = self
            .executor
            .client()
            .get(url)
            .header(ACCEPT, "application/json");
        if let Some(token) = authorization {
            builder = builder.header(AUTHORIZATION, token);
        }
        let request = builder.build().map_err(RequestError::from)?;
        let text = self.executor.execute(request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn invalidate_if_reconfigured(&mut self, settings: &Settings) {
        let fingerprint = settings.fingerprint();
        if fingerprint != self.cache_fingerprint {
            tracing::debug!("configuration changed, dropping cached history");
            self.history_cache.clear();
            self.cache_fingerprint = fingerprint;
        }
    }

    fn cache_history(&mut self, monitors: &[Monitor]) {
        for monitor in monitors {
            if let Some(history) = &monitor.history {
                if !history.is_empty() {
                    self.history_cache.insert(monitor.id.clone(), history.clone());
                }
            }
        }
    }
}

async fn require_token(credentials: &dyn CredentialProvider) -> Result<String, FetchError> {
    credentials
        .api_key()
        .await
        .ok_or_else(|| FetchError::Config("API token is not available".into()))
}

async fn backfill_monitor(
    executor: &RequestExecutor,
    id: &str,
    settings: &Settings,
    token: &str,
) -> Result<Vec<StatusEvent>, FetchError> {
    let limit = settings.bucket_count.max(24);
    let endpoint = format!(
        "{}/{}?limit={}",
        settings.heartbeat_endpoint.trim_end_matches('/'),
        urlencoding::encode(id),
        limit
    );
    let url = join_url(&settings.base_url, &endpoint);
    tracing::debug!(monitor = %id, %url, "backfilling heartbeat history");

    let request = executor
        .client()
        .get(&url)
        .header(ACCEPT, "application/json")
        .header(AUTHORIZATION, token)
        .build()
        .map_err(RequestError::from)?;
    let text = executor.execute(request).await?;
    let payload: Value = serde_json::from_str(&text)?;
    Ok(parse::parse_heartbeat_list(&payload))
}

/// Join a base address and a path, tolerating stray slashes. Absolute
/// paths pass through untouched.
fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Resolve the status-page endpoint: an explicit JSON URL wins,
/// otherwise the endpoint template with `{{slug}}` substituted.
fn status_page_endpoint(settings: &Settings) -> String {
    if !settings.status_page_json_url.is_empty() {
        return settings.status_page_json_url.clone();
    }

    let template = if settings.status_page_endpoint.is_empty() {
        "status/{{slug}}/status.json"
    } else {
        settings.status_page_endpoint.as_str()
    };
    let slug = if settings.status_page_slug.is_empty() {
        "default"
    } else {
        settings.status_page_slug.as_str()
    };
    let encoded = urlencoding::encode(slug);

    if template.contains("{{slug}}") {
        template.replace("{{slug}}", &encoded)
    } else {
        format!("{}/{}", template, encoded)
    }
}

/// Pull the uptime percentage out of a badge SVG.
fn badge_percentage(svg: &str) -> Option<f64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r">\s*(\d+(?:[.,]\d+)?)\s*%").expect("hard-coded pattern"));

    let captured = re.captures(svg)?.get(1)?.as_str().replace(',', ".");
    captured.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a", "b"), "http://a/b");
        assert_eq!(join_url("http://a/", "/b"), "http://a/b");
        assert_eq!(join_url("http://a", ""), "http://a");
        assert_eq!(join_url("", "b"), "b");
        assert_eq!(join_url("http://a", "https://c/d"), "https://c/d");
    }

    #[test]
    fn test_status_page_endpoint_template() {
        let mut settings = Settings::default();
        settings.status_page_slug = "prod".to_string();
        assert_eq!(status_page_endpoint(&settings), "status/prod/status.json");

        // Slugs are encoded into the path.
        settings.status_page_slug = "a b".to_string();
        assert_eq!(status_page_endpoint(&settings), "status/a%20b/status.json");

        // A template without the placeholder gets the slug appended.
        settings.status_page_slug = "prod".to_string();
        settings.status_page_endpoint = "status-pages".to_string();
        assert_eq!(status_page_endpoint(&settings), "status-pages/prod");

        // An explicit JSON URL wins over the template.
        settings.status_page_json_url = "https://x/status.json".to_string();
        assert_eq!(status_page_endpoint(&settings), "https://x/status.json");
    }

    #[test]
    fn test_badge_percentage() {
        let svg = r#"<svg><text x="10">uptime</text><text x="20">99.95 %</text></svg>"#;
        assert_eq!(badge_percentage(svg), Some(99.95));

        // Comma decimal separators are tolerated.
        let svg = r#"<text>99,9%</text>"#;
        assert_eq!(badge_percentage(svg), Some(99.9));

        let svg = r#"<text>100%</text>"#;
        assert_eq!(badge_percentage(svg), Some(100.0));

        assert_eq!(badge_percentage("<svg></svg>"), None);
        assert_eq!(badge_percentage(""), None);
    }

    #[test]
    fn test_cache_invalidation_on_reconfiguration() {
        let settings = Settings::default();
        let mut fetcher = Fetcher::new(&settings).unwrap();
        fetcher.history_cache.insert("web".to_string(), Vec::new());

        // Same settings keep the cache.
        fetcher.invalidate_if_reconfigured(&settings);
        assert!(fetcher.history_cache.contains_key("web"));

        // Changing the base address drops it wholesale.
        let mut changed = settings.clone();
        changed.base_url = "https://elsewhere".to_string();
        fetcher.invalidate_if_reconfigured(&changed);
        assert!(fetcher.history_cache.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_without_base_url_fails_fast() {
        let settings = Settings::default();
        let mut fetcher = Fetcher::new(&settings).unwrap();
        let err = fetcher
            .fetch(&settings, &crate::config::EnvCredentials)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[tokio::test]
    async fn test_api_mode_without_token_fails_fast() {
        struct NoToken;

        #[async_trait::async_trait]
        impl CredentialProvider for NoToken {
            async fn api_key(&self) -> Option<String> {
                None
            }
        }

        let mut settings = Settings::default();
        settings.base_url = "http://127.0.0.1:1".to_string();
        settings.mode = ApiMode::Api;

        let mut fetcher = Fetcher::new(&settings).unwrap();
        let err = fetcher.fetch(&settings, &NoToken).await.unwrap_err();
        assert!(matches!(err, FetchError::Config(message) if message.contains("token")));
    }
}
