//! Core model types shared across the fetch pipeline.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::status::Status;

/// A single monitored service as reported by the server.
///
/// The identifier is non-empty and stable across polls for the same
/// server-side monitor; downstream caching and change detection rely on
/// that.
#[derive(Debug, Clone, Serialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    pub status: Status,
    /// Rounded response time in milliseconds, when the server reports one.
    pub latency_ms: Option<u64>,
    pub last_check: Option<DateTime<Utc>>,
    pub message: Option<String>,
    /// Fixed-length bucketed history, when requested and available.
    pub history: Option<Vec<StatusBucket>>,
}

/// A raw status observation at a point in time (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub status: Status,
    pub timestamp: i64,
}

/// One fixed-width slot of a bucketed history. The timestamp is the
/// bucket's end time in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBucket {
    pub status: Status,
    pub timestamp: i64,
}

/// Which upstream payload shape produced a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    StatusPage,
    Api,
    Metrics,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Source::StatusPage => "status-page",
            Source::Api => "api",
            Source::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// The complete outcome of one poll cycle. Rebuilt from scratch every
/// cycle and superseded entirely by the next one.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub source: Source,
    pub monitors: Vec<Monitor>,
    /// Bucketed history keyed by monitor id, for monitors whose history
    /// arrived with (or was backfilled into) this cycle.
    pub history: HashMap<String, Vec<StatusBucket>>,
}

/// Synthesize an identifier for monitors the server left anonymous.
pub fn fallback_id() -> String {
    let token: u64 = rand::random();
    format!("monitor-{:016x}", token)
}

/// Fixture monitors used when demo mode is enabled.
pub fn demo_monitors() -> Vec<Monitor> {
    let now = Utc::now();
    let entry = |id: &str, name: &str, status, latency_ms, age_seconds, message: Option<&str>| Monitor {
        id: id.to_string(),
        name: name.to_string(),
        status,
        latency_ms,
        last_check: Some(now - ChronoDuration::seconds(age_seconds)),
        message: message.map(str::to_string),
        history: None,
    };

    vec![
        entry("frontend", "Frontend", Status::Up, Some(185), 45, None),
        entry(
            "api-gateway",
            "API Gateway",
            Status::Degraded,
            Some(420),
            120,
            Some("Slight latency increase detected"),
        ),
        entry("database", "Database", Status::Down, None, 15, Some("No heartbeat received")),
        entry("background-jobs", "Background Jobs", Status::Up, Some(98), 360, None),
        entry("external-ping", "External Ping", Status::Unknown, None, 720, None),
    ]
}
