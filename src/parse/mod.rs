//! Payload normalization for the three supported wire formats.
//!
//! Server payloads are dynamically shaped: fields come and go and most
//! logical values go by several names. Each logical value is resolved
//! against an ordered candidate list, first match wins. Normalization
//! never fails; malformed fields degrade to unknown/absent instead of
//! aborting the batch.

mod api;
mod metrics;
mod status_page;

pub use api::*;
pub use metrics::*;
pub use status_page::*;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::monitor::{fallback_id, Monitor, StatusEvent};
use crate::status::Status;

const STATUS_FIELDS: &[&str] = &["status", "statusClass"];
const LATENCY_FIELDS: &[&str] = &["ping", "latency", "responseTime"];
const LAST_CHECK_FIELDS: &[&str] = &["lastCheck", "lastHeartbeat", "lastUpdated"];
const MESSAGE_FIELDS: &[&str] = &["message", "msg", "lastMessage"];

const HEARTBEAT_STATUS_FIELDS: &[&str] = &["status", "up", "down", "heartbeat"];
const HEARTBEAT_TIME_FIELDS: &[&str] = &["time", "timestamp", "datetime", "created_at", "date"];

/// Epoch numbers above this are taken to be milliseconds.
const MILLIS_THRESHOLD: f64 = 10_000_000_000.0;

/// First non-null field among the ordered candidates.
fn first_field<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    candidates
        .iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
}

/// Parse a latency value into rounded, non-negative milliseconds.
fn parse_latency(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number.round() as u64)
}

/// Parse a timestamp from an ISO-8601 string or an epoch number.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => epoch_to_datetime(n.as_f64()?),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
                return Some(parsed.with_timezone(&Utc));
            }
            // Uptime Kuma also emits naive "YYYY-MM-DD hh:mm:ss" stamps.
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            trimmed.parse::<f64>().ok().and_then(epoch_to_datetime)
        }
        _ => None,
    }
}

fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let seconds = if value > MILLIS_THRESHOLD { value / 1000.0 } else { value };
    DateTime::from_timestamp(seconds.floor() as i64, 0)
}

/// Normalize one raw monitor object. Missing or malformed fields
/// degrade to defaults rather than failing the entry.
fn normalize_monitor(raw: &Value) -> Monitor {
    let status = first_field(raw, STATUS_FIELDS)
        .map(Status::classify)
        .unwrap_or(Status::Unknown);
    let latency_ms = first_field(raw, LATENCY_FIELDS).and_then(parse_latency);
    let last_check = first_field(raw, LAST_CHECK_FIELDS).and_then(parse_timestamp);
    let message = first_field(raw, MESSAGE_FIELDS)
        .and_then(Value::as_str)
        .map(str::to_string);

    let id = match raw.get("id") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
    .or_else(|| raw.get("slug").and_then(Value::as_str).map(str::to_string))
    .or_else(|| raw.get("name").and_then(Value::as_str).map(str::to_string))
    .unwrap_or_else(fallback_id);

    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .or_else(|| raw.get("title").and_then(Value::as_str))
        .unwrap_or("Unnamed monitor")
        .to_string();

    Monitor {
        id,
        name,
        status,
        latency_ms,
        last_check,
        message,
        history: None,
    }
}

/// Normalize one heartbeat-like record into a raw status event.
/// Records without a usable timestamp are dropped.
fn parse_heartbeat(raw: &Value) -> Option<StatusEvent> {
    let timestamp = first_field(raw, HEARTBEAT_TIME_FIELDS)
        .and_then(parse_timestamp)?
        .timestamp();
    let status = first_field(raw, HEARTBEAT_STATUS_FIELDS)
        .map(Status::classify)
        .unwrap_or(Status::Unknown);
    Some(StatusEvent { status, timestamp })
}

/// Extract heartbeat events from a backfill response, which may be a
/// bare array or an object wrapping one.
pub fn parse_heartbeat_list(payload: &Value) -> Vec<StatusEvent> {
    let records = match payload {
        Value::Array(items) => Some(items),
        Value::Object(_) => ["data", "heartbeatList", "heartbeats", "result"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_array)),
        _ => None,
    };

    records
        .map(|items| items.iter().filter_map(parse_heartbeat).collect())
        .unwrap_or_default()
}
