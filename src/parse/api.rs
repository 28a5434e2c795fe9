//! Normalizer for authenticated private-API payloads.

use serde_json::Value;

use super::normalize_monitor;
use crate::monitor::Monitor;

/// Normalize a private-API payload into a monitor list. The list hides
/// under `monitors`, `data`, or `result`.
pub fn normalize_api(payload: &Value) -> Vec<Monitor> {
    let entries = payload
        .get("monitors")
        .or_else(|| payload.get("data"))
        .or_else(|| payload.get("result"))
        .and_then(Value::as_array);

    match entries {
        Some(items) => items
            .iter()
            .filter(|item| item.is_object())
            .map(normalize_monitor)
            .collect(),
        None => Vec::new(),
    }
}
