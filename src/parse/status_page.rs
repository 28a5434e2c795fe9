//! Normalizer for public status-page JSON payloads.

use std::collections::HashMap;

use serde_json::Value;

use super::{normalize_monitor, parse_heartbeat};
use crate::monitor::{Monitor, StatusEvent};

const HEARTBEAT_MAP_KEYS: &[&str] = &["heartbeatList", "heartbeats"];

/// Normalize a status-page payload into a monitor list plus raw
/// heartbeat series keyed by monitor id.
///
/// The entity list hides under `monitors` or `data`, either directly as
/// an array or nested one level inside an object.
pub fn normalize_status_page(payload: &Value) -> (Vec<Monitor>, HashMap<String, Vec<StatusEvent>>) {
    let list = payload.get("monitors").or_else(|| payload.get("data"));

    let entries: Vec<&Value> = match list {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => match map.get("monitors") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => map.values().collect(),
        },
        _ => Vec::new(),
    };

    let monitors = entries
        .into_iter()
        .filter(|item| item.is_object())
        .map(normalize_monitor)
        .collect();

    (monitors, heartbeat_map(payload))
}

/// Heartbeat series shipped inline with some status pages, keyed by the
/// id of the monitor they belong to.
fn heartbeat_map(payload: &Value) -> HashMap<String, Vec<StatusEvent>> {
    let mut map = HashMap::new();

    let Some(raw) = HEARTBEAT_MAP_KEYS
        .iter()
        .find_map(|key| payload.get(*key))
        .and_then(Value::as_object)
    else {
        return map;
    };

    for (id, series) in raw {
        let Some(items) = series.as_array() else { continue };
        let events: Vec<StatusEvent> = items.iter().filter_map(parse_heartbeat).collect();
        if !events.is_empty() {
            map.insert(id.clone(), events);
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use serde_json::json;

    #[test]
    fn test_monitors_under_monitors_key() {
        let payload = json!({"monitors": [{"id": 1, "name": "Web", "status": "up"}]});
        let (monitors, heartbeats) = normalize_status_page(&payload);
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].id, "1");
        assert_eq!(monitors[0].status, Status::Up);
        assert!(heartbeats.is_empty());
    }

    #[test]
    fn test_monitors_under_data_key() {
        let payload = json!({"data": [{"id": 2, "name": "API", "status": 0}]});
        let (monitors, _) = normalize_status_page(&payload);
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].status, Status::Down);
    }

    #[test]
    fn test_monitors_nested_inside_object() {
        let payload = json!({"data": {"monitors": [{"id": 3, "name": "DB", "status": 1}]}});
        let (monitors, _) = normalize_status_page(&payload);
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].id, "3");
    }

    #[test]
    fn test_monitors_as_object_values() {
        let payload = json!({"monitors": {
            "a": {"id": "a", "name": "A", "status": 1},
            "b": {"id": "b", "name": "B", "status": 0},
        }});
        let (monitors, _) = normalize_status_page(&payload);
        assert_eq!(monitors.len(), 2);
    }

    #[test]
    fn test_malformed_entries_are_skipped_not_fatal() {
        let payload = json!({"monitors": [
            null,
            "junk",
            {"id": 1, "name": "Web", "status": "up"},
        ]});
        let (monitors, _) = normalize_status_page(&payload);
        assert_eq!(monitors.len(), 1);
    }

    #[test]
    fn test_empty_or_shapeless_payloads() {
        assert!(normalize_status_page(&json!({})).0.is_empty());
        assert!(normalize_status_page(&json!(null)).0.is_empty());
        assert!(normalize_status_page(&json!({"monitors": 7})).0.is_empty());
    }

    #[test]
    fn test_heartbeat_map_extraction() {
        let payload = json!({
            "monitors": [{"id": 1, "name": "Web", "status": "up"}],
            "heartbeatList": {
                "1": [
                    {"status": 1, "time": 1_700_000_000},
                    {"status": 0, "time": 1_700_000_060},
                ],
                "2": "not-a-list",
            },
        });
        let (_, heartbeats) = normalize_status_page(&payload);
        assert_eq!(heartbeats.len(), 1);
        let series = &heartbeats["1"];
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].status, Status::Down);
    }
}
