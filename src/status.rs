//! Monitor status vocabulary and classification.
//!
//! Servers report status as numeric codes, free-text labels, or metric
//! values depending on the wire format. Everything funnels into the
//! closed five-value vocabulary here; classification is total and never
//! fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Health of a monitored service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Degraded,
    Down,
    Maintenance,
    Unknown,
}

/// Severity ranking, most severe first. Used wherever several statuses
/// reduce to a single worst one.
const SEVERITY_ORDER: [Status; 5] = [
    Status::Down,
    Status::Degraded,
    Status::Maintenance,
    Status::Unknown,
    Status::Up,
];

impl Status {
    /// Classify a raw JSON value into a status.
    pub fn classify(value: &Value) -> Status {
        match value {
            Value::Number(n) => n.as_f64().map(Status::from_metric).unwrap_or(Status::Unknown),
            Value::String(s) => Status::from_label(s),
            _ => Status::Unknown,
        }
    }

    /// Classify a numeric status code or metric sample value.
    pub fn from_metric(value: f64) -> Status {
        if !value.is_finite() || value.fract() != 0.0 {
            return Status::Unknown;
        }
        match value as i64 {
            0 => Status::Down,
            1 => Status::Up,
            2 => Status::Degraded,
            3 => Status::Maintenance,
            _ => Status::Unknown,
        }
    }

    /// Classify a free-text status label, case-insensitively.
    pub fn from_label(label: &str) -> Status {
        match label.trim().to_ascii_lowercase().as_str() {
            "up" | "online" | "operational" | "ok" => Status::Up,
            "degraded" | "warning" | "partial" => Status::Degraded,
            "down" | "offline" | "critical" | "error" | "fail" => Status::Down,
            "maintenance" | "maintenance_mode" => Status::Maintenance,
            _ => Status::Unknown,
        }
    }

    /// Rank in the severity order; lower is worse.
    fn severity(self) -> usize {
        SEVERITY_ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(SEVERITY_ORDER.len())
    }

    /// The more severe of two statuses.
    pub fn worst(a: Status, b: Status) -> Status {
        if b.severity() < a.severity() {
            b
        } else {
            a
        }
    }

    /// Maintenance reads as degraded in summary-level views; individual
    /// monitors and buckets keep the distinct value.
    pub fn collapse_maintenance(self) -> Status {
        if self == Status::Maintenance {
            Status::Degraded
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Degraded => "degraded",
            Status::Down => "down",
            Status::Maintenance => "maintenance",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_numeric_codes() {
        assert_eq!(Status::classify(&json!(0)), Status::Down);
        assert_eq!(Status::classify(&json!(1)), Status::Up);
        assert_eq!(Status::classify(&json!(2)), Status::Degraded);
        assert_eq!(Status::classify(&json!(3)), Status::Maintenance);
        assert_eq!(Status::classify(&json!(7)), Status::Unknown);
        assert_eq!(Status::classify(&json!(-1)), Status::Unknown);
        assert_eq!(Status::classify(&json!(1.5)), Status::Unknown);
    }

    #[test]
    fn test_classify_labels() {
        for label in ["up", "online", "operational", "ok"] {
            assert_eq!(Status::from_label(label), Status::Up);
        }
        for label in ["degraded", "warning", "partial"] {
            assert_eq!(Status::from_label(label), Status::Degraded);
        }
        for label in ["down", "offline", "critical", "error", "fail"] {
            assert_eq!(Status::from_label(label), Status::Down);
        }
        for label in ["maintenance", "maintenance_mode"] {
            assert_eq!(Status::from_label(label), Status::Maintenance);
        }
        assert_eq!(Status::from_label("flaky"), Status::Unknown);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(Status::classify(&json!("UP")), Status::Up);
        assert_eq!(Status::classify(&json!("Offline")), Status::Down);
        assert_eq!(Status::classify(&json!("  ok  ")), Status::Up);
    }

    #[test]
    fn test_classify_never_fails() {
        assert_eq!(Status::classify(&Value::Null), Status::Unknown);
        assert_eq!(Status::classify(&json!(true)), Status::Unknown);
        assert_eq!(Status::classify(&json!([1, 2])), Status::Unknown);
        assert_eq!(Status::classify(&json!({"nested": 1})), Status::Unknown);
    }

    #[test]
    fn test_worst_follows_severity_order() {
        assert_eq!(Status::worst(Status::Up, Status::Down), Status::Down);
        assert_eq!(Status::worst(Status::Down, Status::Up), Status::Down);
        assert_eq!(Status::worst(Status::Degraded, Status::Maintenance), Status::Degraded);
        assert_eq!(Status::worst(Status::Maintenance, Status::Unknown), Status::Maintenance);
        assert_eq!(Status::worst(Status::Unknown, Status::Up), Status::Unknown);
        assert_eq!(Status::worst(Status::Up, Status::Up), Status::Up);
    }

    #[test]
    fn test_collapse_maintenance() {
        assert_eq!(Status::Maintenance.collapse_maintenance(), Status::Degraded);
        assert_eq!(Status::Down.collapse_maintenance(), Status::Down);
        assert_eq!(Status::Up.collapse_maintenance(), Status::Up);
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Status::Up).unwrap(), "\"up\"");
        assert_eq!(serde_json::to_string(&Status::Maintenance).unwrap(), "\"maintenance\"");
    }
}
