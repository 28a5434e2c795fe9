//! Normalizer for Prometheus-style text exposition payloads.

use std::collections::BTreeMap;

use crate::monitor::{fallback_id, Monitor};
use crate::status::Status;

const STATUS_METRIC: &str = "monitor_status";
const RESPONSE_TIME_METRIC: &str = "monitor_response_time";
const CERT_DAYS_METRIC: &str = "monitor_cert_days_remaining";
const CERT_VALID_METRIC: &str = "monitor_cert_is_valid";

const RECOGNIZED_METRICS: &[&str] = &[
    STATUS_METRIC,
    RESPONSE_TIME_METRIC,
    CERT_DAYS_METRIC,
    CERT_VALID_METRIC,
];

#[derive(Debug, Default)]
struct MetricGroup {
    status: Option<Status>,
    response_time: Option<f64>,
    cert_days_remaining: Option<f64>,
    cert_is_valid: Option<bool>,
}

/// Normalize a metrics exposition into a monitor list.
///
/// Samples are grouped by the `(monitor_name, monitor_url)` label pair;
/// the map is ordered so repeated polls list monitors consistently.
pub fn normalize_metrics(text: &str) -> Vec<Monitor> {
    let mut groups: BTreeMap<(String, String), MetricGroup> = BTreeMap::new();

    for line in text.lines() {
        let Some((name, labels, value)) = parse_line(line) else { continue };
        if !RECOGNIZED_METRICS.contains(&name) {
            continue;
        }

        let key = (
            label_value(&labels, "monitor_name"),
            label_value(&labels, "monitor_url"),
        );
        let group = groups.entry(key).or_default();
        match name {
            STATUS_METRIC => group.status = Some(Status::from_metric(value)),
            RESPONSE_TIME_METRIC => group.response_time = Some(value),
            CERT_DAYS_METRIC => group.cert_days_remaining = Some(value),
            CERT_VALID_METRIC => group.cert_is_valid = Some(value != 0.0),
            _ => {}
        }
    }

    groups
        .into_iter()
        .map(|((name_label, url_label), group)| build_monitor(name_label, url_label, group))
        .collect()
}

fn build_monitor(name_label: String, url_label: String, group: MetricGroup) -> Monitor {
    let mut status = group.status.unwrap_or(Status::Unknown);

    let latency_ms = group
        .response_time
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u64);

    // An invalid or already-expired certificate taints an otherwise-up
    // monitor; a monitor that is already worse stays as reported.
    let expired_days = group.cert_days_remaining.filter(|days| *days < 0.0);
    let cert_bad = group.cert_is_valid == Some(false) || expired_days.is_some();
    let mut message = None;
    if cert_bad && status == Status::Up {
        status = Status::Degraded;
        message = Some(match expired_days {
            Some(days) => format!("TLS certificate expired {} days ago", (-days).round() as i64),
            None => "TLS certificate is not valid".to_string(),
        });
    }

    let name = if !name_label.is_empty() {
        name_label.clone()
    } else if !url_label.is_empty() {
        url_label.clone()
    } else {
        "Unnamed monitor".to_string()
    };
    let id = if !name_label.is_empty() {
        name_label
    } else if !url_label.is_empty() {
        url_label
    } else {
        fallback_id()
    };

    Monitor {
        id,
        name,
        status,
        latency_ms,
        last_check: None,
        message,
        history: None,
    }
}

/// Parse one exposition line into `(metric_name, labels, value)`.
/// Comments, blank lines, and anything unparseable yield `None`.
fn parse_line(line: &str) -> Option<(&str, Vec<(String, String)>, f64)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Some(brace) = line.find('{') {
        let head = &line[..brace];
        // A label block only counts when the brace is attached to the
        // metric name; otherwise the brace belongs to the sample text.
        if !head.is_empty() && !head.contains(char::is_whitespace) {
            let (labels, rest) = parse_labels(&line[brace + 1..])?;
            let value = rest.split_whitespace().next()?.parse::<f64>().ok()?;
            return Some((head, labels, value));
        }
    }

    let mut parts = line.split_whitespace();
    let name = parts.next()?;
    let value = parts.next()?.parse::<f64>().ok()?;
    Some((name, Vec::new(), value))
}

/// Scan a label block, starting just past the opening brace. Returns the
/// parsed pairs and the remaining text after the closing brace.
///
/// Values are quoted and may contain backslash-escaped quotes as well as
/// literal `{`/`}`; the scanner tracks quoting state instead of
/// splitting on braces.
fn parse_labels(input: &str) -> Option<(Vec<(String, String)>, &str)> {
    let chars: Vec<char> = input.chars().collect();
    let mut labels = Vec::new();
    let mut i = 0;

    loop {
        while i < chars.len() && (chars[i] == ',' || chars[i].is_whitespace()) {
            i += 1;
        }
        if i >= chars.len() {
            return None; // unterminated label block
        }
        if chars[i] == '}' {
            i += 1;
            break;
        }

        let mut key = String::new();
        while i < chars.len() && chars[i] != '=' {
            key.push(chars[i]);
            i += 1;
        }
        if i >= chars.len() {
            return None;
        }
        i += 1; // '='
        if i >= chars.len() || chars[i] != '"' {
            return None;
        }
        i += 1; // opening quote

        let mut value = String::new();
        loop {
            if i >= chars.len() {
                return None; // unterminated value
            }
            match chars[i] {
                '\\' => {
                    i += 1;
                    if i >= chars.len() {
                        return None;
                    }
                    match chars[i] {
                        'n' => value.push('\n'),
                        other => value.push(other),
                    }
                    i += 1;
                }
                '"' => {
                    i += 1;
                    break;
                }
                other => {
                    value.push(other);
                    i += 1;
                }
            }
        }

        labels.push((key.trim().to_string(), value));
    }

    let consumed: usize = chars[..i].iter().map(|c| c.len_utf8()).sum();
    Some((labels, &input[consumed..]))
}

fn label_value(labels: &[(String, String)], name: &str) -> String {
    labels
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
        .unwrap_or_default()
}
