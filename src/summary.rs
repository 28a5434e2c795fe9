//! Reduction of a monitor list into a single summary.

use serde::Serialize;

use crate::monitor::Monitor;
use crate::status::Status;

/// Counts per status plus the single worst status present.
///
/// The degraded count absorbs monitors in maintenance; the overall
/// status likewise reads maintenance as degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub up: usize,
    pub down: usize,
    pub degraded: usize,
    pub unknown: usize,
    pub total: usize,
    pub status: Status,
}

impl Summary {
    /// The summary for an empty or failed cycle.
    pub fn empty() -> Self {
        Self {
            up: 0,
            down: 0,
            degraded: 0,
            unknown: 0,
            total: 0,
            status: Status::Unknown,
        }
    }
}

/// Reduce a monitor list to counts and the worst overall status.
pub fn aggregate(monitors: &[Monitor]) -> Summary {
    let mut summary = Summary::empty();
    let mut worst = Status::Up;

    for monitor in monitors {
        match monitor.status {
            Status::Down => summary.down += 1,
            Status::Degraded | Status::Maintenance => summary.degraded += 1,
            Status::Up => summary.up += 1,
            Status::Unknown => summary.unknown += 1,
        }
        worst = Status::worst(worst, monitor.status);
        summary.total += 1;
    }

    summary.status = if summary.total == 0 {
        Status::Unknown
    } else {
        worst.collapse_maintenance()
    };
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(id: &str, status: Status) -> Monitor {
        Monitor {
            id: id.to_string(),
            name: id.to_string(),
            status,
            latency_ms: None,
            last_check: None,
            message: None,
            history: None,
        }
    }

    #[test]
    fn test_aggregate_empty_is_all_zero_unknown() {
        let summary = aggregate(&[]);
        assert_eq!(
            summary,
            Summary {
                up: 0,
                down: 0,
                degraded: 0,
                unknown: 0,
                total: 0,
                status: Status::Unknown,
            }
        );
    }

    #[test]
    fn test_aggregate_counts_and_worst() {
        let monitors = vec![
            monitor("a", Status::Up),
            monitor("b", Status::Up),
            monitor("c", Status::Degraded),
            monitor("d", Status::Down),
            monitor("e", Status::Unknown),
        ];
        let summary = aggregate(&monitors);
        assert_eq!(summary.up, 2);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.down, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.status, Status::Down);
    }

    #[test]
    fn test_total_equals_sum_of_counts() {
        let monitors = vec![
            monitor("a", Status::Maintenance),
            monitor("b", Status::Up),
            monitor("c", Status::Unknown),
            monitor("d", Status::Down),
        ];
        let summary = aggregate(&monitors);
        assert_eq!(summary.total, summary.up + summary.down + summary.degraded + summary.unknown);
    }

    #[test]
    fn test_maintenance_counts_as_degraded_and_collapses() {
        let monitors = vec![monitor("a", Status::Up), monitor("b", Status::Maintenance)];
        let summary = aggregate(&monitors);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.status, Status::Degraded);
    }

    #[test]
    fn test_unknown_outranks_up() {
        let monitors = vec![monitor("a", Status::Up), monitor("b", Status::Unknown)];
        let summary = aggregate(&monitors);
        assert_eq!(summary.status, Status::Unknown);
    }

    #[test]
    fn test_all_up() {
        let monitors = vec![monitor("a", Status::Up), monitor("b", Status::Up)];
        let summary = aggregate(&monitors);
        assert_eq!(summary.status, Status::Up);
        assert_eq!(summary.up, 2);
    }
}
