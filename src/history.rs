//! Time-bucketed status history: bucketing, merging, and resampling.
//!
//! Raw heartbeat events arrive unordered and irregularly timed. They are
//! reduced to a fixed number of equal-width buckets over a fixed lookback
//! window so histories from different monitors line up and render at a
//! constant width.

use std::collections::BTreeMap;

use crate::monitor::{Monitor, StatusBucket, StatusEvent};
use crate::status::Status;

/// Default lookback window, 24 hours.
pub const DEFAULT_RANGE_SECONDS: i64 = 86_400;
/// Default number of buckets in a history.
pub const DEFAULT_BUCKET_COUNT: usize = 24;

/// Reduce raw events to exactly `bucket_count` buckets ending at `now`.
///
/// Single left-to-right sweep over the events, sorted ascending. Events
/// at or before the window start seed the carried status, so a history
/// that existed just outside the window does not render the first
/// buckets as spuriously unknown. A bucket containing events takes the
/// worst status observed inside it; a bucket with none carries the last
/// observed status forward; with no preceding event at all it is
/// unknown. Runs in O(events log events + buckets).
pub fn bucketize(
    events: &[StatusEvent],
    now: i64,
    range_seconds: i64,
    bucket_count: usize,
) -> Vec<StatusBucket> {
    if bucket_count == 0 {
        return Vec::new();
    }
    let range = if range_seconds > 0 { range_seconds } else { DEFAULT_RANGE_SECONDS };

    let mut sorted = events.to_vec();
    sorted.sort_by_key(|event| event.timestamp);

    let window_start = now - range;
    let mut index = 0;
    let mut carried: Option<Status> = None;

    // Consume pre-window events as seed state. There is no bound on how
    // far back the seed may come from.
    while index < sorted.len() && sorted[index].timestamp <= window_start {
        carried = Some(sorted[index].status);
        index += 1;
    }

    let mut buckets = Vec::with_capacity(bucket_count);
    for i in 0..bucket_count {
        let end = window_start + ((i as i64 + 1) * range) / bucket_count as i64;

        let mut observed: Option<Status> = None;
        while index < sorted.len() && sorted[index].timestamp <= end {
            let status = sorted[index].status;
            observed = Some(match observed {
                Some(worst) => Status::worst(worst, status),
                None => status,
            });
            carried = Some(status);
            index += 1;
        }

        let status = observed.or(carried).unwrap_or(Status::Unknown);
        buckets.push(StatusBucket { status, timestamp: end });
    }

    buckets
}

/// Merge per-monitor histories into one overall series.
///
/// Timestamps are unioned across monitors; each distinct timestamp keeps
/// the worst status reported at it. Maintenance reads as degraded in
/// this merged view only.
pub fn merge_histories(monitors: &[Monitor]) -> Vec<StatusBucket> {
    let mut by_timestamp: BTreeMap<i64, Status> = BTreeMap::new();

    for monitor in monitors {
        let Some(history) = &monitor.history else { continue };
        for bucket in history {
            by_timestamp
                .entry(bucket.timestamp)
                .and_modify(|worst| *worst = Status::worst(*worst, bucket.status))
                .or_insert(bucket.status);
        }
    }

    by_timestamp
        .into_iter()
        .map(|(timestamp, status)| StatusBucket {
            status: status.collapse_maintenance(),
            timestamp,
        })
        .collect()
}

/// Map a bucket sequence to a fixed visual bar count.
///
/// Longer input is sampled at evenly spaced nearest-floor indices,
/// shorter input is left-padded with unknown bars, equal-length input
/// passes through unchanged. Purely a display-resolution concern; the
/// sampled bucket timestamps are copied untouched.
pub fn resample(buckets: &[StatusBucket], target: usize) -> Vec<StatusBucket> {
    if target == 0 {
        return Vec::new();
    }

    if buckets.len() > target {
        let stride = buckets.len() as f64 / target as f64;
        (0..target)
            .map(|i| buckets[(i as f64 * stride) as usize])
            .collect()
    } else if buckets.len() < target {
        let mut out = vec![
            StatusBucket {
                status: Status::Unknown,
                timestamp: 0,
            };
            target - buckets.len()
        ];
        out.extend_from_slice(buckets);
        out
    } else {
        buckets.to_vec()
    }
}
