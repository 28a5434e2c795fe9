//! Poll-cycle orchestration and status-change detection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

use crate::config::{CredentialProvider, Settings};
use crate::fetch::{FetchError, Fetcher};
use crate::history;
use crate::monitor::{demo_monitors, FetchResult, Monitor, Source, StatusBucket};
use crate::status::Status;
use crate::summary::{aggregate, Summary};

/// Events emitted to the presentation collaborator.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A cycle finished. Carries the full result, its summary, and the
    /// merged cross-monitor history series.
    CycleCompleted {
        result: FetchResult,
        summary: Summary,
        overall_history: Vec<StatusBucket>,
    },
    /// A cycle failed terminally. Prior data is superseded by the
    /// explicit unknown state in `summary`; nothing stale survives.
    CycleFailed { error: String, summary: Summary },
    /// A monitor crossed from up into down or degraded.
    MonitorOffline {
        id: String,
        name: String,
        from: Status,
        to: Status,
    },
    /// A monitor crossed from down or degraded back to up.
    MonitorRecovered { id: String, name: String, from: Status },
}

/// Runs the fetch pipeline on a fixed interval.
///
/// At most one cycle is in flight at a time: the cycle is awaited inside
/// the tick loop and ticks that fire mid-cycle are skipped, never
/// queued. Stopping (or dropping the run future) cancels in-flight
/// backoff timers outright, so no stale request resolves into an
/// obsolete result.
pub struct Poller {
    fetcher: Fetcher,
    settings: Settings,
    credentials: Arc<dyn CredentialProvider>,
    previous_status: HashMap<String, Status>,
    events: mpsc::Sender<PollEvent>,
}

impl Poller {
    pub fn new(
        settings: Settings,
        credentials: Arc<dyn CredentialProvider>,
        events: mpsc::Sender<PollEvent>,
    ) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(&settings)?;
        Ok(Self {
            fetcher,
            settings,
            credentials,
            previous_status: HashMap::new(),
            events,
        })
    }

    /// Run cycles until the stop channel fires. The first cycle starts
    /// immediately.
    pub async fn run(mut self, mut stop: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.settings.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop.recv() => {
                    tracing::debug!("poller stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.cycle().await;
                }
            }
        }
    }

    /// Execute one poll cycle.
    pub async fn cycle(&mut self) {
        let outcome = if self.settings.demo_mode {
            Ok(demo_result())
        } else {
            self.fetcher
                .fetch(&self.settings, self.credentials.as_ref())
                .await
        };

        match outcome {
            Ok(result) => {
                for event in self.detect_changes(&result.monitors) {
                    self.emit(event).await;
                }

                let summary = aggregate(&result.monitors);
                let overall_history = history::merge_histories(&result.monitors);
                tracing::debug!(
                    up = summary.up,
                    down = summary.down,
                    degraded = summary.degraded,
                    unknown = summary.unknown,
                    status = %summary.status,
                    "poll cycle completed"
                );
                self.emit(PollEvent::CycleCompleted {
                    result,
                    summary,
                    overall_history,
                })
                .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "poll cycle failed");
                self.emit(PollEvent::CycleFailed {
                    error: e.to_string(),
                    summary: Summary::empty(),
                })
                .await;
            }
        }
    }

    /// Compare against the previous cycle and record transitions.
    ///
    /// First sightings are recorded silently so a fresh start does not
    /// announce every monitor at once. The map mutates only here, at
    /// the end of a completed cycle.
    fn detect_changes(&mut self, monitors: &[Monitor]) -> Vec<PollEvent> {
        let mut events = Vec::new();

        for monitor in monitors {
            let current = monitor.status;
            match self.previous_status.get(&monitor.id).copied() {
                Some(Status::Up) if matches!(current, Status::Down | Status::Degraded) => {
                    events.push(PollEvent::MonitorOffline {
                        id: monitor.id.clone(),
                        name: monitor.name.clone(),
                        from: Status::Up,
                        to: current,
                    });
                }
                Some(previous @ (Status::Down | Status::Degraded)) if current == Status::Up => {
                    events.push(PollEvent::MonitorRecovered {
                        id: monitor.id.clone(),
                        name: monitor.name.clone(),
                        from: previous,
                    });
                }
                _ => {}
            }
            self.previous_status.insert(monitor.id.clone(), current);
        }

        events
    }

    async fn emit(&self, event: PollEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("event consumer is gone");
        }
    }
}

fn demo_result() -> FetchResult {
    FetchResult {
        source: Source::StatusPage,
        monitors: demo_monitors(),
        history: HashMap::new(),
    }
}
