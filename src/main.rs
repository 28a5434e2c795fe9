//! kumawatch - Uptime Kuma polling companion
//!
//! Minimal consumer of the poller's event stream: polls on the
//! configured interval and logs summaries and status transitions. A
//! real front-end would subscribe the same way and render instead.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kumawatch::config::{EnvCredentials, Settings};
use kumawatch::poller::{PollEvent, Poller};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("kumawatch=info".parse()?))
        .init();

    // Load configuration
    let settings = Settings::load();
    tracing::info!(
        mode = ?settings.mode,
        refresh_seconds = settings.refresh.as_secs(),
        "starting kumawatch"
    );
    if settings.demo_mode {
        tracing::info!("demo mode enabled, polling fixture monitors");
    }

    let (event_tx, mut event_rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = broadcast::channel(1);

    let poller = Poller::new(settings, Arc::new(EnvCredentials), event_tx)?;
    let handle = tokio::spawn(poller.run(stop_rx));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                let _ = stop_tx.send(());
                break;
            }
            event = event_rx.recv() => {
                match event {
                    Some(event) => report(event),
                    None => break,
                }
            }
        }
    }

    // Close our end of the event channel so an in-flight cycle cannot
    // block on a full queue while we wait for the poller to wind down.
    drop(event_rx);
    handle.await?;
    Ok(())
}

/// Render one poll event into the log.
fn report(event: PollEvent) {
    match event {
        PollEvent::CycleCompleted { result, summary, .. } => {
            tracing::info!(
                source = %result.source,
                "{} up / {} down ({} monitors)",
                summary.up,
                summary.down,
                summary.total
            );
        }
        PollEvent::CycleFailed { error, .. } => {
            tracing::warn!(%error, "no data this cycle");
        }
        PollEvent::MonitorOffline { name, to, .. } => {
            tracing::warn!(monitor = %name, status = %to, "monitor went offline");
        }
        PollEvent::MonitorRecovered { name, .. } => {
            tracing::info!(monitor = %name, "monitor recovered");
        }
    }
}
