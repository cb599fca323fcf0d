//! Roster polling
//!
//! Periodically lists every client on the server and turns differences
//! between consecutive listings into connect, disconnect and move events.

use std::sync::Arc;
use std::time::Duration;

use squery_core::{roster_command, ClientSnapshot, Command, RosterTracker};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dispatcher::EventDispatcher;
use crate::error::Error;
use crate::executor::CommandExecutor;

pub struct Poller {
    executor: Arc<CommandExecutor>,
    events: EventDispatcher,
    interval: Duration,
    command: Command,
    tracker: RosterTracker,
}

/// What a single poll cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Posted(usize),
    Skipped,
    Stop,
}

impl Poller {
    pub fn new(executor: Arc<CommandExecutor>, events: EventDispatcher, interval: Duration) -> Self {
        Self {
            executor,
            events,
            interval,
            command: roster_command(),
            tracker: RosterTracker::new(),
        }
    }

    /// Poll until `shutdown` fires or the connection goes away
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.interval.as_millis() as u64, "Roster poller started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("Roster poller interrupted");
                    break;
                }
                _ = ticker.tick() => {
                    let cycle = tokio::select! {
                        biased;
                        _ = shutdown.recv() => Cycle::Stop,
                        cycle = self.poll_once() => cycle,
                    };
                    match cycle {
                        Cycle::Stop => break,
                        Cycle::Posted(count) if count > 0 => {
                            debug!(events = count, "Roster cycle complete");
                        }
                        _ => {}
                    }
                }
            }
        }

        info!("Roster poller terminated");
    }

    async fn poll_once(&mut self) -> Cycle {
        let result = match self.executor.execute_command(&self.command).await {
            Ok(result) => result,
            Err(Error::NotConnected) | Err(Error::ConnectionClosed) => {
                debug!("Connection gone, stopping roster poller");
                return Cycle::Stop;
            }
            Err(e) => {
                warn!(error = %e, "Roster query failed");
                return Cycle::Skipped;
            }
        };

        if result.has_error() {
            warn!(
                code = result.error_code(),
                message = %result.error_message(),
                "Roster query rejected"
            );
            return Cycle::Skipped;
        }

        let snapshot = ClientSnapshot::from_rows(result.rows());
        let first = !self.tracker.is_initialized();
        let events = self.tracker.update(snapshot);
        if first {
            debug!("Roster baseline captured");
        }

        let count = events.len();
        for event in events {
            debug!(event = %event, "Roster change");
            self.events.post(event).await;
        }
        Cycle::Posted(count)
    }
}
