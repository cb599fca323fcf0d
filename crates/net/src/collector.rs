//! Reader task
//!
//! Owns the read half of the connection. Notification lines are decoded and
//! posted as events; every other line is buffered until an `error` line
//! closes the batch, which is then handed to the executor as one response.

use std::sync::Arc;

use squery_core::notify::first_token;
use squery_core::{decode_notification, is_notification};
use tokio::io::AsyncBufRead;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::client::ConnectionState;
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::frame::{read_line, skip_banner};

/// First token of the line that terminates every response
const TERMINAL_TOKEN: &str = "error";

pub struct ResponseCollector {
    responses: mpsc::Sender<Vec<String>>,
    events: EventDispatcher,
    state: Arc<RwLock<ConnectionState>>,
    /// Stops the other session tasks once the connection is gone
    shutdown_tx: broadcast::Sender<()>,
    pending: Vec<String>,
}

impl ResponseCollector {
    pub fn new(
        responses: mpsc::Sender<Vec<String>>,
        events: EventDispatcher,
        state: Arc<RwLock<ConnectionState>>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            responses,
            events,
            state,
            shutdown_tx,
            pending: Vec::new(),
        }
    }

    /// Read until end of stream, a read error, or `shutdown`.
    ///
    /// Dropping the collector on return closes the response queue, which
    /// wakes any caller waiting for a reply. The shutdown signal is then sent
    /// so the dispatcher and poller stop as well.
    pub async fn run<R: AsyncBufRead + Unpin>(
        mut self,
        mut reader: R,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let result = tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!("Reader interrupted");
                Ok(())
            }
            result = self.read_loop(&mut reader) => result,
        };

        match result {
            Ok(()) => debug!("Reader reached end of stream"),
            Err(e) => warn!(error = %e, "Read error"),
        }

        if !self.pending.is_empty() {
            debug!(lines = self.pending.len(), "Discarding incomplete response");
        }

        *self.state.write().await = ConnectionState::Disconnected;
        // No receivers left just means everything already stopped
        let _ = self.shutdown_tx.send(());
        info!("Reader terminated");
    }

    async fn read_loop<R: AsyncBufRead + Unpin>(&mut self, reader: &mut R) -> Result<()> {
        skip_banner(reader).await?;

        while let Some(line) = read_line(reader).await? {
            if !self.handle_line(line).await {
                debug!("Response queue closed");
                break;
            }
        }
        Ok(())
    }

    /// Route one line. Returns false once nobody is listening for responses.
    async fn handle_line(&mut self, line: String) -> bool {
        if is_notification(&line) {
            if let Some(event) = decode_notification(&line) {
                self.events.post(event).await;
            }
            return true;
        }

        let terminal = first_token(&line).eq_ignore_ascii_case(TERMINAL_TOKEN);
        self.pending.push(line);

        if terminal {
            let batch = std::mem::take(&mut self.pending);
            debug!(lines = batch.len(), "Response complete");
            if self.responses.send(batch).await.is_err() {
                return false;
            }
        }
        true
    }
}
