//! Shared helpers for the async tests

use std::sync::Arc;
use std::time::Duration;

use squery_core::{ClientRef, Event, EventListener, MessageMode};
use tokio::sync::mpsc;

/// Upper bound for any single wait in a test
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn client_ref(id: u32) -> ClientRef {
    ClientRef {
        name: format!("client{}", id),
        id,
        uid: format!("uid{}", id),
    }
}

pub(crate) fn client_event(id: u32) -> Event {
    Event::ClientConnected(client_ref(id))
}

/// Listener that reports every callback as a line on a channel
pub(crate) struct Probe {
    tag: String,
    tx: mpsc::UnboundedSender<String>,
}

impl Probe {
    pub(crate) fn new(tag: &str) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tag: tag.to_string(),
                tx,
            },
            rx,
        )
    }

    /// Another probe reporting to the same channel
    pub(crate) fn with_tag(&self, tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            tx: self.tx.clone(),
        }
    }

    fn report(&self, line: String) {
        let _ = self.tx.send(format!("{} {}", self.tag, line));
    }
}

impl EventListener for Probe {
    fn on_client_connected(&self, client: &ClientRef) {
        self.report(format!("connected {}", client.id));
    }

    fn on_client_disconnected(&self, client: &ClientRef) {
        self.report(format!("disconnected {}", client.id));
    }

    fn on_client_moved(&self, client: &ClientRef, source_channel: u32, dest_channel: u32) {
        self.report(format!(
            "moved {} {}->{}",
            client.id, source_channel, dest_channel
        ));
    }

    fn on_message(&self, client: &ClientRef, mode: MessageMode, text: &str) {
        self.report(format!("message {} {:?} {}", client.id, mode, text));
    }
}

/// Listener that blocks its thread for `delay` before each report
pub(crate) struct SlowListener {
    inner: Arc<Probe>,
    delay: Duration,
}

impl SlowListener {
    pub(crate) fn new(tag: &str, delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (probe, rx) = Probe::new(tag);
        (
            Self {
                inner: Arc::new(probe),
                delay,
            },
            rx,
        )
    }
}

impl EventListener for SlowListener {
    fn on_client_connected(&self, client: &ClientRef) {
        std::thread::sleep(self.delay);
        self.inner.on_client_connected(client);
    }

    fn on_client_disconnected(&self, client: &ClientRef) {
        std::thread::sleep(self.delay);
        self.inner.on_client_disconnected(client);
    }

    fn on_client_moved(&self, client: &ClientRef, source_channel: u32, dest_channel: u32) {
        std::thread::sleep(self.delay);
        self.inner.on_client_moved(client, source_channel, dest_channel);
    }

    fn on_message(&self, client: &ClientRef, mode: MessageMode, text: &str) {
        std::thread::sleep(self.delay);
        self.inner.on_message(client, mode, text);
    }
}
