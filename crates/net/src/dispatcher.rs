//! Event dispatch
//!
//! Producers (the reader task and the roster poller) post events into a
//! bounded queue. A single consumer task delivers them, in order, to every
//! registered listener while holding the listener lock, so listeners never
//! run concurrently with each other.
//!
//! Callbacks may block. They run on the blocking pool, so a slow listener
//! only delays event delivery and never the reader or command traffic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use squery_core::config::{DEFAULT_EVENT_POST_TIMEOUT_MS, DEFAULT_EVENT_QUEUE_CAPACITY};
use squery_core::{Event, EventListener};
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

type Listeners = Arc<Mutex<Vec<Arc<dyn EventListener>>>>;

/// Handle for posting events and managing listeners
#[derive(Clone)]
pub struct EventDispatcher {
    tx: mpsc::Sender<Event>,
    listeners: Listeners,
    dropped: Arc<AtomicU64>,
    post_timeout: Duration,
}

/// Consumer half, run once on its own task
pub struct DispatchLoop {
    rx: mpsc::Receiver<Event>,
    listeners: Listeners,
}

fn same_listener(a: &Arc<dyn EventListener>, b: &Arc<dyn EventListener>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl EventDispatcher {
    /// Create a dispatcher with a queue of `capacity` events. Posting waits up
    /// to `post_timeout` for room before dropping the event.
    pub fn new(capacity: usize, post_timeout: Duration) -> (Self, DispatchLoop) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));

        let dispatcher = Self {
            tx,
            listeners: listeners.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
            post_timeout,
        };
        (dispatcher, DispatchLoop { rx, listeners })
    }

    /// Dispatcher with the default capacity (25) and timeout (5s)
    pub fn with_defaults() -> (Self, DispatchLoop) {
        Self::new(
            DEFAULT_EVENT_QUEUE_CAPACITY,
            Duration::from_millis(DEFAULT_EVENT_POST_TIMEOUT_MS),
        )
    }

    /// Register a listener. Returns false if this exact listener is already
    /// registered.
    pub async fn add_listener(&self, listener: Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.lock().await;
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub async fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.lock().await;
        match listeners.iter().position(|l| same_listener(l, listener)) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.lock().await.len()
    }

    /// Queue an event for delivery.
    ///
    /// Returns false if the event was dropped, either because the queue stayed
    /// full for the whole timeout or because the dispatcher has stopped.
    pub async fn post(&self, event: Event) -> bool {
        match self.tx.send_timeout(event, self.post_timeout).await {
            Ok(()) => true,
            Err(SendTimeoutError::Timeout(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(event = %event, dropped = dropped, "Unable to queue event due to timeout");
                false
            }
            Err(SendTimeoutError::Closed(event)) => {
                debug!(event = %event, "Dispatcher stopped, discarding event");
                false
            }
        }
    }

    /// Number of events dropped on timeout so far
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl DispatchLoop {
    /// Deliver events until `shutdown` fires or every producer is gone
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    debug!("Event dispatcher interrupted");
                    break;
                }
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            debug!(event = %event, "Dispatching event");
            let listeners = self.listeners.clone().lock_owned().await;
            let delivery = tokio::task::spawn_blocking(move || {
                for listener in listeners.iter() {
                    event.dispatch(listener.as_ref());
                }
            });
            if let Err(e) = delivery.await {
                warn!(error = %e, "Listener panicked during dispatch");
            }
        }

        info!("Event dispatcher terminated");
    }
}
