//! Server Query session
//!
//! Owns the connection and its background tasks: the reader, the event
//! dispatcher and, when enabled, the roster poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use squery_core::{Command, EventListener, QueryConfig, QueryResult, ResultRow};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collector::ResponseCollector;
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::poller::Poller;

/// Notification categories registered for every session
const TEXT_EVENTS: [&str; 3] = ["textserver", "textchannel", "textprivate"];

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// Client handle for a Server Query connection
pub struct Client {
    executor: Arc<CommandExecutor>,
    events: EventDispatcher,
    state: Arc<RwLock<ConnectionState>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: Duration,
    polling: AtomicBool,
    closing: AtomicBool,
}

impl Client {
    /// Connect to the server named in `config` and start the reader and
    /// dispatcher tasks
    pub async fn connect(config: &QueryConfig) -> Result<Self> {
        config.validate()?;

        let addr = config.address();
        info!(addr = %addr, "Connecting to server");

        let stream = TcpStream::connect(addr.as_str()).await?;
        let client = Self::start(stream, config);

        info!(addr = %addr, "Connected");
        Ok(client)
    }

    fn start(stream: TcpStream, config: &QueryConfig) -> Self {
        let (reader, writer) = stream.into_split();

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let (shutdown_tx, _) = broadcast::channel(1);
        let (response_tx, response_rx) = mpsc::channel(config.response_queue_capacity);
        let (events, dispatch_loop) =
            EventDispatcher::new(config.event_queue_capacity, config.event_post_timeout());

        let collector = ResponseCollector::new(
            response_tx,
            events.clone(),
            state.clone(),
            shutdown_tx.clone(),
        );
        let reader_handle = tokio::spawn(
            collector.run(BufReader::new(reader), shutdown_tx.subscribe()),
        );
        let dispatch_handle = tokio::spawn(dispatch_loop.run(shutdown_tx.subscribe()));

        Client {
            executor: Arc::new(CommandExecutor::new(Box::new(writer), response_rx)),
            events,
            state,
            shutdown_tx,
            tasks: Mutex::new(vec![reader_handle, dispatch_handle]),
            poll_interval: config.poll_interval(),
            polling: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    /// Send a raw command line. Blank lines are not sent and yield `None`.
    pub async fn execute(&self, line: &str) -> Result<Option<QueryResult>> {
        self.executor.execute(line).await
    }

    /// Send a structured command
    pub async fn execute_command(&self, command: &Command) -> Result<QueryResult> {
        self.executor.execute_command(command).await
    }

    /// Authenticate the query client
    pub async fn login(&self, username: &str, password: &str) -> Result<QueryResult> {
        let command = Command::new("login")
            .arg("client_login_name", username)
            .arg("client_login_password", password);
        let result = self.execute_command(&command).await?;
        if result.is_ok() {
            info!(username = %username, "Logged in");
        } else {
            warn!(username = %username, code = result.error_code(), "Login rejected");
        }
        Ok(result)
    }

    /// Select a virtual server
    pub async fn use_server(&self, server_id: u32) -> Result<QueryResult> {
        let command = Command::new("use").arg_int("sid", i64::from(server_id));
        self.execute_command(&command).await
    }

    /// Information about the query client itself, if the server returned any
    pub async fn whoami(&self) -> Result<Option<ResultRow>> {
        let result = self.execute_command(&Command::new("whoami")).await?;
        if result.has_error() {
            debug!(code = result.error_code(), "whoami rejected");
            return Ok(None);
        }
        Ok(result.into_rows().into_iter().next())
    }

    /// Channel the query client currently sits in
    pub async fn current_channel_id(&self) -> Result<Option<u32>> {
        Ok(self
            .whoami()
            .await?
            .and_then(|row| row.get_as::<u32>("client_channel_id")))
    }

    /// Register for server notifications.
    ///
    /// Text messages are always registered. With `use_polling`, membership
    /// changes come from the roster poller, which is started here; otherwise
    /// the server and current channel categories are registered instead.
    /// Returns true only if every registration succeeded.
    pub async fn register_notifications(&self, use_polling: bool) -> Result<bool> {
        let mut all_ok = true;
        for event in TEXT_EVENTS {
            all_ok &= self.register_event(event, None).await?;
        }

        if use_polling {
            self.start_polling().await;
        } else {
            all_ok &= self.register_event("server", None).await?;
            match self.current_channel_id().await? {
                Some(channel_id) => {
                    all_ok &= self.register_event("channel", Some(channel_id)).await?;
                }
                None => {
                    warn!("Unable to resolve current channel, channel events not registered");
                    all_ok = false;
                }
            }
        }

        Ok(all_ok)
    }

    async fn register_event(&self, event: &str, channel_id: Option<u32>) -> Result<bool> {
        let mut command = Command::new("servernotifyregister").arg("event", event);
        if let Some(id) = channel_id {
            command = command.arg_int("id", i64::from(id));
        }

        let result = self.execute_command(&command).await?;
        if result.has_error() {
            warn!(
                event = %event,
                code = result.error_code(),
                message = %result.error_message(),
                "Notification registration failed"
            );
        }
        Ok(result.is_ok())
    }

    /// Start the roster poller. Returns false if it is already running or the
    /// session is shutting down.
    pub async fn start_polling(&self) -> bool {
        if !self.executor.is_accepting() || self.polling.swap(true, Ordering::SeqCst) {
            return false;
        }

        let poller = Poller::new(self.executor.clone(), self.events.clone(), self.poll_interval);
        let handle = tokio::spawn(poller.run(self.shutdown_tx.subscribe()));
        self.tasks.lock().await.push(handle);
        true
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    /// Register a listener. Returns false if it is already registered.
    pub async fn add_listener(&self, listener: Arc<dyn EventListener>) -> bool {
        self.events.add_listener(listener).await
    }

    /// Unregister a listener. Returns false if it was not registered.
    pub async fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.events.remove_listener(listener).await
    }

    /// Events dropped because the event queue stayed full
    pub fn dropped_events(&self) -> u64 {
        self.events.dropped_events()
    }

    /// Get current connection state
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Stop every background task and close the connection.
    ///
    /// Commands are refused from the start of the call. Calling this more than
    /// once is harmless.
    pub async fn disconnect(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        self.executor.stop_accepting();
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.executor.close().await {
            debug!(error = %e, "Error closing write half");
        }

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task failed");
            }
        }

        *self.state.write().await = ConnectionState::Disconnected;
        info!("Disconnected from server");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
