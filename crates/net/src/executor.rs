//! Command execution
//!
//! The protocol answers commands strictly in order with exactly one response
//! each, so holding a single lock from write until the response arrives is
//! enough to pair every reply with its command.
//!
//! A caller may drop `execute` after the line went out but before its reply
//! arrived. The reply is then owed: the next command discards it before
//! sending, so replies never shift onto later commands.

use std::sync::atomic::{AtomicBool, Ordering};

use squery_core::notify::first_token;
use squery_core::{Command, QueryResult};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::write_line;

/// Write half of the connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct CommandChannel {
    writer: BoxedWriter,
    responses: mpsc::Receiver<Vec<String>>,
    /// Replies for commands whose caller went away before reading them
    owed: usize,
    closed: bool,
}

impl CommandChannel {
    /// Discard replies left behind by cancelled commands
    async fn settle(&mut self) -> Result<()> {
        while self.owed > 0 {
            let stale = self.responses.recv().await.ok_or(Error::ConnectionClosed)?;
            self.owed -= 1;
            debug!(lines = stale.len(), "Discarded reply of cancelled command");
        }
        Ok(())
    }

    /// Write `line` and wait for its reply. The reply stays owed until it has
    /// been received, so dropping this future part way leaves the count
    /// correct for the next command.
    async fn round_trip(&mut self, line: &str) -> Result<Vec<String>> {
        self.owed += 1;
        if let Err(e) = write_line(&mut self.writer, line).await {
            self.owed -= 1;
            return Err(e);
        }

        let batch = self.responses.recv().await.ok_or(Error::ConnectionClosed)?;
        self.owed -= 1;
        Ok(batch)
    }
}

pub struct CommandExecutor {
    channel: Mutex<CommandChannel>,
    accepting: AtomicBool,
}

impl CommandExecutor {
    pub fn new(writer: BoxedWriter, responses: mpsc::Receiver<Vec<String>>) -> Self {
        Self {
            channel: Mutex::new(CommandChannel {
                writer,
                responses,
                owed: 0,
                closed: false,
            }),
            accepting: AtomicBool::new(true),
        }
    }

    /// Send a raw command line and wait for its response.
    ///
    /// A blank line is not sent and yields `Ok(None)`. A non-zero error code
    /// from the server is returned inside the result, not as an error.
    pub async fn execute(&self, line: &str) -> Result<Option<QueryResult>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !self.is_accepting() {
            return Err(Error::NotConnected);
        }

        let mut channel = self.channel.lock().await;
        if channel.closed {
            return Err(Error::NotConnected);
        }

        channel.settle().await?;

        debug!(command = %first_token(line), "Sending command");
        let batch = channel.round_trip(line).await?;
        let result = QueryResult::from_lines(&batch);

        debug!(
            command = %first_token(line),
            code = result.error_code(),
            rows = result.rows().len(),
            "Command completed"
        );
        Ok(Some(result))
    }

    /// Send a structured command and wait for its response
    pub async fn execute_command(&self, command: &Command) -> Result<QueryResult> {
        if command.name().trim().is_empty() {
            return Err(Error::Protocol("Command name is empty".into()));
        }
        self.execute(&command.to_string())
            .await?
            .ok_or_else(|| Error::Protocol("Command produced an empty line".into()))
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Reject new commands. A command already waiting for its reply is not
    /// affected.
    pub fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Stop accepting commands and shut down the write half. Waits for any
    /// in-flight command to finish first.
    pub async fn close(&self) -> Result<()> {
        self.stop_accepting();

        let mut channel = self.channel.lock().await;
        if channel.closed {
            return Ok(());
        }
        channel.closed = true;
        channel.writer.shutdown().await?;
        debug!("Command channel closed");
        Ok(())
    }
}
