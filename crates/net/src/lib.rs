//! Server Query Network Library
//!
//! Tokio runtime for a Server Query session.
//!
//! # Architecture
//!
//! - **Reader**: one task reads lines, routes `notify*` lines to the event
//!   dispatcher and groups the rest into responses ending in an `error` line
//! - **Executor**: one command in flight at a time, so each response pairs
//!   with the command that caused it
//! - **Dispatcher**: one task delivers events to listeners in order
//! - **Poller**: optional task that diffs the client list into events
//!
//! # Usage
//!
//! ```ignore
//! let client = Client::connect(&config).await?;
//! client.login("serveradmin", "secret").await?;
//! client.use_server(1).await?;
//! client.add_listener(Arc::new(MyListener)).await;
//! client.register_notifications(true).await?;
//!
//! let result = client.execute("clientlist -uid").await?;
//!
//! client.disconnect().await;
//! ```

pub mod client;
pub mod collector;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod frame;
pub mod poller;

#[cfg(test)]
mod server;
#[cfg(test)]
mod testing;

pub use client::{Client, ConnectionState};
pub use dispatcher::EventDispatcher;
pub use error::{Error, Result};
pub use squery_core::config::DEFAULT_PORT;
