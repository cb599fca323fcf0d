//! Client events and listeners
//!
//! Events come from two producers: decoded `notify*` lines (text messages) and
//! the roster poller (connects, disconnects, moves). Both end up delivered to
//! [`EventListener`]s through [`Event::dispatch`].

use std::fmt;

/// The client an event is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRef {
    pub name: String,
    pub id: u32,
    pub uid: String,
}

/// Target of a text message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageMode {
    /// Private message to the query client
    Private = 1,
    /// Message in the query client's channel
    Channel = 2,
    /// Server-wide message
    Server = 3,
}

impl MessageMode {
    /// Mode for a `targetmode` value
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MessageMode::Private),
            2 => Some(MessageMode::Channel),
            3 => Some(MessageMode::Server),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Event delivered to listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ClientConnected(ClientRef),
    ClientDisconnected(ClientRef),
    ClientMoved {
        client: ClientRef,
        source_channel: u32,
        dest_channel: u32,
    },
    Message {
        client: ClientRef,
        mode: MessageMode,
        text: String,
    },
}

impl Event {
    /// The client that triggered this event
    pub fn client(&self) -> &ClientRef {
        match self {
            Event::ClientConnected(client) | Event::ClientDisconnected(client) => client,
            Event::ClientMoved { client, .. } | Event::Message { client, .. } => client,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::ClientConnected(_) => "ClientConnected",
            Event::ClientDisconnected(_) => "ClientDisconnected",
            Event::ClientMoved { .. } => "ClientMoved",
            Event::Message { .. } => "Message",
        }
    }

    /// Invoke the callback matching this event on `listener`
    pub fn dispatch(&self, listener: &dyn EventListener) {
        match self {
            Event::ClientConnected(client) => listener.on_client_connected(client),
            Event::ClientDisconnected(client) => listener.on_client_disconnected(client),
            Event::ClientMoved {
                client,
                source_channel,
                dest_channel,
            } => listener.on_client_moved(client, *source_channel, *dest_channel),
            Event::Message { client, mode, text } => listener.on_message(client, *mode, text),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let client = self.client();
        write!(
            f,
            "Event: {}, Client: {}, ID: {}, UID: {}",
            self.kind(),
            client.name,
            client.id,
            client.uid
        )
    }
}

/// Receiver of client events
///
/// Callbacks run off the async runtime, one event at a time, and may block.
/// A slow callback delays every event queued behind it.
pub trait EventListener: Send + Sync {
    fn on_client_connected(&self, _client: &ClientRef) {}

    fn on_client_disconnected(&self, _client: &ClientRef) {}

    fn on_client_moved(&self, _client: &ClientRef, _source_channel: u32, _dest_channel: u32) {}

    fn on_message(&self, _client: &ClientRef, _mode: MessageMode, _text: &str) {}
}
