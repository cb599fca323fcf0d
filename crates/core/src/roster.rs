//! Client roster snapshots and diffing
//!
//! The server only notifies about clients in the query client's own channel,
//! so connects, disconnects and moves elsewhere are derived by comparing
//! consecutive `clientlist -uid` snapshots.

use std::collections::BTreeMap;

use tracing::debug;

use crate::command::Command;
use crate::event::{ClientRef, Event};
use crate::result::ResultRow;

/// Query returning every connected client with its unique id
pub fn roster_command() -> Command {
    Command::new("clientlist").switch("uid")
}

/// Attributes tracked per client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: String,
    pub uid: String,
    pub channel_id: u32,
}

/// Point-in-time map of client id to attributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSnapshot {
    clients: BTreeMap<u32, ClientInfo>,
}

impl ClientSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `clientlist` rows.
    ///
    /// Rows without a numeric `clid` and `cid` are skipped.
    pub fn from_rows(rows: &[ResultRow]) -> Self {
        let mut snapshot = Self::new();
        for row in rows {
            let (Some(id), Some(channel_id)) = (row.get_as::<u32>("clid"), row.get_as::<u32>("cid"))
            else {
                debug!(row = %row, "Skipping roster row without clid/cid");
                continue;
            };
            snapshot.insert(
                id,
                ClientInfo {
                    name: row.get("client_nickname").unwrap_or_default().to_string(),
                    uid: row
                        .get("client_unique_identifier")
                        .unwrap_or_default()
                        .to_string(),
                    channel_id,
                },
            );
        }
        snapshot
    }

    pub fn insert(&mut self, id: u32, info: ClientInfo) {
        self.clients.insert(id, info);
    }

    pub fn get(&self, id: u32) -> Option<&ClientInfo> {
        self.clients.get(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ClientInfo)> {
        self.clients.iter().map(|(id, info)| (*id, info))
    }

    /// Events turning `self` into `current`.
    ///
    /// Disconnects come first, then connects, then moves, each in id order.
    /// Distinct ids are never correlated with each other.
    pub fn diff(&self, current: &ClientSnapshot) -> Vec<Event> {
        let mut events = Vec::new();

        for (id, info) in self.iter() {
            if current.get(id).is_none() {
                events.push(Event::ClientDisconnected(client_ref(id, info)));
            }
        }

        for (id, info) in current.iter() {
            if self.get(id).is_none() {
                events.push(Event::ClientConnected(client_ref(id, info)));
            }
        }

        for (id, info) in current.iter() {
            if let Some(previous) = self.get(id) {
                if previous.channel_id != info.channel_id {
                    events.push(Event::ClientMoved {
                        client: client_ref(id, info),
                        source_channel: previous.channel_id,
                        dest_channel: info.channel_id,
                    });
                }
            }
        }

        events
    }
}

fn client_ref(id: u32, info: &ClientInfo) -> ClientRef {
    ClientRef {
        name: info.name.clone(),
        id,
        uid: info.uid.clone(),
    }
}

/// Holds the last snapshot and turns each new one into events
#[derive(Debug, Default)]
pub struct RosterTracker {
    baseline: Option<ClientSnapshot>,
}

impl RosterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a baseline snapshot has been stored
    pub fn is_initialized(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&ClientSnapshot> {
        self.baseline.as_ref()
    }

    /// Replace the stored snapshot with `current` and return the changes.
    ///
    /// The first snapshot only becomes the baseline and produces no events.
    pub fn update(&mut self, current: ClientSnapshot) -> Vec<Event> {
        let events = match &self.baseline {
            Some(previous) => previous.diff(&current),
            None => Vec::new(),
        };
        self.baseline = Some(current);
        events
    }
}
