//! Announcer - logs client activity
//!
//! Announces connects, disconnects, moves and text messages in plain
//! sentences. Repeated connect/disconnect announcements for the same client
//! id are suppressed for a short window so a flapping client does not flood
//! the log.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use squery_core::{ClientRef, EventListener, MessageMode};
use tracing::info;

/// Default suppression window for presence announcements
const RATE_LIMIT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct Presence {
    /// client id -> last presence announcement
    last_announced: HashMap<u32, Instant>,
    /// client id -> when we saw it connect
    connected_at: HashMap<u32, Instant>,
}

pub struct Announcer {
    window: Duration,
    presence: Mutex<Presence>,
}

impl Announcer {
    pub fn new() -> Self {
        Self::with_window(RATE_LIMIT)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            presence: Mutex::new(Presence::default()),
        }
    }

    /// Check if we should announce for this client (rate limiting)
    fn should_announce(presence: &mut Presence, id: u32, window: Duration) -> bool {
        if let Some(last) = presence.last_announced.get(&id) {
            if last.elapsed() < window {
                return false;
            }
        }
        presence.last_announced.insert(id, Instant::now());
        true
    }

    fn connected_message(&self, client: &ClientRef) -> Option<String> {
        let Ok(mut presence) = self.presence.lock() else {
            return None;
        };
        presence.connected_at.insert(client.id, Instant::now());
        if !Self::should_announce(&mut presence, client.id, self.window) {
            return None;
        }
        Some(format!("{} connected.", display_name(client)))
    }

    fn disconnected_message(&self, client: &ClientRef) -> Option<String> {
        let Ok(mut presence) = self.presence.lock() else {
            return None;
        };
        let session = presence.connected_at.remove(&client.id).map(|at| at.elapsed());
        if !Self::should_announce(&mut presence, client.id, self.window) {
            return None;
        }

        let name = display_name(client);
        Some(match session {
            Some(duration) => format!("{} disconnected after {}.", name, format_duration(duration)),
            None => format!("{} disconnected.", name),
        })
    }

    fn moved_message(client: &ClientRef, source_channel: u32, dest_channel: u32) -> String {
        format!(
            "{} moved from channel {} to channel {}.",
            display_name(client),
            source_channel,
            dest_channel
        )
    }

    fn text_message(client: &ClientRef, mode: MessageMode, text: &str) -> String {
        let scope = match mode {
            MessageMode::Private => "private",
            MessageMode::Channel => "channel",
            MessageMode::Server => "server",
        };
        format!("[{}] {}: {}", scope, display_name(client), text)
    }
}

impl Default for Announcer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener for Announcer {
    fn on_client_connected(&self, client: &ClientRef) {
        if let Some(message) = self.connected_message(client) {
            info!(client_id = client.id, uid = %client.uid, "{}", message);
        }
    }

    fn on_client_disconnected(&self, client: &ClientRef) {
        if let Some(message) = self.disconnected_message(client) {
            info!(client_id = client.id, uid = %client.uid, "{}", message);
        }
    }

    fn on_client_moved(&self, client: &ClientRef, source_channel: u32, dest_channel: u32) {
        let message = Self::moved_message(client, source_channel, dest_channel);
        info!(client_id = client.id, "{}", message);
    }

    fn on_message(&self, client: &ClientRef, mode: MessageMode, text: &str) {
        let message = Self::text_message(client, mode, text);
        info!(client_id = client.id, "{}", message);
    }
}

/// Nickname, or the numeric id for clients that have none
fn display_name(client: &ClientRef) -> String {
    if client.name.is_empty() {
        format!("Client #{}", client.id)
    } else {
        client.name.clone()
    }
}

/// Format duration in human-readable form
/// - < 1 min -> "less than a minute"
/// - < 1 hr -> "12 minutes"
/// - < 1 day -> "3 hours"
/// - >= 1 day -> "1 day 11 hours"
fn format_duration(duration: Duration) -> String {
    fn plural(n: u64, unit: &str) -> String {
        if n == 1 {
            format!("1 {}", unit)
        } else {
            format!("{} {}s", n, unit)
        }
    }

    let secs = duration.as_secs();
    if secs < 60 {
        return "less than a minute".to_string();
    }

    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    if days >= 1 {
        return if hours > 0 {
            format!("{} {}", plural(days, "day"), plural(hours, "hour"))
        } else {
            plural(days, "day")
        };
    }
    if hours >= 1 {
        return plural(hours, "hour");
    }
    plural(secs / 60, "minute")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: u32, name: &str) -> ClientRef {
        ClientRef {
            name: name.to_string(),
            id,
            uid: format!("uid{}", id),
        }
    }

    #[test]
    fn test_presence_rate_limited() {
        let announcer = Announcer::new();
        let ann = client(1, "ann");

        assert_eq!(announcer.connected_message(&ann).as_deref(), Some("ann connected."));
        assert_eq!(announcer.disconnected_message(&ann), None);
        assert_eq!(announcer.connected_message(&ann), None);

        // Other clients are tracked separately
        let bob = client(2, "bob");
        assert_eq!(announcer.connected_message(&bob).as_deref(), Some("bob connected."));
    }

    #[test]
    fn test_disconnect_reports_session_length() {
        let announcer = Announcer::with_window(Duration::ZERO);
        let ann = client(1, "ann");

        assert_eq!(
            announcer.disconnected_message(&ann).as_deref(),
            Some("ann disconnected.")
        );
        announcer.connected_message(&ann);
        assert_eq!(
            announcer.disconnected_message(&ann).as_deref(),
            Some("ann disconnected after less than a minute.")
        );
    }

    #[test]
    fn test_moves_and_messages() {
        let ann = client(3, "ann");
        assert_eq!(
            Announcer::moved_message(&ann, 1, 4),
            "ann moved from channel 1 to channel 4."
        );
        assert_eq!(
            Announcer::text_message(&ann, MessageMode::Server, "hello"),
            "[server] ann: hello"
        );
        assert_eq!(
            Announcer::text_message(&client(9, ""), MessageMode::Private, "hi"),
            "[private] Client #9: hi"
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "less than a minute");
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_duration(Duration::from_secs(3599)), "59 minutes");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2 hours");
        assert_eq!(format_duration(Duration::from_secs(86400)), "1 day");
        assert_eq!(format_duration(Duration::from_secs(180000)), "2 days 2 hours");
    }
}
