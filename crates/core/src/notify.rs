//! Notification decoding
//!
//! Server-pushed lines start with a `notify*` token followed by a wire map.
//! Only text messages map onto an [`Event`]; other notifications decode to
//! nothing.

use tracing::debug;

use crate::event::{ClientRef, Event, MessageMode};
use crate::wire::WireMap;

const NOTIFY_PREFIX: &str = "notify";
const TEXT_MESSAGE: &str = "notifytextmessage";

/// First whitespace-delimited token of a line
pub fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// True if the line is a server notification (case-insensitive)
pub fn is_notification(line: &str) -> bool {
    first_token(line)
        .get(..NOTIFY_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(NOTIFY_PREFIX))
}

/// Turn a notification line into an event, if it describes one
pub fn decode_notification(line: &str) -> Option<Event> {
    let line = line.trim();
    let (kind, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    if !kind.eq_ignore_ascii_case(TEXT_MESSAGE) {
        debug!(kind = %kind, "Ignoring notification");
        return None;
    }

    let map = WireMap::parse(rest);
    let Some(id) = map.get_as::<u32>("invokerid") else {
        debug!(line = %line, "Text message without invoker id");
        return None;
    };
    let Some(mode) = map.get_int("targetmode").and_then(MessageMode::from_code) else {
        debug!(line = %line, "Text message with unknown target mode");
        return None;
    };

    Some(Event::Message {
        client: ClientRef {
            name: map.get("invokername").unwrap_or_default().to_string(),
            id,
            uid: map.get("invokeruid").unwrap_or_default().to_string(),
        },
        mode,
        text: map.get("msg").unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_notification() {
        assert!(is_notification("notifytextmessage targetmode=3 msg=hi"));
        assert!(is_notification("NotifyClientMoved ctid=2"));
        assert!(is_notification("notify"));
        assert!(!is_notification("error id=0 msg=ok"));
        assert!(!is_notification("clid=1 cid=1"));
        assert!(!is_notification(""));
        assert!(!is_notification("not"));
    }

    #[test]
    fn test_decode_text_message() {
        let line = "notifytextmessage targetmode=3 msg=Hello\\sthere invokerid=5 \
                    invokername=alice invokeruid=abc\\/def=";
        let event = decode_notification(line).unwrap();
        assert_eq!(
            event,
            Event::Message {
                client: ClientRef {
                    name: "alice".into(),
                    id: 5,
                    uid: "abc/def=".into(),
                },
                mode: MessageMode::Server,
                text: "Hello there".into(),
            }
        );
    }

    #[test]
    fn test_decode_private_message_case_insensitive() {
        let event =
            decode_notification("NOTIFYTEXTMESSAGE targetmode=1 msg=psst invokerid=2").unwrap();
        match event {
            Event::Message { mode, client, .. } => {
                assert_eq!(mode, MessageMode::Private);
                assert_eq!(client.name, "");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_other_notifications_ignored() {
        assert!(decode_notification("notifycliententerview clid=5 ctid=1").is_none());
        assert!(decode_notification("notifyclientleftview clid=5").is_none());
    }

    #[test]
    fn test_malformed_text_message_ignored() {
        assert!(decode_notification("notifytextmessage targetmode=3 msg=hi").is_none());
        assert!(decode_notification("notifytextmessage targetmode=9 invokerid=1").is_none());
        assert!(decode_notification("notifytextmessage invokerid=x targetmode=1").is_none());
        assert!(decode_notification("notifytextmessage").is_none());
    }
}
