//! Inbound frame classification.
//!
//! Turns a raw [`Frame`] into a typed [`RoutedEvent`]. Classification is by
//! frame type first; a frame of any other type whose payload carries a
//! `messages` array is treated as a history batch. Everything else is a
//! [`ProtocolError`].

use partyline_types::error::ProtocolError;
use partyline_types::frame::{Frame, frame_types};
use partyline_types::message::Message;
use partyline_types::session::{ReconnectionOutcome, RosterEntry, TypingPresence};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    Chat(Message),
    Typing(TypingPresence),
    Roster(Vec<RosterEntry>),
    Reconnection(ReconnectionOutcome),
    History(Vec<Message>),
}

impl RoutedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RoutedEvent::Chat(_) => "chat",
            RoutedEvent::Typing(_) => "typing",
            RoutedEvent::Roster(_) => "roster",
            RoutedEvent::Reconnection(_) => "reconnection",
            RoutedEvent::History(_) => "history",
        }
    }
}

pub struct EventRouter;

impl EventRouter {
    /// Classify one inbound frame.
    pub fn classify(frame: Frame) -> Result<RoutedEvent, ProtocolError> {
        let Frame { frame_type, data, .. } = frame;

        match frame_type.as_str() {
            frame_types::SEND_MESSAGE | frame_types::CHAT_MESSAGE_ALIAS => {
                decode(&frame_type, data).map(RoutedEvent::Chat)
            }
            frame_types::SET_TYPING_PRESENCE | frame_types::TYPING_PRESENCE_ALIAS => {
                decode(&frame_type, data).map(RoutedEvent::Typing)
            }
            frame_types::USER_LIST | frame_types::ROSTER_UPDATE_ALIAS => {
                decode(&frame_type, roster_payload(data)).map(RoutedEvent::Roster)
            }
            frame_types::RECONNECTION => decode(&frame_type, data).map(RoutedEvent::Reconnection),
            _ => match data {
                Value::Object(mut map) if map.get("messages").is_some_and(Value::is_array) => {
                    let messages = map.remove("messages").unwrap_or_default();
                    decode(&frame_type, messages).map(RoutedEvent::History)
                }
                _ => Err(ProtocolError::Unrecognized(frame_type)),
            },
        }
    }
}

/// Roster broadcasts arrive either as a bare array or wrapped in an object.
fn roster_payload(data: Value) -> Value {
    match data {
        Value::Object(mut map) => map
            .remove("users")
            .or_else(|| map.remove("userList"))
            .unwrap_or(Value::Object(map)),
        other => other,
    }
}

fn decode<T: DeserializeOwned>(frame_type: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|err| ProtocolError::Malformed {
        frame_type: frame_type.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(frame_type: &str, data: Value) -> Frame {
        Frame::new(frame_type, data)
    }

    #[test]
    fn classifies_chat_message_under_both_names() {
        let data = json!({
            "permId": "p-1",
            "userNickname": "Alice",
            "body": "hi",
            "timestamp": 100,
            "isSystemMessage": false
        });

        for name in ["sendMessage", "chat-message"] {
            let event = EventRouter::classify(frame(name, data.clone())).unwrap();
            let RoutedEvent::Chat(message) = event else {
                panic!("expected chat event for {name}");
            };
            assert_eq!(message.body, "hi");
            assert_eq!(message.timestamp, 100);
            assert!(!message.actor_prefixed);
        }
    }

    #[test]
    fn classifies_typing_presence() {
        let event = EventRouter::classify(frame(
            "setTypingPresence",
            json!({"anyoneTyping": true, "usersTyping": ["p-2"]}),
        ))
        .unwrap();
        assert_eq!(
            event,
            RoutedEvent::Typing(TypingPresence {
                anyone_typing: true,
                users_typing: vec!["p-2".to_string()],
            })
        );
        assert_eq!(
            EventRouter::classify(frame("typing-presence", json!({}))).unwrap().kind(),
            "typing"
        );
    }

    #[test]
    fn classifies_roster_array_and_wrapped() {
        let users = json!([
            {"socketConnectionId": "c-1", "permId": "p-1", "isHost": true,
             "userSettings": {"userNickname": "Alice"}},
            {"socketConnectionId": "c-2", "permId": "p-2", "isHost": "false",
             "userSettings": {"userNickname": "Bob"}}
        ]);

        let RoutedEvent::Roster(bare) = EventRouter::classify(frame("userList", users.clone())).unwrap() else {
            panic!("expected roster");
        };
        assert_eq!(bare.len(), 2);
        assert!(bare[0].is_host);

        let RoutedEvent::Roster(wrapped) =
            EventRouter::classify(frame("roster-update", json!({"users": users}))).unwrap()
        else {
            panic!("expected roster");
        };
        assert_eq!(wrapped, bare);
    }

    #[test]
    fn classifies_reconnection_outcome() {
        let event = EventRouter::classify(frame("reconnection", json!({"success": false}))).unwrap();
        assert_eq!(
            event,
            RoutedEvent::Reconnection(ReconnectionOutcome {
                success: false,
                room_id: None,
            })
        );
    }

    #[test]
    fn falls_back_to_history_batch() {
        let event = EventRouter::classify(frame(
            "messageList",
            json!({"messages": [
                {"body": "yo", "timestamp": 50},
                {"body": "joined", "timestamp": 60, "isSystemMessage": true, "userNickname": "Bob"}
            ]}),
        ))
        .unwrap();

        let RoutedEvent::History(messages) = event else {
            panic!("expected history");
        };
        assert_eq!(messages.len(), 2);
        assert!(messages[1].is_system_message);
    }

    #[test]
    fn unknown_frame_is_unrecognized() {
        let err = EventRouter::classify(frame("mystery", json!({"x": 1}))).unwrap_err();
        assert_eq!(err, ProtocolError::Unrecognized("mystery".to_string()));

        let err = EventRouter::classify(frame("mystery", json!({"messages": "nope"}))).unwrap_err();
        assert!(matches!(err, ProtocolError::Unrecognized(_)));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let err = EventRouter::classify(frame("sendMessage", json!({"body": 3}))).unwrap_err();
        let ProtocolError::Malformed { frame_type, .. } = err else {
            panic!("expected malformed");
        };
        assert_eq!(frame_type, "sendMessage");
    }
}
