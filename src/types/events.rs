//! Events emitted by the messaging client.
//!
//! The bot loop consumes these one at a time, in arrival order.

use crate::types::JID;

/// Connection lifecycle update.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionUpdate {
    Connecting,
    /// Pairing payload to be shown as a QR code.
    QrCode(String),
    Open,
    Close(DisconnectReason),
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// The account unlinked this device
    LoggedOut,
    /// Another session took over this connection
    Replaced,
    /// Server requested disconnect
    ServerRequested,
    /// Network error
    NetworkError(String),
    /// Unknown reason
    Unknown,
}

/// How the bot reacts to a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectClass {
    Permanent,
    Superseded,
    Transient,
}

impl DisconnectReason {
    pub fn class(&self) -> DisconnectClass {
        match self {
            DisconnectReason::LoggedOut => DisconnectClass::Permanent,
            DisconnectReason::Replaced => DisconnectClass::Superseded,
            _ => DisconnectClass::Transient,
        }
    }
}

/// Information about a message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageInfo {
    pub id: String,
    /// Chat JID (same as sender for 1:1, group JID for groups)
    pub chat: JID,
    /// Group participant that sent the message, if any
    pub participant: Option<JID>,
    pub is_from_me: bool,
    pub timestamp: i64,
    pub push_name: Option<String>,
}

impl MessageInfo {
    /// The author: the group participant when present, otherwise the chat.
    pub fn sender(&self) -> &JID {
        self.participant.as_ref().unwrap_or(&self.chat)
    }
}

/// Content of a message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    /// Plain conversation text
    Conversation(String),
    /// Text with previews, quotes or formatting
    ExtendedText { text: Option<String> },
    /// Media, reactions and anything else the bot does not read
    Other,
}

/// A received message. `content` is `None` for stubs with no payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub info: MessageInfo,
    pub content: Option<MessageContent>,
}

impl Message {
    /// Readable text of the message, or an empty string.
    pub fn text(&self) -> &str {
        match &self.content {
            Some(MessageContent::Conversation(text)) => text,
            Some(MessageContent::ExtendedText { text: Some(text) }) => text,
            _ => "",
        }
    }
}

/// All events the client can raise.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connection(ConnectionUpdate),
    /// Credentials were mutated in memory and must be persisted.
    CredsUpdate,
    MessagesUpsert(Vec<Message>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(participant: Option<JID>) -> MessageInfo {
        MessageInfo {
            id: "A1".into(),
            chat: "120363@g.us".parse().unwrap(),
            participant,
            is_from_me: false,
            timestamp: 0,
            push_name: None,
        }
    }

    #[test]
    fn test_sender_prefers_participant() {
        let member = JID::user("5511");
        assert_eq!(info(Some(member.clone())).sender(), &member);
        assert_eq!(info(None).sender().to_string(), "120363@g.us");
    }

    #[test]
    fn test_text_extraction() {
        let mut msg = Message {
            info: info(None),
            content: Some(MessageContent::ExtendedText {
                text: Some("@Ana".into()),
            }),
        };
        assert_eq!(msg.text(), "@Ana");
        msg.content = Some(MessageContent::Other);
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_disconnect_classes() {
        assert_eq!(DisconnectReason::LoggedOut.class(), DisconnectClass::Permanent);
        assert_eq!(DisconnectReason::Replaced.class(), DisconnectClass::Superseded);
        assert_eq!(
            DisconnectReason::NetworkError("reset".into()).class(),
            DisconnectClass::Transient
        );
    }
}
