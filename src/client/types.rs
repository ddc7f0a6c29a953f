//! Value types shared between the correlator and client implementations.

use std::fmt;

/// Identifier of a chat (user, bot, group or channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// A peer as given by the caller, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Peer {
    Id(ChatId),
    /// A public username, with or without the leading `@`.
    Username(String),
}

impl Peer {
    /// Parse a peer from user input: numeric strings become ids, anything else a username.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i64>() {
            Ok(id) => Peer::Id(ChatId(id)),
            Err(_) => Peer::Username(value.trim().trim_start_matches('@').to_string()),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Peer::Id(id) => write!(f, "{}", id),
            Peer::Username(name) => write!(f, "@{}", name),
        }
    }
}

impl From<ChatId> for Peer {
    fn from(id: ChatId) -> Self {
        Peer::Id(id)
    }
}

impl From<i64> for Peer {
    fn from(id: i64) -> Self {
        Peer::Id(ChatId(id))
    }
}

impl From<&str> for Peer {
    fn from(value: &str) -> Self {
        Peer::parse(value)
    }
}

impl From<String> for Peer {
    fn from(value: String) -> Self {
        Peer::parse(&value)
    }
}

/// A button of an inline keyboard attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    /// Callback payload, if this is a callback button.
    pub callback_data: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
        }
    }
}

/// An inbound or outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    /// Sender user id; `None` for channel posts.
    pub sender_id: Option<i64>,
    pub text: Option<String>,
    /// Unix timestamp assigned by the server.
    pub date: i64,
    /// Rows of inline buttons, empty when the message carries no keyboard.
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl Message {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Find an inline button whose label contains `label`.
    pub fn find_button(&self, label: &str) -> Option<&InlineButton> {
        self.inline_keyboard
            .iter()
            .flatten()
            .find(|button| button.text.contains(label))
    }
}

/// A reference to a message: either the message itself or its bare id.
#[derive(Debug, Clone)]
pub enum MessageRef {
    Message(Box<Message>),
    Id(MessageId),
}

impl MessageRef {
    pub fn id(&self) -> MessageId {
        match self {
            MessageRef::Message(message) => message.id,
            MessageRef::Id(id) => *id,
        }
    }
}

impl From<Message> for MessageRef {
    fn from(message: Message) -> Self {
        MessageRef::Message(Box::new(message))
    }
}

impl From<&Message> for MessageRef {
    fn from(message: &Message) -> Self {
        MessageRef::Id(message.id)
    }
}

impl From<MessageId> for MessageRef {
    fn from(id: MessageId) -> Self {
        MessageRef::Id(id)
    }
}

impl From<i32> for MessageRef {
    fn from(id: i32) -> Self {
        MessageRef::Id(MessageId(id))
    }
}

/// A geographic point attached to inline queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<(f64, f64)> for GeoPoint {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Parameters of an inline query sent to a bot.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineQuery {
    pub query: String,
    pub offset: String,
    pub geo_point: Option<GeoPoint>,
}

/// A single result of an inline query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResult {
    pub id: String,
    pub kind: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Raw answer to an inline query as returned by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineBotResults {
    pub query_id: i64,
    pub results: Vec<InlineResult>,
    pub next_offset: Option<String>,
    pub gallery: bool,
}

/// The bot's answer to a pressed callback button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub message: Option<String>,
    pub alert: bool,
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_parse() {
        assert_eq!(Peer::parse("123456"), Peer::Id(ChatId(123456)));
        assert_eq!(Peer::parse("-100200"), Peer::Id(ChatId(-100200)));
        assert_eq!(Peer::parse("@my_bot"), Peer::Username("my_bot".to_string()));
        assert_eq!(Peer::parse("my_bot"), Peer::Username("my_bot".to_string()));
        assert_eq!(Peer::parse("@my_bot").to_string(), "@my_bot");
    }

    #[test]
    fn test_message_ref_resolves_id() {
        let message = sample_message();
        assert_eq!(MessageRef::from(&message).id(), MessageId(7));
        assert_eq!(MessageRef::from(message).id(), MessageId(7));
        assert_eq!(MessageRef::from(12).id(), MessageId(12));
    }

    #[test]
    fn test_find_button() {
        let mut message = sample_message();
        message.inline_keyboard = vec![
            vec![InlineButton::callback("✅ Yes", "yes"), InlineButton::callback("❌ No", "no")],
            vec![InlineButton::callback("More...", "more")],
        ];

        let button = message.find_button("No").expect("button should exist");
        assert_eq!(button.callback_data.as_deref(), Some("no"));
        assert!(message.find_button("Cancel").is_none());
    }

    #[test]
    fn test_geo_point_from_tuple() {
        let point = GeoPoint::from((52.52, 13.405));
        assert_eq!(point.latitude, 52.52);
        assert_eq!(point.longitude, 13.405);
    }

    fn sample_message() -> Message {
        Message {
            id: MessageId(7),
            chat_id: ChatId(1),
            sender_id: Some(1),
            text: Some("hi".to_string()),
            date: 0,
            inline_keyboard: Vec::new(),
        }
    }
}
