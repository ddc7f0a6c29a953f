//! Composable predicates over inbound messages.
//!
//! Filters combine with `&`, `|` and `!`:
//!
//! ```
//! use tgintegration::client::ChatId;
//! use tgintegration::filters;
//!
//! let filter = filters::chat(ChatId(42)) & filters::text() & !filters::command("help");
//! ```

use crate::client::{ChatId, Message};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

type Predicate = dyn Fn(&Message) -> bool + Send + Sync;

/// A cheaply clonable message predicate.
#[derive(Clone)]
pub struct MessageFilter {
    predicate: Arc<Predicate>,
    name: Arc<str>,
}

impl MessageFilter {
    fn named(name: impl Into<Arc<str>>, predicate: impl Fn(&Message) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
            name: name.into(),
        }
    }

    pub fn matches(&self, message: &Message) -> bool {
        (self.predicate)(message)
    }
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageFilter").field(&self.name).finish()
    }
}

impl Default for MessageFilter {
    fn default() -> Self {
        all()
    }
}

/// Matches every message.
pub fn all() -> MessageFilter {
    MessageFilter::named("all", |_| true)
}

/// Matches messages in the given chat.
pub fn chat(chat_id: ChatId) -> MessageFilter {
    MessageFilter::named(format!("chat({})", chat_id), move |m| m.chat_id == chat_id)
}

/// Matches messages in any of the given chats.
pub fn chats(chat_ids: impl IntoIterator<Item = ChatId>) -> MessageFilter {
    let ids: Vec<ChatId> = chat_ids.into_iter().collect();
    MessageFilter::named(format!("chats({:?})", ids), move |m| ids.contains(&m.chat_id))
}

/// Matches messages sent by the given user.
pub fn from_user(user_id: i64) -> MessageFilter {
    MessageFilter::named(format!("from_user({})", user_id), move |m| {
        m.sender_id == Some(user_id)
    })
}

/// Matches messages carrying text.
pub fn text() -> MessageFilter {
    MessageFilter::named("text", |m| m.text.is_some())
}

/// Matches `/name` commands, including the `/name@botname` form.
pub fn command(name: &str) -> MessageFilter {
    let name = name.trim_start_matches('/').to_lowercase();
    MessageFilter::named(format!("command({})", name), move |m| {
        let Some(first) = m.text().and_then(|t| t.split_whitespace().next()) else {
            return false;
        };
        let Some(cmd) = first.strip_prefix('/') else {
            return false;
        };
        let cmd = cmd.split('@').next().unwrap_or_default();
        cmd.to_lowercase() == name
    })
}

/// Wrap an arbitrary predicate.
pub fn custom(predicate: impl Fn(&Message) -> bool + Send + Sync + 'static) -> MessageFilter {
    MessageFilter::named("custom", predicate)
}

impl BitAnd for MessageFilter {
    type Output = MessageFilter;

    fn bitand(self, rhs: Self) -> Self::Output {
        let name = format!("({} & {})", self.name, rhs.name);
        MessageFilter::named(name, move |m| self.matches(m) && rhs.matches(m))
    }
}

impl BitOr for MessageFilter {
    type Output = MessageFilter;

    fn bitor(self, rhs: Self) -> Self::Output {
        let name = format!("({} | {})", self.name, rhs.name);
        MessageFilter::named(name, move |m| self.matches(m) || rhs.matches(m))
    }
}

impl Not for MessageFilter {
    type Output = MessageFilter;

    fn not(self) -> Self::Output {
        let name = format!("!{}", self.name);
        MessageFilter::named(name, move |m| !self.matches(m))
    }
}
