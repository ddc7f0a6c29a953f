//! The collected reply to an awaited action.

use crate::client::{InlineButton, Message};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

#[derive(Default)]
struct Collected {
    messages: Vec<Message>,
    last_arrival: Option<Instant>,
}

/// Append-only message sink shared between the listener callback and the poll loop.
#[derive(Clone, Default)]
pub(crate) struct ResponseCollector {
    inner: Arc<Mutex<Collected>>,
}

impl ResponseCollector {
    pub(crate) fn push(&self, message: Message) {
        let mut collected = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        collected.messages.push(message);
        collected.last_arrival = Some(Instant::now());
    }

    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn last_arrival(&self) -> Option<Instant> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_arrival
    }

    /// Freeze the messages gathered so far into a [`Response`].
    pub(crate) fn into_response<T>(self, started: Instant, action_result: T) -> Response<T> {
        let collected = {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        Response {
            messages: collected.messages,
            started,
            last_message_timestamp: collected.last_arrival,
            action_result,
        }
    }
}

/// Messages received in reply to an action, in arrival order.
#[derive(Debug, Clone)]
pub struct Response<T> {
    messages: Vec<Message>,
    started: Instant,
    last_message_timestamp: Option<Instant>,
    action_result: T,
}

impl<T> Response<T> {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    /// When the action was invoked.
    pub fn started(&self) -> Instant {
        self.started
    }

    /// Arrival time of the most recent message.
    pub fn last_message_timestamp(&self) -> Option<Instant> {
        self.last_message_timestamp
    }

    /// The value returned by the triggering action.
    pub fn action_result(&self) -> &T {
        &self.action_result
    }

    /// Texts of all messages joined by newlines; messages without text are skipped.
    pub fn full_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(Message::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Inline keyboards of the messages that carry one.
    pub fn inline_keyboards(&self) -> impl Iterator<Item = (&Message, &[Vec<InlineButton>])> {
        self.messages
            .iter()
            .filter(|m| !m.inline_keyboard.is_empty())
            .map(|m| (m, m.inline_keyboard.as_slice()))
    }

    /// Find the first inline button whose label contains `label`, with its message.
    pub fn find_button(&self, label: &str) -> Option<(&Message, &InlineButton)> {
        self.messages
            .iter()
            .find_map(|m| m.find_button(label).map(|b| (m, b)))
    }

    pub fn into_parts(self) -> (Vec<Message>, T) {
        (self.messages, self.action_result)
    }
}

impl<'a, T> IntoIterator for &'a Response<T> {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatId, MessageId};

    fn message(id: i32, text: Option<&str>) -> Message {
        Message {
            id: MessageId(id),
            chat_id: ChatId(1),
            sender_id: Some(1),
            text: text.map(str::to_string),
            date: 0,
            inline_keyboard: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_tracks_order_and_arrival() {
        let collector = ResponseCollector::default();
        let started = Instant::now();
        assert!(collector.is_empty());
        assert!(collector.last_arrival().is_none());

        collector.push(message(1, Some("first")));
        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        collector.push(message(2, Some("second")));

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.last_arrival(), Some(started + std::time::Duration::from_secs(1)));

        let response = collector.into_response(started, "sent");
        let ids: Vec<_> = response.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(*response.action_result(), "sent");
        assert_eq!(response.started(), started);
    }

    #[test]
    fn test_full_text_and_buttons() {
        let collector = ResponseCollector::default();
        collector.push(message(1, Some("Hello")));
        collector.push(message(2, None));
        let mut with_keyboard = message(3, Some("Pick one"));
        with_keyboard.inline_keyboard = vec![vec![InlineButton::callback("Settings", "settings")]];
        collector.push(with_keyboard);

        let response = collector.into_response(Instant::now(), ());
        assert_eq!(response.full_text(), "Hello\nPick one");
        assert_eq!(response.inline_keyboards().count(), 1);

        let (owner, button) = response.find_button("Sett").unwrap();
        assert_eq!(owner.id, MessageId(3));
        assert_eq!(button.callback_data.as_deref(), Some("settings"));
        assert_eq!((&response).into_iter().count(), 3);
    }
}
