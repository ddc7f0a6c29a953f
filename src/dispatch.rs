//! In-process message dispatch with priority groups.
//!
//! Handlers are registered into numbered groups. For every inbound message the groups
//! are visited in ascending order and, within a group, only the first handler whose
//! filter matches is run.

use crate::client::Message;
use crate::filters::MessageFilter;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

type Callback = Arc<dyn Fn(&Message) + Send + Sync>;

/// A filtered callback invoked for inbound messages.
#[derive(Clone)]
pub struct MessageHandler {
    callback: Callback,
    filter: MessageFilter,
}

impl MessageHandler {
    pub fn new(callback: impl Fn(&Message) + Send + Sync + 'static, filter: MessageFilter) -> Self {
        Self {
            callback: Arc::new(callback),
            filter,
        }
    }
}

/// Handle returned by [`HandlerRegistry::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId {
    pub group: i32,
    seq: u64,
}

/// Registry of message handlers, shared by client implementations.
#[derive(Default)]
pub struct HandlerRegistry {
    next_seq: AtomicU64,
    groups: RwLock<BTreeMap<i32, Vec<(u64, MessageHandler)>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: MessageHandler, group: i32) -> HandlerId {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(group)
            .or_default()
            .push((seq, handler));
        HandlerId { group, seq }
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = groups.get_mut(&id.group) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(seq, _)| *seq != id.seq);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            groups.remove(&id.group);
        }
        removed
    }

    /// Number of registered handlers across all groups.
    pub fn len(&self) -> usize {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the matching handlers for `message`; returns how many ran.
    pub fn dispatch(&self, message: &Message) -> usize {
        // Callbacks run outside the lock so they may add or remove handlers.
        let selected: Vec<Callback> = {
            let groups = self.groups.read().unwrap_or_else(PoisonError::into_inner);
            groups
                .values()
                .filter_map(|handlers| {
                    handlers
                        .iter()
                        .find(|(_, h)| h.filter.matches(message))
                        .map(|(_, h)| Arc::clone(&h.callback))
                })
                .collect()
        };

        for callback in &selected {
            callback(message);
        }
        selected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatId, MessageId};
    use crate::filters;
    use std::sync::Mutex;

    fn message(chat: i64) -> Message {
        Message {
            id: MessageId(1),
            chat_id: ChatId(chat),
            sender_id: None,
            text: Some("hello".to_string()),
            date: 0,
            inline_keyboard: Vec::new(),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&Message) + Send + Sync {
        let log = Arc::clone(log);
        move |_| log.lock().unwrap().push(tag)
    }

    #[test]
    fn test_add_and_remove() {
        let registry = HandlerRegistry::new();
        let id = registry.add(MessageHandler::new(|_| {}, filters::all()), -1);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(id));
        assert!(registry.is_empty());
        assert!(!registry.remove(id));
    }

    #[test]
    fn test_groups_run_in_order_first_match_per_group() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.add(MessageHandler::new(recorder(&log, "g0-a"), filters::all()), 0);
        registry.add(MessageHandler::new(recorder(&log, "g0-b"), filters::all()), 0);
        registry.add(MessageHandler::new(recorder(&log, "g-1"), filters::all()), -1);

        assert_eq!(registry.dispatch(&message(1)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["g-1", "g0-a"]);
    }

    #[test]
    fn test_filter_skips_non_matching() {
        let registry = HandlerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.add(MessageHandler::new(recorder(&log, "chat1"), filters::chat(ChatId(1))), 0);
        registry.add(MessageHandler::new(recorder(&log, "fallback"), filters::all()), 0);

        registry.dispatch(&message(2));
        assert_eq!(*log.lock().unwrap(), vec!["fallback"]);
    }
}
