//! Scripted in-memory client for unit tests.

use crate::client::{
    CallbackAnswer, ChatId, InlineBotResults, InlineQuery, Message, MessageId, Peer, TelegramClient,
};
use crate::dispatch::{HandlerId, HandlerRegistry, MessageHandler};
use crate::error::ClientError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A bot reply delivered `delay` after the previous one of the same script.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub delay: Duration,
    /// Chat the reply appears in; defaults to the chat the request went to.
    pub chat_id: Option<ChatId>,
    pub text: String,
}

impl Reply {
    pub fn after(delay: Duration, text: &str) -> Self {
        Self {
            delay,
            chat_id: None,
            text: text.to_string(),
        }
    }

    pub fn now(text: &str) -> Self {
        Self::after(Duration::ZERO, text)
    }

    pub fn in_chat(mut self, chat_id: ChatId) -> Self {
        self.chat_id = Some(chat_id);
        self
    }
}

/// Fake client: each successful request consumes the next reply script.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    registry: Arc<HandlerRegistry>,
    scripts: Mutex<VecDeque<Vec<Reply>>>,
    flood_waits: Mutex<HashMap<String, Duration>>,
    usernames: Mutex<HashMap<String, ChatId>>,
    inline_results: Mutex<InlineBotResults>,
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub callbacks: Mutex<Vec<(ChatId, MessageId, Vec<u8>)>>,
    pub added: AtomicUsize,
    pub removed: AtomicUsize,
    next_id: AtomicI32,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, replies: Vec<Reply>) -> &Self {
        self.scripts.lock().unwrap().push_back(replies);
        self
    }

    /// The next attempt to send `text` fails with a flood wait.
    pub fn flood_on(&self, text: &str, wait: Duration) -> &Self {
        self.flood_waits.lock().unwrap().insert(text.to_string(), wait);
        self
    }

    pub fn username(&self, name: &str, chat_id: ChatId) -> &Self {
        self.usernames.lock().unwrap().insert(name.to_string(), chat_id);
        self
    }

    pub fn inline_results(&self, results: InlineBotResults) -> &Self {
        *self.inline_results.lock().unwrap() = results;
        self
    }

    /// Registry shared with the client, for delivering messages from other threads.
    pub fn registry(&self) -> Arc<HandlerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn active_handlers(&self) -> usize {
        self.registry.len()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }

    fn message(&self, chat_id: ChatId, text: &str) -> Message {
        Message {
            id: MessageId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1),
            chat_id,
            sender_id: Some(chat_id.0),
            text: Some(text.to_string()),
            date: 0,
            inline_keyboard: Vec::new(),
        }
    }

    /// Deliver the next script in the background, as a bot would.
    fn play_next_script(&self, chat_id: ChatId) {
        let Some(replies) = self.scripts.lock().unwrap().pop_front() else {
            return;
        };
        let messages: Vec<(Duration, Message)> = replies
            .into_iter()
            .map(|r| (r.delay, self.message(r.chat_id.unwrap_or(chat_id), &r.text)))
            .collect();
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            for (delay, message) in messages {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                registry.dispatch(&message);
            }
        });
    }
}

#[async_trait]
impl TelegramClient for ScriptedClient {
    fn add_handler(&self, handler: MessageHandler, group: i32) -> HandlerId {
        self.added.fetch_add(1, Ordering::SeqCst);
        self.registry.add(handler, group)
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        self.removed.fetch_add(1, Ordering::SeqCst);
        self.registry.remove(id)
    }

    async fn resolve_peer(&self, peer: &Peer) -> Result<ChatId, ClientError> {
        match peer {
            Peer::Id(id) => Ok(*id),
            Peer::Username(name) => self
                .usernames
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .ok_or_else(|| ClientError::PeerNotFound(peer.to_string())),
        }
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Message, ClientError> {
        if let Some(wait) = self.flood_waits.lock().unwrap().remove(text) {
            return Err(ClientError::FloodWait(wait));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        self.play_next_script(chat_id);
        Ok(self.message(chat_id, text))
    }

    async fn get_inline_bot_results(
        &self,
        _bot: ChatId,
        _query: &InlineQuery,
    ) -> Result<InlineBotResults, ClientError> {
        Ok(self.inline_results.lock().unwrap().clone())
    }

    async fn get_bot_callback_answer(
        &self,
        peer: ChatId,
        message_id: MessageId,
        data: &[u8],
    ) -> Result<CallbackAnswer, ClientError> {
        self.callbacks
            .lock()
            .unwrap()
            .push((peer, message_id, data.to_vec()));
        self.play_next_script(peer);
        Ok(CallbackAnswer {
            message: Some("ok".to_string()),
            ..CallbackAnswer::default()
        })
    }

    fn platform_name(&self) -> &'static str {
        "Scripted"
    }
}
