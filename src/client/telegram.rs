//! Telegram client implementation over the Bot API.
//!
//! Implements [`TelegramClient`] with `teloxide`, polling `getUpdates` and feeding
//! inbound messages into a [`HandlerRegistry`].

use super::{
    CallbackAnswer, ChatId, InlineBotResults, InlineButton, InlineQuery, Message, MessageId, Peer,
    TelegramClient,
};
use crate::dispatch::{HandlerId, HandlerRegistry, MessageHandler};
use crate::error::ClientError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use teloxide::payloads::GetUpdatesSetters;
use teloxide::requests::Requester;
use teloxide::types::{AllowedUpdate, InlineKeyboardButtonKind, Recipient, UpdateKind};
use teloxide::Bot;
use tokio::task::JoinHandle;
use tokio::time::interval;

/// Telegram client backed by a bot account.
pub struct TeloxideClient {
    bot: Bot,
    registry: Arc<HandlerRegistry>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl TeloxideClient {
    /// Create a new client. Call [`start_polling`](Self::start_polling) to receive messages.
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
            registry: Arc::new(HandlerRegistry::new()),
            poller: Mutex::new(None),
        }
    }

    /// Start the background `getUpdates` loop. Calling it twice is a no-op.
    pub fn start_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.is_some() {
            return;
        }
        tracing::info!("Starting Telegram update polling...");
        *poller = Some(tokio::spawn(poll_updates(
            self.bot.clone(),
            Arc::clone(&self.registry),
        )));
    }
}

impl Drop for TeloxideClient {
    fn drop(&mut self) {
        let poller = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = poller.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl TelegramClient for TeloxideClient {
    fn add_handler(&self, handler: MessageHandler, group: i32) -> HandlerId {
        self.registry.add(handler, group)
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        self.registry.remove(id)
    }

    async fn resolve_peer(&self, peer: &Peer) -> Result<ChatId, ClientError> {
        match peer {
            Peer::Id(id) => Ok(*id),
            Peer::Username(name) => {
                let recipient = Recipient::ChannelUsername(format!("@{}", name));
                let chat = self.bot.get_chat(recipient).await.map_err(|e| match e {
                    teloxide::RequestError::Api(_) => ClientError::PeerNotFound(peer.to_string()),
                    other => ClientError::from(other),
                })?;
                Ok(ChatId(chat.id.0))
            }
        }
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Message, ClientError> {
        let sent = self
            .bot
            .send_message(teloxide::types::ChatId(chat_id.0), text)
            .await?;
        Ok(convert_message(&sent))
    }

    async fn get_inline_bot_results(
        &self,
        _bot: ChatId,
        _query: &InlineQuery,
    ) -> Result<InlineBotResults, ClientError> {
        Err(ClientError::Unsupported(
            "inline queries can only be sent from user accounts",
        ))
    }

    async fn get_bot_callback_answer(
        &self,
        _peer: ChatId,
        _message_id: MessageId,
        _data: &[u8],
    ) -> Result<CallbackAnswer, ClientError> {
        Err(ClientError::Unsupported(
            "callback buttons can only be pressed from user accounts",
        ))
    }

    fn platform_name(&self) -> &'static str {
        "Telegram"
    }
}

/// Poll for message updates and dispatch them until the task is aborted.
async fn poll_updates(bot: Bot, registry: Arc<HandlerRegistry>) {
    let mut poll_interval = interval(Duration::from_millis(500));
    let mut offset: Option<i32> = None;

    loop {
        poll_interval.tick().await;

        let mut get_updates = bot.get_updates();
        if let Some(off) = offset {
            get_updates = get_updates.offset(off);
        }
        get_updates = get_updates
            .timeout(5)
            .allowed_updates(vec![AllowedUpdate::Message]);

        let updates = match get_updates.await {
            Ok(updates) => updates,
            Err(teloxide::RequestError::RetryAfter(seconds)) => {
                tracing::warn!(seconds = seconds.seconds(), "getUpdates flood wait");
                tokio::time::sleep(seconds.duration()).await;
                continue;
            }
            Err(e) => {
                tracing::debug!(error = %e, "getUpdates failed, retrying");
                continue;
            }
        };

        for update in updates {
            offset = Some((update.id.0 + 1) as i32);

            if let UpdateKind::Message(msg) = update.kind {
                let message = convert_message(&msg);
                let handled = registry.dispatch(&message);
                tracing::trace!(chat_id = %message.chat_id, handled, "dispatched message");
            }
        }
    }
}

/// Convert a teloxide message into the crate's message type.
fn convert_message(msg: &teloxide::types::Message) -> Message {
    let inline_keyboard = msg
        .reply_markup()
        .map(|markup| {
            markup
                .inline_keyboard
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| InlineButton {
                            text: button.text.clone(),
                            callback_data: match &button.kind {
                                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                                _ => None,
                            },
                        })
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default();

    Message {
        id: MessageId(msg.id.0),
        chat_id: ChatId(msg.chat.id.0),
        sender_id: msg.from.as_ref().map(|user| user.id.0 as i64),
        text: msg.text().map(str::to_string),
        date: msg.date.timestamp(),
        inline_keyboard,
    }
}
