//! Client abstraction the interaction layer is built on.
//!
//! A [`TelegramClient`] provides message dispatch (register/deregister a filtered
//! callback), the send primitives, and peer resolution. The transport behind it is
//! up to the implementation.

mod types;

pub mod mtproto;
pub mod telegram;

pub use types::{
    CallbackAnswer, ChatId, GeoPoint, InlineBotResults, InlineButton, InlineQuery, InlineResult,
    Message, MessageId, MessageRef, Peer,
};

use crate::dispatch::{HandlerId, MessageHandler};
use crate::error::ClientError;
use async_trait::async_trait;

/// Abstraction over a Telegram client connection.
#[async_trait]
pub trait TelegramClient: Send + Sync {
    /// Register a message handler in the given priority group.
    fn add_handler(&self, handler: MessageHandler, group: i32) -> HandlerId;

    /// Deregister a handler. Returns `false` if it was not registered.
    fn remove_handler(&self, id: HandlerId) -> bool;

    /// Resolve a peer to a chat id.
    async fn resolve_peer(&self, peer: &Peer) -> Result<ChatId, ClientError>;

    /// Send a text message.
    ///
    /// Fails with [`ClientError::FloodWait`] when the server asks to back off.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Message, ClientError>;

    /// Ask `bot` for inline query results.
    async fn get_inline_bot_results(
        &self,
        bot: ChatId,
        query: &InlineQuery,
    ) -> Result<InlineBotResults, ClientError>;

    /// Press a callback button on a message and return the bot's answer.
    async fn get_bot_callback_answer(
        &self,
        peer: ChatId,
        message_id: MessageId,
        data: &[u8],
    ) -> Result<CallbackAnswer, ClientError>;

    /// Get the platform name for logging purposes.
    fn platform_name(&self) -> &'static str;
}
