//! Telegram client implementation over MTProto, signed in as a user account.
//!
//! User accounts can talk to bots, send inline queries and press callback buttons,
//! none of which the Bot API allows. Incoming messages from the update stream are fed
//! into a [`HandlerRegistry`].

use super::{
    CallbackAnswer, ChatId, GeoPoint, InlineBotResults, InlineButton, InlineQuery, InlineResult,
    Message, MessageId, Peer, TelegramClient,
};
use crate::dispatch::{HandlerId, HandlerRegistry, MessageHandler};
use crate::error::ClientError;
use async_trait::async_trait;
use grammers_client::types::Chat;
use grammers_client::{Client, Config, InitParams, SignInError, Update};
use grammers_session::{PackedChat, Session};
use grammers_tl_types as tl;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

type PeerCache = Arc<Mutex<HashMap<i64, PackedChat>>>;

/// Telegram client backed by a user account session.
pub struct MtprotoClient {
    client: Client,
    session_path: PathBuf,
    registry: Arc<HandlerRegistry>,
    peers: PeerCache,
    updates: Mutex<Option<JoinHandle<()>>>,
}

impl MtprotoClient {
    /// Connect using the session stored at `session_path`, creating a fresh one if missing.
    pub async fn connect(
        api_id: i32,
        api_hash: &str,
        session_path: &Path,
    ) -> Result<Self, ClientError> {
        let session = if session_path.exists() {
            tracing::info!("Loading existing session from {:?}", session_path);
            Session::load_file(session_path)
                .map_err(|e| ClientError::Other(format!("Failed to load session: {}", e)))?
        } else {
            Session::new()
        };

        let config = Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams {
                device_model: "tgintegration".to_string(),
                app_version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
        };

        tracing::info!("Connecting to Telegram...");
        let client = Client::connect(config)
            .await
            .map_err(|e| ClientError::Other(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            client,
            session_path: session_path.to_path_buf(),
            registry: Arc::new(HandlerRegistry::new()),
            peers: Arc::default(),
            updates: Mutex::new(None),
        })
    }

    pub async fn is_authorized(&self) -> Result<bool, ClientError> {
        Ok(self.client.is_authorized().await?)
    }

    /// Interactive sign-in. `prompt` is asked for the login code and, if the account
    /// has two-step verification, the password.
    pub async fn sign_in(
        &self,
        phone: &str,
        prompt: impl Fn(&str) -> std::io::Result<String>,
    ) -> Result<(), ClientError> {
        let token = self
            .client
            .request_login_code(phone)
            .await
            .map_err(|e| ClientError::Other(format!("Failed to request login code: {}", e)))?;
        let code = prompt("Enter the code you received: ").map_err(io_error)?;

        match self.client.sign_in(&token, code.trim()).await {
            Ok(_) => {}
            Err(SignInError::PasswordRequired(password_token)) => {
                let hint = password_token.hint().unwrap_or("none").to_string();
                let password = prompt(&format!("Enter the password (hint: {}): ", hint))
                    .map_err(io_error)?;
                self.client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| ClientError::Other(format!("Sign-in failed: {}", e)))?;
            }
            Err(e) => return Err(ClientError::Other(format!("Sign-in failed: {}", e))),
        }

        self.save_session()
    }

    /// Persist the session so later runs skip the login.
    pub fn save_session(&self) -> Result<(), ClientError> {
        if let Some(parent) = self.session_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
        }
        // grammers-session 0.5 writes into an existing file
        if !self.session_path.exists() {
            std::fs::File::create(&self.session_path).map_err(io_error)?;
        }
        self.client
            .session()
            .save_to_file(&self.session_path)
            .map_err(io_error)?;
        tracing::info!("Session saved to {:?}", self.session_path);
        Ok(())
    }

    /// Start consuming the update stream. Calling it twice is a no-op.
    pub fn start_updates(&self) {
        let mut updates = self.updates.lock().unwrap_or_else(PoisonError::into_inner);
        if updates.is_some() {
            return;
        }
        tracing::info!("Starting Telegram update stream...");
        *updates = Some(tokio::spawn(run_updates(
            self.client.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.peers),
        )));
    }

    fn remember(&self, chat: &Chat) {
        remember(&self.peers, chat);
    }

    fn packed(&self, chat_id: ChatId) -> Result<PackedChat, ClientError> {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&chat_id.0)
            .cloned()
            .ok_or_else(|| {
                ClientError::PeerNotFound(format!("{} (resolve it by username first)", chat_id))
            })
    }
}

impl Drop for MtprotoClient {
    fn drop(&mut self) {
        let updates = self.updates.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = updates.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl TelegramClient for MtprotoClient {
    fn add_handler(&self, handler: MessageHandler, group: i32) -> HandlerId {
        self.registry.add(handler, group)
    }

    fn remove_handler(&self, id: HandlerId) -> bool {
        self.registry.remove(id)
    }

    async fn resolve_peer(&self, peer: &Peer) -> Result<ChatId, ClientError> {
        match peer {
            Peer::Id(id) => self.packed(*id).map(|_| *id),
            Peer::Username(name) => {
                let chat = self
                    .client
                    .resolve_username(name)
                    .await?
                    .ok_or_else(|| ClientError::PeerNotFound(peer.to_string()))?;
                self.remember(&chat);
                Ok(ChatId(chat.id()))
            }
        }
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<Message, ClientError> {
        let packed = self.packed(chat_id)?;
        let sent = self.client.send_message(packed, text).await?;
        Ok(convert_message(&sent))
    }

    async fn get_inline_bot_results(
        &self,
        bot: ChatId,
        query: &InlineQuery,
    ) -> Result<InlineBotResults, ClientError> {
        let packed = self.packed(bot)?;
        let request = tl::functions::messages::GetInlineBotResults {
            bot: tl::enums::InputUser::User(tl::types::InputUser {
                user_id: packed.id,
                access_hash: packed.access_hash.unwrap_or(0),
            }),
            peer: tl::enums::InputPeer::PeerSelf,
            geo_point: query.geo_point.map(input_geo_point),
            query: query.query.clone(),
            offset: query.offset.clone(),
        };

        let tl::enums::messages::BotResults::Results(results) = self.client.invoke(&request).await?;
        Ok(InlineBotResults {
            query_id: results.query_id,
            results: results.results.into_iter().map(convert_inline_result).collect(),
            next_offset: results.next_offset,
            gallery: results.gallery,
        })
    }

    async fn get_bot_callback_answer(
        &self,
        peer: ChatId,
        message_id: MessageId,
        data: &[u8],
    ) -> Result<CallbackAnswer, ClientError> {
        let packed = self.packed(peer)?;
        let request = tl::functions::messages::GetBotCallbackAnswer {
            game: false,
            peer: packed.to_input_peer(),
            msg_id: message_id.0,
            data: Some(data.to_vec()),
            password: None,
        };

        let tl::enums::messages::BotCallbackAnswer::Answer(answer) =
            self.client.invoke(&request).await?;
        Ok(CallbackAnswer {
            message: answer.message,
            alert: answer.alert,
            url: answer.url,
        })
    }

    fn platform_name(&self) -> &'static str {
        "Telegram (user)"
    }
}

/// Dispatch incoming messages until the task is aborted.
async fn run_updates(client: Client, registry: Arc<HandlerRegistry>, peers: PeerCache) {
    loop {
        match client.next_update().await {
            Ok(Some(Update::NewMessage(message))) if !message.outgoing() => {
                remember(&peers, &message.chat());
                let message = convert_message(&message);
                let handled = registry.dispatch(&message);
                tracing::trace!(chat_id = %message.chat_id, handled, "dispatched message");
            }
            Ok(_) => {}
            Err(e) => {
                let err = ClientError::from(e);
                tracing::warn!(error = %err, "Failed to fetch updates");
                let backoff = match err {
                    ClientError::FloodWait(wait) => wait,
                    _ => Duration::from_secs(1),
                };
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

fn remember(peers: &PeerCache, chat: &Chat) {
    peers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(chat.id(), chat.pack());
}

fn io_error(e: std::io::Error) -> ClientError {
    ClientError::Other(format!("IO error: {}", e))
}

fn input_geo_point(point: GeoPoint) -> tl::enums::InputGeoPoint {
    tl::enums::InputGeoPoint::Point(tl::types::InputGeoPoint {
        lat: point.latitude,
        long: point.longitude,
        accuracy_radius: None,
    })
}

fn convert_inline_result(result: tl::enums::BotInlineResult) -> InlineResult {
    match result {
        tl::enums::BotInlineResult::Result(r) => InlineResult {
            id: r.id,
            kind: r.r#type,
            title: r.title,
            description: r.description,
        },
        tl::enums::BotInlineResult::BotInlineMediaResult(r) => InlineResult {
            id: r.id,
            kind: r.r#type,
            title: r.title,
            description: r.description,
        },
    }
}

/// Flatten an inline markup into rows of buttons; other keyboards yield no rows.
fn convert_markup(markup: tl::enums::ReplyMarkup) -> Vec<Vec<InlineButton>> {
    let tl::enums::ReplyMarkup::ReplyInlineMarkup(inline) = markup else {
        return Vec::new();
    };

    inline
        .rows
        .into_iter()
        .map(|tl::enums::KeyboardButtonRow::Row(row)| {
            row.buttons.into_iter().filter_map(convert_button).collect()
        })
        .collect()
}

fn convert_button(button: tl::enums::KeyboardButton) -> Option<InlineButton> {
    match button {
        tl::enums::KeyboardButton::Callback(b) => Some(InlineButton {
            text: b.text,
            callback_data: Some(String::from_utf8_lossy(&b.data).into_owned()),
        }),
        tl::enums::KeyboardButton::Button(b) => Some(InlineButton {
            text: b.text,
            callback_data: None,
        }),
        tl::enums::KeyboardButton::Url(b) => Some(InlineButton {
            text: b.text,
            callback_data: None,
        }),
        _ => None,
    }
}

fn convert_message(message: &grammers_client::types::Message) -> Message {
    let text = message.text();
    Message {
        id: MessageId(message.id()),
        chat_id: ChatId(message.chat().id()),
        sender_id: message.sender().map(|sender| sender.id()),
        text: (!text.is_empty()).then(|| text.to_string()),
        date: message.date().timestamp(),
        inline_keyboard: message.reply_markup().map(convert_markup).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_inline_markup() {
        let markup = tl::enums::ReplyMarkup::ReplyInlineMarkup(tl::types::ReplyInlineMarkup {
            rows: vec![tl::enums::KeyboardButtonRow::Row(tl::types::KeyboardButtonRow {
                buttons: vec![
                    tl::enums::KeyboardButton::Callback(tl::types::KeyboardButtonCallback {
                        requires_password: false,
                        text: "Settings".to_string(),
                        data: b"settings".to_vec(),
                    }),
                    tl::enums::KeyboardButton::Url(tl::types::KeyboardButtonUrl {
                        text: "Docs".to_string(),
                        url: "https://example.org".to_string(),
                    }),
                ],
            })],
        });

        let rows = convert_markup(markup);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], InlineButton::callback("Settings", "settings"));
        assert_eq!(rows[0][1].text, "Docs");
        assert!(rows[0][1].callback_data.is_none());
    }

    #[test]
    fn test_reply_keyboard_has_no_inline_rows() {
        let markup = tl::enums::ReplyMarkup::ReplyKeyboardHide(tl::types::ReplyKeyboardHide {
            selective: false,
        });
        assert!(convert_markup(markup).is_empty());
    }

    #[test]
    fn test_input_geo_point() {
        let tl::enums::InputGeoPoint::Point(point) = input_geo_point((1.5, 2.5).into()) else {
            panic!("expected a point");
        };
        assert_eq!(point.lat, 1.5);
        assert_eq!(point.long, 2.5);
    }
}
