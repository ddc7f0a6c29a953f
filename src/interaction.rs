//! Request/response correlation against a Telegram bot.
//!
//! [`InteractionClient`] wraps a [`TelegramClient`] and adds the `*_await` family of
//! methods: trigger an action, collect the bot's reply messages, and decide when the
//! reply is complete.

use crate::action::{AwaitableAction, DEFAULT_CONSECUTIVE_WAIT, DEFAULT_MAX_WAIT};
use crate::client::{
    CallbackAnswer, ChatId, GeoPoint, InlineQuery, Message, MessageId, MessageRef, Peer,
    TelegramClient,
};
use crate::containers::InlineResultContainer;
use crate::dispatch::{HandlerId, MessageHandler};
use crate::error::{ClientError, InteractionError};
use crate::filters::{self, MessageFilter};
use crate::response::{Response, ResponseCollector};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Dispatch group of the temporary response listener; runs before default handlers.
const LISTENER_GROUP: i32 = -1;

/// Log once when nothing has arrived after this long.
const NO_RESPONSE_NOTICE: Duration = Duration::from_secs(5);

/// Flood waits longer than this are logged at warn level.
const FLOOD_WARN_THRESHOLD: Duration = Duration::from_secs(5);

/// Timing knobs of the correlator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Default time to wait for a first reply.
    pub max_wait: Duration,
    /// Default quiet period closing a multi-message reply.
    pub min_wait_consecutive: Duration,
    pub poll_interval: Duration,
    /// Pause between consecutive ping messages in [`InteractionClient::ping_bot`].
    pub ping_interval: Duration,
    /// Back-off after a transient server error.
    pub server_error_cooldown: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            min_wait_consecutive: DEFAULT_CONSECUTIVE_WAIT,
            poll_interval: Duration::from_millis(300),
            ping_interval: Duration::from_secs(1),
            server_error_cooldown: Duration::from_secs(60),
        }
    }
}

/// Options accepted by every `*_await` method.
#[derive(Debug, Clone)]
pub struct AwaitOptions {
    /// Which inbound messages count as the reply. Defaults to the target chat.
    pub filters: Option<MessageFilter>,
    pub num_expected: Option<usize>,
    pub max_wait: Duration,
    pub min_wait_consecutive: Option<Duration>,
    /// Fail on a count mismatch instead of returning `None`.
    pub raise: bool,
}

impl Default for AwaitOptions {
    fn default() -> Self {
        Self {
            filters: None,
            num_expected: None,
            max_wait: DEFAULT_MAX_WAIT,
            min_wait_consecutive: Some(DEFAULT_CONSECUTIVE_WAIT),
            raise: true,
        }
    }
}

impl AwaitOptions {
    pub fn filters(mut self, filters: MessageFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn num_expected(mut self, num_expected: Option<usize>) -> Self {
        self.num_expected = num_expected;
        self
    }

    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn min_wait_consecutive(mut self, wait: Option<Duration>) -> Self {
        self.min_wait_consecutive = wait;
        self
    }

    pub fn raise(mut self, raise: bool) -> Self {
        self.raise = raise;
        self
    }

    fn or_filter(mut self, default: MessageFilter) -> Self {
        self.filters.get_or_insert(default);
        self
    }
}

/// Removes the listener when dropped, whichever way the correlation ends.
struct HandlerGuard<'a, C: TelegramClient + ?Sized> {
    client: &'a C,
    id: Option<HandlerId>,
}

impl<'a, C: TelegramClient + ?Sized> HandlerGuard<'a, C> {
    fn register(client: &'a C, handler: MessageHandler, group: i32) -> Self {
        let id = client.add_handler(handler, group);
        Self {
            client,
            id: Some(id),
        }
    }
}

impl<C: TelegramClient + ?Sized> Drop for HandlerGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if !self.client.remove_handler(id) {
                debug!("Response listener was already removed");
            }
        }
    }
}

/// A Telegram client extended with response-awaiting helpers.
pub struct InteractionClient<C> {
    client: Arc<C>,
    settings: Settings,
}

impl<C: TelegramClient + 'static> InteractionClient<C> {
    pub fn new(client: C) -> Self {
        Self::with_settings(Arc::new(client), Settings::default())
    }

    pub fn with_settings(client: Arc<C>, settings: Settings) -> Self {
        Self { client, settings }
    }

    /// The wrapped client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Invoke `action` and collect the messages that answer it.
    ///
    /// Returns `Ok(Some(response))` once the reply is complete or `max_wait` passes
    /// (possibly with no messages). On a message count mismatch this fails with
    /// [`InteractionError::InvalidResponse`] if `raise_on_mismatch` is set, and
    /// returns `Ok(None)` otherwise.
    pub async fn act_await_response<T: Send + 'static>(
        &self,
        action: AwaitableAction<T>,
        raise_on_mismatch: bool,
    ) -> Result<Option<Response<T>>, InteractionError> {
        let collector = ResponseCollector::default();
        let sink = collector.clone();
        let _listener = HandlerGuard::register(
            self.client.as_ref(),
            MessageHandler::new(move |m| sink.push(m.clone()), action.filters().clone()),
            LISTENER_GROUP,
        );

        let max_wait = action.max_wait();
        let num_expected = action.num_expected();
        let consecutive_wait = action.consecutive_wait();
        let func = action.into_func();

        let started = Instant::now();
        let action_result = match func().await {
            Ok(result) => result,
            Err(e) if e.is_transient_server_error() => {
                warn!(
                    error = %e,
                    cooldown_secs = self.settings.server_error_cooldown.as_secs(),
                    "Internal Telegram error, cooling down"
                );
                sleep(self.settings.server_error_cooldown).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let deadline = started + max_wait;
        let mut notified = false;

        while collector.is_empty() {
            let now = Instant::now();
            if !notified && now.duration_since(started) > NO_RESPONSE_NOTICE {
                debug!("No response received yet after {} seconds", NO_RESPONSE_NOTICE.as_secs());
                notified = true;
            }
            if now > deadline {
                debug!(
                    "Aborting as no response was received after {} seconds",
                    max_wait.as_secs_f64()
                );
                return Ok(Some(collector.into_response(started, action_result)));
            }
            sleep(self.settings.poll_interval).await;
        }

        if consecutive_wait.is_none() && num_expected.is_none() {
            return Ok(Some(collector.into_response(started, action_result)));
        }

        // A first reply arrived; wait for the rest of it.
        loop {
            let now = Instant::now();
            let received = collector.len();

            match num_expected {
                Some(expected) if received < expected => {
                    if now > deadline {
                        return mismatch(
                            format!(
                                "Expected {} messages but only received {} after waiting {} seconds.",
                                expected,
                                received,
                                max_wait.as_secs_f64()
                            ),
                            raise_on_mismatch,
                        );
                    }
                }
                Some(expected) if received > expected => {
                    return mismatch(
                        format!("Expected {} messages but received {}.", expected, received),
                        raise_on_mismatch,
                    );
                }
                Some(_) => return Ok(Some(collector.into_response(started, action_result))),
                None => {
                    let quiet = consecutive_wait.unwrap_or_default();
                    let last = collector.last_arrival().unwrap_or(started);
                    if now > last + quiet || now > deadline {
                        return Ok(Some(collector.into_response(started, action_result)));
                    }
                }
            }

            sleep(self.settings.poll_interval).await;
        }
    }

    /// Build an action from any send closure and await its response.
    ///
    /// Without explicit `filters`, every inbound message counts toward the reply.
    pub async fn await_response_to<T, F, Fut>(
        &self,
        send: F,
        options: AwaitOptions,
    ) -> Result<Option<Response<T>>, InteractionError>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, InteractionError>> + Send + 'static,
    {
        let action = AwaitableAction::new(send)
            .with_filters(options.filters.unwrap_or_else(filters::all))
            .with_num_expected(options.num_expected)
            .with_max_wait(options.max_wait)
            .with_consecutive_wait(options.min_wait_consecutive);
        self.act_await_response(action, options.raise).await
    }

    /// Send ping messages to a bot to find out whether it is online.
    ///
    /// Sends `/start` unless `override_messages` is given, pausing between messages.
    pub async fn ping_bot(
        &self,
        peer: impl Into<Peer>,
        override_messages: Option<Vec<String>>,
        max_wait: Option<Duration>,
        min_wait_consecutive: Option<Duration>,
    ) -> Result<Option<Response<()>>, InteractionError> {
        let chat_id = self.client.resolve_peer(&peer.into()).await?;
        let messages = override_messages
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| vec!["/start".to_string()]);

        let client = Arc::clone(&self.client);
        let ping_interval = self.settings.ping_interval;
        let action = AwaitableAction::new(move || send_pings(client, chat_id, messages, ping_interval))
            .with_filters(filters::chat(chat_id))
            .with_max_wait(max_wait.unwrap_or(self.settings.max_wait))
            .with_consecutive_wait(Some(
                min_wait_consecutive.unwrap_or(self.settings.min_wait_consecutive),
            ));

        self.act_await_response(action, true).await
    }

    pub async fn send_message(
        &self,
        peer: impl Into<Peer>,
        text: &str,
    ) -> Result<Message, InteractionError> {
        let chat_id = self.client.resolve_peer(&peer.into()).await?;
        Ok(self.client.send_message(chat_id, text).await?)
    }

    /// Send a text message and await the reply in the same chat.
    pub async fn send_message_await(
        &self,
        peer: impl Into<Peer>,
        text: impl Into<String>,
        options: AwaitOptions,
    ) -> Result<Option<Response<Message>>, InteractionError> {
        let chat_id = self.client.resolve_peer(&peer.into()).await?;
        let text = text.into();
        let client = Arc::clone(&self.client);
        let options = options.or_filter(filters::chat(chat_id));

        self.await_response_to(
            move || async move { Ok(client.send_message(chat_id, &text).await?) },
            options,
        )
        .await
    }

    /// Send a slash-command with its parameters.
    pub async fn send_command(
        &self,
        peer: impl Into<Peer>,
        command: &str,
        params: &[&str],
    ) -> Result<Message, InteractionError> {
        let text = format_command(command, params)?;
        self.send_message(peer, &text).await
    }

    /// Send a slash-command and await the reply in the same chat.
    pub async fn send_command_await(
        &self,
        peer: impl Into<Peer>,
        command: &str,
        params: &[&str],
        options: AwaitOptions,
    ) -> Result<Option<Response<Message>>, InteractionError> {
        let text = format_command(command, params)?;
        self.send_message_await(peer, text, options).await
    }

    /// Query a bot in inline mode.
    pub async fn get_inline_bot_results(
        &self,
        bot: impl Into<Peer>,
        query: &str,
        offset: &str,
        location: Option<GeoPoint>,
    ) -> Result<InlineResultContainer, InteractionError> {
        let bot = self.client.resolve_peer(&bot.into()).await?;
        let query = InlineQuery {
            query: query.to_string(),
            offset: offset.to_string(),
            geo_point: location,
        };
        let raw = self.client.get_inline_bot_results(bot, &query).await?;
        Ok(InlineResultContainer::new(bot, query, raw))
    }

    /// Press a callback button attached to `on_message`.
    pub async fn press_inline_button(
        &self,
        peer: impl Into<Peer>,
        on_message: impl Into<MessageRef>,
        callback_data: impl AsRef<[u8]>,
    ) -> Result<CallbackAnswer, InteractionError> {
        let message_id = resolve_message_id(&on_message.into())?;
        let chat_id = self.client.resolve_peer(&peer.into()).await?;
        Ok(self
            .client
            .get_bot_callback_answer(chat_id, message_id, callback_data.as_ref())
            .await?)
    }

    /// Press a callback button and await the messages the bot sends in reaction.
    pub async fn press_inline_button_await(
        &self,
        peer: impl Into<Peer>,
        on_message: impl Into<MessageRef>,
        callback_data: impl AsRef<[u8]>,
        options: AwaitOptions,
    ) -> Result<Option<Response<CallbackAnswer>>, InteractionError> {
        let message_id = resolve_message_id(&on_message.into())?;
        let chat_id = self.client.resolve_peer(&peer.into()).await?;
        let data = callback_data.as_ref().to_vec();
        let client = Arc::clone(&self.client);
        let options = options.or_filter(filters::chat(chat_id));

        self.await_response_to(
            move || async move {
                Ok(client
                    .get_bot_callback_answer(chat_id, message_id, &data)
                    .await?)
            },
            options,
        )
        .await
    }
}

fn mismatch<T>(msg: String, raise: bool) -> Result<Option<Response<T>>, InteractionError> {
    if raise {
        Err(InteractionError::InvalidResponse(msg))
    } else {
        debug!("{}", msg);
        Ok(None)
    }
}

/// Send each ping in turn; flood waits are sat out and that message skipped.
async fn send_pings<C: TelegramClient>(
    client: Arc<C>,
    chat_id: ChatId,
    messages: Vec<String>,
    ping_interval: Duration,
) -> Result<(), InteractionError> {
    for (n, text) in messages.iter().enumerate() {
        if n >= 1 {
            sleep(ping_interval).await;
        }
        match client.send_message(chat_id, text).await {
            Ok(_) => {}
            Err(ClientError::FloodWait(wait)) => {
                if wait > FLOOD_WARN_THRESHOLD {
                    warn!("send_message flood: waiting {} seconds", wait.as_secs());
                }
                sleep(wait).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Build the text of a slash-command.
pub fn format_command(command: &str, params: &[&str]) -> Result<String, InteractionError> {
    let name = command.trim().trim_start_matches('/');
    if name.is_empty() {
        return Err(InteractionError::InvalidArgument(
            "command must not be empty".to_string(),
        ));
    }

    let mut text = format!("/{}", name);
    if !params.is_empty() {
        text.push(' ');
        text.push_str(&params.join(" "));
    }
    Ok(text)
}

fn resolve_message_id(on_message: &MessageRef) -> Result<MessageId, InteractionError> {
    let id = on_message.id();
    if id.0 <= 0 {
        return Err(InteractionError::InvalidArgument(format!(
            "invalid message id {} for `on_message`",
            id.0
        )));
    }
    Ok(id)
}
