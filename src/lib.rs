//! Integration testing helpers for Telegram bots.
//!
//! Send a message or command to a bot and await its reply, instead of polling for
//! incoming messages by hand. The transport is abstracted behind
//! [`client::TelegramClient`]; a Bot API implementation ships in
//! [`client::telegram`].

pub mod action;
pub mod cli;
pub mod client;
pub mod config;
pub mod containers;
pub mod dispatch;
pub mod error;
pub mod filters;
pub mod interaction;
pub mod response;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use action::AwaitableAction;
pub use client::{Message, MessageRef, Peer, TelegramClient};
pub use config::Config;
pub use error::{ClientError, InteractionError};
pub use interaction::{AwaitOptions, InteractionClient, Settings};
pub use response::Response;
