//! Error types for the library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors related to configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Errors surfaced by a [`TelegramClient`](crate::client::TelegramClient) implementation.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server asked us to back off before sending again.
    #[error("Flood control: retry after {}s", .0.as_secs())]
    FloodWait(Duration),

    /// Internal Telegram error while fetching the update difference.
    #[error("Telegram failed to get update difference: {0}")]
    GetDifferenceFailed(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    #[error("Operation not supported by this client: {0}")]
    Unsupported(&'static str),

    #[error("Telegram error: {0}")]
    Telegram(teloxide::RequestError),

    #[error("MTProto error: {0}")]
    Invocation(grammers_mtsender::InvocationError),

    #[error("{0}")]
    Other(String),
}

impl From<teloxide::RequestError> for ClientError {
    fn from(err: teloxide::RequestError) -> Self {
        match err {
            teloxide::RequestError::RetryAfter(seconds) => ClientError::FloodWait(seconds.duration()),
            other => ClientError::Telegram(other),
        }
    }
}

impl From<grammers_mtsender::InvocationError> for ClientError {
    fn from(err: grammers_mtsender::InvocationError) -> Self {
        match err {
            grammers_mtsender::InvocationError::Rpc(rpc) if rpc.name == "FLOOD_WAIT" => {
                ClientError::FloodWait(Duration::from_secs(u64::from(rpc.value.unwrap_or(0))))
            }
            grammers_mtsender::InvocationError::Rpc(rpc)
                if rpc.name == "RPC_MCGET_FAIL" || rpc.name.starts_with("GET_DIFFERENCE") =>
            {
                ClientError::GetDifferenceFailed(rpc.name)
            }
            other => ClientError::Invocation(other),
        }
    }
}

/// Errors returned by [`InteractionClient`](crate::interaction::InteractionClient).
#[derive(Error, Debug)]
pub enum InteractionError {
    /// The bot's response did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    /// A blocking action panicked or was cancelled on the blocking pool.
    #[error("Action failed to complete: {0}")]
    ActionFailed(#[from] tokio::task::JoinError),
}

impl InteractionError {
    /// Whether this is the transient "get difference failed" server error.
    pub fn is_transient_server_error(&self) -> bool {
        matches!(self, InteractionError::Client(ClientError::GetDifferenceFailed(_)))
    }
}
