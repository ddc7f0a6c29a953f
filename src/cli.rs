//! CLI argument parsing with subcommands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Parse a non-negative number of seconds, rejecting NaN and infinities.
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{}` is not a number", value))?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| "must be a non-negative number of seconds".to_string())
}

/// Drive a Telegram bot from the command line and print its replies.
#[derive(Parser)]
#[command(name = "tgintegration")]
#[command(about = "Send messages to a Telegram bot and await its replies")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Check whether a bot is online by sending ping messages
    Ping {
        /// Bot to ping (username or chat id); defaults to the configured peer
        #[arg(long)]
        peer: Option<String>,

        /// Ping message to send (repeatable); defaults to /start
        #[arg(long = "message", short = 'm')]
        messages: Vec<String>,

        /// Seconds to wait for a first reply
        #[arg(long, value_parser = parse_seconds)]
        max_wait: Option<Duration>,

        /// Seconds of silence that end a multi-message reply
        #[arg(long, value_parser = parse_seconds)]
        min_wait_consecutive: Option<Duration>,
    },

    /// Send a slash-command, optionally awaiting the reply
    Command {
        /// Command name, with or without the leading slash
        command: String,

        /// Command parameters
        params: Vec<String>,

        /// Chat to send to; defaults to the configured peer
        #[arg(long)]
        chat: Option<String>,

        /// Wait for the bot's reply
        #[arg(long)]
        await_response: bool,

        /// Number of reply messages expected
        #[arg(long, requires = "await_response")]
        num_expected: Option<usize>,
    },

    /// Sign in with the configured user account and save the session
    Login,

    /// Show current configuration status
    Status,
}
