//! tgintegration - CLI entry point.
//!
//! Provides subcommands to sign in, ping a bot, send commands and show configuration.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use tgintegration::cli::{Cli, Commands};
use tgintegration::client::mtproto::MtprotoClient;
use tgintegration::client::telegram::TeloxideClient;
use tgintegration::config::Account;
use tgintegration::{AwaitOptions, Config, InteractionClient, Peer, Response, TelegramClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => print_status(cli.config),
        Commands::Login => {
            let config = Config::load(cli.config).context("Failed to load configuration")?;
            login(&config).await?;
        }
        command => {
            let config = Config::load(cli.config).context("Failed to load configuration")?;
            match &config.account {
                Account::User {
                    api_id,
                    api_hash,
                    session_file,
                    ..
                } => {
                    let client = MtprotoClient::connect(*api_id, api_hash, session_file)
                        .await
                        .context("Failed to connect to Telegram")?;
                    if !client.is_authorized().await? {
                        anyhow::bail!("Not signed in. Run `tgintegration login` first.");
                    }
                    client.start_updates();
                    run(connect(client, &config), command, &config).await?;
                }
                Account::Bot { token } => {
                    let client = TeloxideClient::new(token);
                    client.start_polling();
                    run(connect(client, &config), command, &config).await?;
                }
            }
        }
    }

    Ok(())
}

/// Wrap a started client with the configured correlator timing.
fn connect<C: TelegramClient + 'static>(client: C, config: &Config) -> InteractionClient<C> {
    InteractionClient::with_settings(Arc::new(client), config.settings.clone())
}

async fn run<C: TelegramClient + 'static>(
    client: InteractionClient<C>,
    command: Commands,
    config: &Config,
) -> Result<()> {
    tracing::info!("Using {} backend", client.client().platform_name());

    match command {
        Commands::Ping {
            peer,
            messages,
            max_wait,
            min_wait_consecutive,
        } => {
            let peer = target_peer(peer, config)?;
            let overrides = if messages.is_empty() {
                None
            } else {
                Some(messages)
            };
            let response = client
                .ping_bot(peer.clone(), overrides, max_wait, min_wait_consecutive)
                .await
                .with_context(|| format!("Failed to ping {}", peer))?;

            match response {
                Some(response) if !response.is_empty() => {
                    println!("✅ {} is online", peer);
                    print_response(&response);
                }
                _ => println!("❌ No response from {}", peer),
            }
        }
        Commands::Command {
            command,
            params,
            chat,
            await_response,
            num_expected,
        } => {
            let peer = target_peer(chat, config)?;
            let params: Vec<&str> = params.iter().map(String::as_str).collect();

            if await_response {
                let options = AwaitOptions::default()
                    .max_wait(config.settings.max_wait)
                    .min_wait_consecutive(Some(config.settings.min_wait_consecutive))
                    .num_expected(num_expected);

                let response = client
                    .send_command_await(peer.clone(), &command, &params, options)
                    .await
                    .context("Failed to send command")?;
                match response {
                    Some(response) => print_response(&response),
                    None => println!("❌ Unexpected number of replies"),
                }
            } else {
                let sent = client
                    .send_command(peer.clone(), &command, &params)
                    .await
                    .context("Failed to send command")?;
                println!("📤 Sent {:?} to {}", sent.text().unwrap_or_default(), peer);
            }
        }
        Commands::Login | Commands::Status => {}
    }

    Ok(())
}

/// Interactive sign-in for the configured user account.
async fn login(config: &Config) -> Result<()> {
    let Account::User {
        api_id,
        api_hash,
        session_file,
        phone,
    } = &config.account
    else {
        anyhow::bail!("Login needs a user account (telegram.api_id and telegram.api_hash)");
    };

    let client = MtprotoClient::connect(*api_id, api_hash, session_file)
        .await
        .context("Failed to connect to Telegram")?;
    if client.is_authorized().await? {
        println!("✅ Already signed in");
        return Ok(());
    }

    let phone = match phone {
        Some(phone) => phone.clone(),
        None => prompt("Enter your phone number (international format): ")?,
    };
    client
        .sign_in(phone.trim(), prompt)
        .await
        .context("Failed to sign in")?;
    println!("✅ Signed in, session saved to {}", session_file.display());
    Ok(())
}

fn prompt(message: &str) -> std::io::Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn target_peer(arg: Option<String>, config: &Config) -> Result<Peer> {
    arg.map(Peer::from)
        .or_else(|| config.peer.clone())
        .context("No peer given and none configured")
}

fn print_response<T>(response: &Response<T>) {
    println!(
        "📨 {} message(s) after {:.1}s",
        response.num_messages(),
        response.started().elapsed().as_secs_f64()
    );
    for message in response {
        println!("  • {}", message.text().unwrap_or("<no text>"));
        for row in &message.inline_keyboard {
            let labels: Vec<&str> = row.iter().map(|b| b.text.as_str()).collect();
            println!("    [{}]", labels.join("] ["));
        }
    }
}

/// Print configuration status.
fn print_status(config_path: Option<std::path::PathBuf>) {
    println!("📊 tgintegration Status\n");

    match Config::load(config_path) {
        Ok(config) => {
            println!("✅ Configuration: Found");
            match &config.account {
                Account::User { session_file, .. } => {
                    let state = if session_file.exists() { "saved" } else { "not signed in" };
                    println!("   Account: user ({}, session {})", session_file.display(), state);
                }
                Account::Bot { .. } => println!("   Account: bot (no inline queries or buttons)"),
            }
            match &config.peer {
                Some(peer) => println!("   Peer: {}", peer),
                None => println!("   Peer: Not configured"),
            }
            println!("   Max wait: {}s", config.settings.max_wait.as_secs());
            println!(
                "   Consecutive wait: {}s",
                config.settings.min_wait_consecutive.as_secs()
            );
            println!(
                "   Poll interval: {}ms",
                config.settings.poll_interval.as_millis()
            );
        }
        Err(e) => {
            println!("❌ Configuration: Not found or invalid");
            println!("   Error: {}", e);
            println!();
            println!("Create config at ~/.tgintegration/config.json:");
            println!(
                r#"  {{"telegram": {{"api_id": 12345, "api_hash": "...", "peer": "@your_bot"}}}}"#
            );
        }
    }
}
