//! Configuration for the command-line runner.
//!
//! Loaded from `~/.tgintegration/config.json`:
//!
//! ```json
//! {
//!   "telegram": {
//!     "api_id": 12345,
//!     "api_hash": "...",
//!     "phone": "+15550100",
//!     "peer": "@my_bot"
//!   },
//!   "timing": { "max_wait_seconds": 15, "min_wait_consecutive_seconds": 2 }
//! }
//! ```
//!
//! A user account (`api_id` + `api_hash`) is preferred. A `bot_token` alone selects the
//! Bot API backend, which cannot run inline queries or press buttons.
//!
//! Falls back to environment variables if no config file exists.

use crate::client::{ChatId, Peer};
use crate::error::ConfigError;
use crate::interaction::Settings;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs_config_dir().join("config.json")
}

/// Get the .tgintegration config directory path.
fn dirs_config_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".tgintegration"))
        .unwrap_or_else(|| PathBuf::from(".tgintegration"))
}

/// JSON configuration file structure.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    telegram: TelegramConfigFile,
    #[serde(default)]
    timing: TimingConfigFile,
}

#[derive(Debug, Deserialize)]
struct TelegramConfigFile {
    #[serde(default)]
    api_id: Option<i32>,
    #[serde(default)]
    api_hash: Option<String>,
    #[serde(default)]
    session_file: Option<PathBuf>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    peer: Option<PeerValue>,
}

/// Session file used when none is configured.
pub fn default_session_path() -> PathBuf {
    dirs_config_dir().join("tgintegration.session")
}

/// Credentials of the account that talks to the bot under test.
#[derive(Debug, Clone, PartialEq)]
pub enum Account {
    /// User account over MTProto.
    User {
        api_id: i32,
        api_hash: String,
        session_file: PathBuf,
        /// Only needed for the first login
        phone: Option<String>,
    },
    /// Bot API token.
    Bot { token: String },
}

impl Account {
    /// Pick the account from the optional credentials; user credentials win.
    fn select(
        api_id: Option<i32>,
        api_hash: Option<String>,
        session_file: Option<PathBuf>,
        phone: Option<String>,
        bot_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let api_hash = api_hash.filter(|h| !h.is_empty());
        match (api_id, api_hash) {
            (Some(api_id), Some(api_hash)) => Ok(Account::User {
                api_id,
                api_hash,
                session_file: session_file.unwrap_or_else(default_session_path),
                phone: phone.filter(|p| !p.trim().is_empty()),
            }),
            (Some(_), None) => Err(ConfigError::MissingField("telegram.api_hash".to_string())),
            (None, Some(_)) => Err(ConfigError::MissingField("telegram.api_id".to_string())),
            (None, None) => match bot_token.filter(|t| !t.is_empty()) {
                Some(token) => Ok(Account::Bot { token }),
                None => Err(ConfigError::MissingField(
                    "telegram.api_id/api_hash or telegram.bot_token".to_string(),
                )),
            },
        }
    }
}

/// Peer that can be either string or integer in JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PeerValue {
    String(String),
    Integer(i64),
}

impl PeerValue {
    fn to_peer(&self) -> Result<Peer, ConfigError> {
        match self {
            PeerValue::String(s) if s.trim().is_empty() => Err(ConfigError::MissingField(
                "telegram.peer must not be empty".to_string(),
            )),
            PeerValue::String(s) => Ok(Peer::parse(s)),
            PeerValue::Integer(i) => Ok(Peer::Id(ChatId(*i))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TimingConfigFile {
    #[serde(default = "default_max_wait_seconds")]
    max_wait_seconds: u64,
    #[serde(default = "default_min_wait_consecutive_seconds")]
    min_wait_consecutive_seconds: u64,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_ping_interval_ms")]
    ping_interval_ms: u64,
    #[serde(default = "default_server_error_cooldown_seconds")]
    server_error_cooldown_seconds: u64,
}

impl Default for TimingConfigFile {
    fn default() -> Self {
        Self {
            max_wait_seconds: default_max_wait_seconds(),
            min_wait_consecutive_seconds: default_min_wait_consecutive_seconds(),
            poll_interval_ms: default_poll_interval_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            server_error_cooldown_seconds: default_server_error_cooldown_seconds(),
        }
    }
}

fn default_max_wait_seconds() -> u64 {
    15
}

fn default_min_wait_consecutive_seconds() -> u64 {
    2
}

fn default_poll_interval_ms() -> u64 {
    300
}

fn default_ping_interval_ms() -> u64 {
    1000
}

fn default_server_error_cooldown_seconds() -> u64 {
    60
}

impl TimingConfigFile {
    fn to_settings(&self) -> Result<Settings, ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::MissingField(
                "timing.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(Settings {
            max_wait: Duration::from_secs(self.max_wait_seconds),
            min_wait_consecutive: Duration::from_secs(self.min_wait_consecutive_seconds),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            server_error_cooldown: Duration::from_secs(self.server_error_cooldown_seconds),
        })
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub account: Account,
    /// Bot under test, if configured.
    pub peer: Option<Peer>,
    /// Correlator timing
    pub settings: Settings,
}

impl Config {
    /// Load configuration from JSON file, falling back to environment variables.
    ///
    /// Search order:
    /// 1. Provided config_path (if any)
    /// 2. `~/.tgintegration/config.json`
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::from_json(&path);
        }

        let default_path = default_config_path();
        if default_path.exists() {
            return Self::from_json(&default_path);
        }

        Self::from_env()
    }

    /// Load configuration from a JSON file.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        let telegram = file.telegram;

        Ok(Self {
            peer: telegram.peer.as_ref().map(PeerValue::to_peer).transpose()?,
            account: Account::select(
                telegram.api_id,
                telegram.api_hash,
                telegram.session_file,
                telegram.phone,
                telegram.bot_token,
            )?,
            settings: file.timing.to_settings()?,
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file (silently ignore if not found)
        let _ = dotenvy::from_path(dirs_config_dir().join(".env"));

        let api_id = match env::var("TELEGRAM_API_ID") {
            Ok(raw) => Some(raw.trim().parse::<i32>().map_err(|_| {
                ConfigError::MissingEnvVar("TELEGRAM_API_ID (must be an integer)".to_string())
            })?),
            Err(_) => None,
        };

        let account = Account::select(
            api_id,
            env::var("TELEGRAM_API_HASH").ok(),
            env::var("TGINTEGRATION_SESSION").ok().map(PathBuf::from),
            env::var("TELEGRAM_PHONE").ok(),
            env::var("TELEGRAM_BOT_TOKEN").ok(),
        )
        .map_err(|_| {
            ConfigError::MissingEnvVar(
                "TELEGRAM_API_ID and TELEGRAM_API_HASH, or TELEGRAM_BOT_TOKEN".to_string(),
            )
        })?;

        let peer = env::var("TGINTEGRATION_PEER")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(|p| Peer::parse(&p));

        Ok(Self {
            account,
            peer,
            settings: Settings::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, content).unwrap();
        (dir, config_path)
    }

    #[test]
    fn test_config_with_username_peer() {
        let (_dir, path) = write_config(
            r#"{"telegram": {"bot_token": "test_token", "peer": "@echo_bot"}}"#,
        );

        let config = Config::from_json(&path).unwrap();
        assert_eq!(
            config.account,
            Account::Bot {
                token: "test_token".to_string()
            }
        );
        assert_eq!(config.peer, Some(Peer::Username("echo_bot".to_string())));
        assert_eq!(config.settings, Settings::default());
    }

    #[test]
    fn test_config_with_int_peer_and_timing() {
        let (_dir, path) = write_config(
            r#"{
                "telegram": {"bot_token": "token123", "peer": 123456},
                "timing": {"max_wait_seconds": 30, "poll_interval_ms": 100}
            }"#,
        );

        let config = Config::from_json(&path).unwrap();
        assert_eq!(config.peer, Some(Peer::Id(ChatId(123456))));
        assert_eq!(config.settings.max_wait, Duration::from_secs(30));
        assert_eq!(config.settings.poll_interval, Duration::from_millis(100));
        assert_eq!(config.settings.min_wait_consecutive, Duration::from_secs(2));
        assert_eq!(config.settings.server_error_cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_config_without_peer() {
        let (_dir, path) = write_config(r#"{"telegram": {"bot_token": "t"}}"#);
        let config = Config::from_json(&path).unwrap();
        assert!(config.peer.is_none());
    }

    #[test]
    fn test_config_user_account() {
        let (_dir, path) = write_config(
            r#"{"telegram": {
                "api_id": 12345,
                "api_hash": "abcdef",
                "session_file": "/tmp/test.session",
                "phone": "+15550100",
                "bot_token": "ignored"
            }}"#,
        );

        let config = Config::from_json(&path).unwrap();
        assert_eq!(
            config.account,
            Account::User {
                api_id: 12345,
                api_hash: "abcdef".to_string(),
                session_file: PathBuf::from("/tmp/test.session"),
                phone: Some("+15550100".to_string()),
            }
        );
    }

    #[test]
    fn test_config_user_account_default_session() {
        let (_dir, path) =
            write_config(r#"{"telegram": {"api_id": 1, "api_hash": "h"}}"#);
        match Config::from_json(&path).unwrap().account {
            Account::User {
                session_file,
                phone,
                ..
            } => {
                assert_eq!(session_file, default_session_path());
                assert!(phone.is_none());
            }
            other => panic!("expected user account, got {:?}", other),
        }
    }

    #[test]
    fn test_config_incomplete_user_credentials() {
        let (_dir, path) = write_config(r#"{"telegram": {"api_id": 1, "bot_token": "t"}}"#);
        assert!(matches!(
            Config::from_json(&path),
            Err(ConfigError::MissingField(field)) if field == "telegram.api_hash"
        ));
    }

    #[test]
    fn test_config_missing_credentials() {
        let (_dir, path) = write_config(r#"{"telegram": {"bot_token": ""}}"#);
        assert!(matches!(
            Config::from_json(&path),
            Err(ConfigError::MissingField(_))
        ));

        let (_dir, path) = write_config(r#"{"telegram": {"peer": "1"}}"#);
        assert!(matches!(
            Config::from_json(&path),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_poll_interval() {
        let (_dir, path) = write_config(
            r#"{"telegram": {"bot_token": "t"}, "timing": {"poll_interval_ms": 0}}"#,
        );
        assert!(Config::from_json(&path).is_err());
    }

    #[test]
    fn test_config_file_not_found() {
        let result = Config::from_json(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        let result = Config::load(Some(PathBuf::from("/nonexistent/path.json")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
