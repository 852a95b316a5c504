use std::{
    env,
    net::SocketAddr,
    str::FromStr,
    time::Duration,
};

use chrono_tz::Tz;
use thiserror::Error;
use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite:data/data.db";
const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_REMINDER_HOUR: u32 = 8;
const DEFAULT_REMINDER_POLL_INTERVAL: u64 = 300;
const DEFAULT_MAX_CONCURRENCY: usize = 10;
const DEFAULT_LLM_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_LLM_REQUEST_TIMEOUT: u64 = 30;
const DEFAULT_LLM_MAX_RETRIES: u32 = 2;

/// Errors raised while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("Environment variable {0} is required")]
    Missing(&'static str),
    /// A variable is set to a value that cannot be used.
    #[error("Invalid value {value:?} for {name}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// How the bot receives updates from Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotMode {
    /// Long polling of `getUpdates`.
    Polling,
    /// An HTTP listener registered as the bot's webhook.
    Webhook {
        /// The public URL Telegram posts updates to.
        url: Url,
        /// The local address to listen on.
        addr: SocketAddr,
        /// Secret token Telegram sends with every update.
        secret_token: Option<String>,
    },
}

/// Represents the application configuration.
#[derive(Debug)]
pub struct Config {
    /// The Telegram bot token.
    pub telegram_bot_token: String,
    /// The URL of the database.
    pub database_url: String,
    /// Catalog file imported on startup, if any.
    pub catalog_path: Option<String>,
    /// Time zone of users who have not chosen one.
    pub default_timezone: Tz,
    /// How updates are received.
    pub bot_mode: BotMode,
    /// Whether updates sent while the bot was offline are skipped.
    pub drop_pending_updates: bool,
    /// Local hour from which daily reminders are sent.
    pub reminder_hour: u32,
    /// The interval between reminder rounds.
    pub reminder_poll_interval: Duration,
    /// The maximum number of users processed concurrently by the reminder.
    pub max_concurrency: usize,
    /// API key of the OpenRouter provider.
    pub openrouter_api_key: Option<String>,
    /// Model used when a request does not name one.
    pub llm_default_model: String,
    /// Timeout of a single LLM request.
    pub llm_request_timeout: Duration,
    /// Retries of a rate limited or timed out LLM request.
    pub llm_max_retries: u32,
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token =
            env::var("TELOXIDE_TOKEN").map_err(|_| ConfigError::Missing("TELOXIDE_TOKEN"))?;

        let default_timezone = match env::var("DEFAULT_TIMEZONE") {
            Ok(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::Invalid { name: "DEFAULT_TIMEZONE", value: name })?,
            Err(_) => Tz::UTC,
        };

        let reminder_hour = parse_or("REMINDER_HOUR", DEFAULT_REMINDER_HOUR);
        if reminder_hour > 23 {
            return Err(ConfigError::Invalid {
                name: "REMINDER_HOUR",
                value: reminder_hour.to_string(),
            });
        }

        let reminder_poll_interval =
            parse_or("REMINDER_POLL_INTERVAL", DEFAULT_REMINDER_POLL_INTERVAL);
        if reminder_poll_interval == 0 {
            return Err(ConfigError::Invalid {
                name: "REMINDER_POLL_INTERVAL",
                value: reminder_poll_interval.to_string(),
            });
        }

        Ok(Self {
            telegram_bot_token,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            catalog_path: env::var("CATALOG_PATH").ok().filter(|p| !p.is_empty()),
            default_timezone,
            bot_mode: bot_mode_from_env()?,
            drop_pending_updates: parse_or("BOT_DROP_PENDING_UPDATES", false),
            reminder_hour,
            reminder_poll_interval: Duration::from_secs(reminder_poll_interval),
            max_concurrency: parse_or("MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_default_model: env::var("LLM_DEFAULT_MODEL")
                .unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_request_timeout: Duration::from_secs(parse_or(
                "LLM_REQUEST_TIMEOUT_SECONDS",
                DEFAULT_LLM_REQUEST_TIMEOUT,
            )),
            llm_max_retries: parse_or("LLM_MAX_RETRIES", DEFAULT_LLM_MAX_RETRIES),
        })
    }
}

fn bot_mode_from_env() -> Result<BotMode, ConfigError> {
    let mode = env::var("BOT_MODE").unwrap_or_else(|_| "polling".to_string());

    match mode.to_lowercase().as_str() {
        "polling" => Ok(BotMode::Polling),
        "webhook" => {
            let url =
                env::var("BOT_WEBHOOK_URL").map_err(|_| ConfigError::Missing("BOT_WEBHOOK_URL"))?;
            let url = Url::parse(&url)
                .map_err(|_| ConfigError::Invalid { name: "BOT_WEBHOOK_URL", value: url })?;

            let addr =
                env::var("BOT_WEBHOOK_ADDR").unwrap_or_else(|_| DEFAULT_WEBHOOK_ADDR.to_string());
            let addr = addr
                .parse()
                .map_err(|_| ConfigError::Invalid { name: "BOT_WEBHOOK_ADDR", value: addr })?;

            let secret_token = env::var("BOT_WEBHOOK_TOKEN").ok().filter(|t| !t.is_empty());
            Ok(BotMode::Webhook { url, addr, secret_token })
        }
        _ => Err(ConfigError::Invalid { name: "BOT_MODE", value: mode }),
    }
}

/// Reads and parses a variable, falling back to `default` when it is unset
/// or malformed.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
