use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub bot_username: String,
    pub telegram_api_base: String,
    pub http_port: u16,
    pub log_level: String,
    pub dispatch_queue_size: usize,
    pub event_buffer_size: usize,
    pub webhook_timeout_secs: u64,
    pub notify_timeout_secs: u64,
    pub send_pace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: "CourierDispatchBot".to_string(),
            telegram_api_base: "https://api.telegram.org".to_string(),
            http_port: 3000,
            log_level: "info".to_string(),
            dispatch_queue_size: 1024,
            event_buffer_size: 1024,
            webhook_timeout_secs: 30,
            notify_timeout_secs: 10,
            send_pace_ms: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            bot_token: env::var("BOT_TOKEN").unwrap_or(defaults.bot_token),
            bot_username: env::var("BOT_USERNAME").unwrap_or(defaults.bot_username),
            telegram_api_base: env::var("TELEGRAM_API_BASE").unwrap_or(defaults.telegram_api_base),
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            dispatch_queue_size: parse_or_default("DISPATCH_QUEUE_SIZE", defaults.dispatch_queue_size)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            webhook_timeout_secs: parse_or_default("WEBHOOK_TIMEOUT_SECS", defaults.webhook_timeout_secs)?,
            notify_timeout_secs: parse_or_default("NOTIFY_TIMEOUT_SECS", defaults.notify_timeout_secs)?,
            send_pace_ms: parse_or_default("SEND_PACE_MS", defaults.send_pace_ms)?,
        })
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
