//! Application configuration
//!
//! Everything environment-derived is read once into [`AppConfig`] and passed
//! into the services, so tests can build a config from a plain map instead of
//! mutating the process environment.

use std::time::Duration;

/// Default HTTP listen address
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default Telegram Bot API base URL
const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default 17TRACK API base URL
const DEFAULT_TRACK17_BASE_URL: &str = "https://api.17track.net/track/v2.2";

/// Default number of tracking groups checked per pass
const DEFAULT_SYNC_LIMIT: u32 = 20;

/// Hard upper bound on tracking groups checked per pass
const MAX_SYNC_LIMIT: u32 = 200;

/// Default delay before the first tracking check (days)
const DEFAULT_FIRST_CHECK_DAYS: u32 = 2;

/// Default delay between tracking rechecks (days)
const DEFAULT_RECHECK_DAYS: u32 = 4;

/// Upper bound accepted for either tracking delay (days)
const MAX_CHECK_DAYS: u32 = 3650;

/// Default timeout applied to every outbound call (seconds)
const DEFAULT_OUTBOUND_TIMEOUT_SECS: u64 = 20;
const MIN_OUTBOUND_TIMEOUT_SECS: u64 = 10;
const MAX_OUTBOUND_TIMEOUT_SECS: u64 = 30;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_BIND_ADDR: &str = "BIND_ADDR";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_API_BASE: &str = "TELEGRAM_API_BASE";
pub const ENV_TELEGRAM_WEBHOOK_SECRET: &str = "TELEGRAM_WEBHOOK_SECRET";
pub const ENV_TRACK17_API_KEY: &str = "TRACK17_API_KEY";
pub const ENV_TRACK17_BASE_URL: &str = "TRACK17_BASE_URL";
pub const ENV_TRACK17_SYNC_LIMIT: &str = "TRACK17_SYNC_LIMIT";
pub const ENV_TRACK17_FIRST_CHECK_DAYS: &str = "TRACK17_FIRST_CHECK_DAYS";
pub const ENV_TRACK17_RECHECK_DAYS: &str = "TRACK17_RECHECK_DAYS";
pub const ENV_MANUAL_TRIGGER_SECRET: &str = "MANUAL_TRIGGER_SECRET";
pub const ENV_CRON_SECRET: &str = "CRON_SECRET";
pub const ENV_EMAIL_NOTIFICATIONS_ENABLED: &str = "EMAIL_NOTIFICATIONS_ENABLED";
pub const ENV_SMTP_HOST: &str = "SMTP_HOST";
pub const ENV_SMTP_USERNAME: &str = "SMTP_USERNAME";
pub const ENV_SMTP_PASSWORD: &str = "SMTP_PASSWORD";
pub const ENV_SMTP_FROM: &str = "SMTP_FROM";
pub const ENV_OUTBOUND_TIMEOUT_SECS: &str = "OUTBOUND_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub telegram: TelegramConfig,
    pub tracking: TrackingConfig,
    pub email: Option<EmailConfig>,
    pub manual_trigger_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub outbound_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base: String,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub batch_limit: u32,
    pub first_check_days: u32,
    pub recheck_days: u32,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_TRACK17_BASE_URL.to_string(),
            batch_limit: DEFAULT_SYNC_LIMIT,
            first_check_days: DEFAULT_FIRST_CHECK_DAYS,
            recheck_days: DEFAULT_RECHECK_DAYS,
        }
    }
}

impl TrackingConfig {
    pub fn first_check_delay(&self) -> chrono::Duration {
        chrono::Duration::days(self.first_check_days as i64)
    }

    pub fn recheck_delay(&self) -> chrono::Duration {
        chrono::Duration::days(self.recheck_days as i64)
    }
}

impl AppConfig {
    /// Build the config from the process environment
    ///
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup
    ///
    /// Empty values count as absent. Numeric knobs that fail validation fall
    /// back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let batch_limit = match parse_u32(
            ENV_TRACK17_SYNC_LIMIT,
            get(ENV_TRACK17_SYNC_LIMIT),
            DEFAULT_SYNC_LIMIT,
        ) {
            0 => {
                tracing::warn!("TRACK17_SYNC_LIMIT must be at least 1, using default");
                DEFAULT_SYNC_LIMIT
            }
            limit => limit.min(MAX_SYNC_LIMIT),
        };

        let tracking = TrackingConfig {
            api_key: get(ENV_TRACK17_API_KEY),
            base_url: get(ENV_TRACK17_BASE_URL)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TRACK17_BASE_URL.to_string()),
            batch_limit,
            first_check_days: parse_check_days(
                ENV_TRACK17_FIRST_CHECK_DAYS,
                get(ENV_TRACK17_FIRST_CHECK_DAYS),
                DEFAULT_FIRST_CHECK_DAYS,
            ),
            recheck_days: parse_check_days(
                ENV_TRACK17_RECHECK_DAYS,
                get(ENV_TRACK17_RECHECK_DAYS),
                DEFAULT_RECHECK_DAYS,
            ),
        };

        let telegram = TelegramConfig {
            bot_token: get(ENV_TELEGRAM_BOT_TOKEN),
            api_base: get(ENV_TELEGRAM_API_BASE)
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            webhook_secret: get(ENV_TELEGRAM_WEBHOOK_SECRET),
        };

        let email_switch = get(ENV_EMAIL_NOTIFICATIONS_ENABLED)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let email = if email_switch {
            match (
                get(ENV_SMTP_HOST),
                get(ENV_SMTP_USERNAME),
                get(ENV_SMTP_PASSWORD),
                get(ENV_SMTP_FROM),
            ) {
                (Some(smtp_host), Some(username), Some(password), Some(from)) => Some(EmailConfig {
                    smtp_host,
                    username,
                    password,
                    from,
                }),
                _ => {
                    tracing::warn!(
                        "EMAIL_NOTIFICATIONS_ENABLED is set but SMTP settings are incomplete - email channel disabled"
                    );
                    None
                }
            }
        } else {
            None
        };

        let timeout_secs = get(ENV_OUTBOUND_TIMEOUT_SECS)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_OUTBOUND_TIMEOUT_SECS)
            .clamp(MIN_OUTBOUND_TIMEOUT_SECS, MAX_OUTBOUND_TIMEOUT_SECS);

        Self {
            database_url: get(ENV_DATABASE_URL),
            bind_addr: get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            telegram,
            tracking,
            email,
            manual_trigger_secret: get(ENV_MANUAL_TRIGGER_SECRET),
            cron_secret: get(ENV_CRON_SECRET),
            outbound_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn parse_u32(key: &str, raw: Option<String>, default: u32) -> u32 {
    match raw {
        None => default,
        Some(value) => match value.parse::<u32>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key = key, value = %value, default = default, "Invalid value, using default");
                default
            }
        },
    }
}

fn parse_check_days(key: &str, raw: Option<String>, default: u32) -> u32 {
    match parse_u32(key, raw, default) {
        days if days > MAX_CHECK_DAYS => {
            tracing::warn!(key = key, days = days, max = MAX_CHECK_DAYS, default = default, "Delay too large, using default");
            default
        }
        days => days,
    }
}
