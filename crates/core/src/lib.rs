pub mod dedup;
pub mod domain;
pub mod error;
pub mod extract;
pub mod feed;
pub mod format;
pub mod llm;
pub mod notify;
pub mod poll;
pub mod retry;
pub mod schedule;
pub mod storage;
pub mod tracking;

#[cfg(test)]
mod testing;

pub mod config {
    use crate::error::SignalError;
    use crate::retry::RetryPolicy;
    use anyhow::Context;
    use std::str::FromStr;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub anthropic_api_key: Option<String>,
        pub telegram_bot_token: Option<String>,
        pub telegram_chat_id: Option<String>,
        pub twitter_auth_token: Option<String>,
        pub twitter_ct0: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
                telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
                telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
                twitter_auth_token: non_empty_var("TWITTER_AUTH_TOKEN"),
                twitter_ct0: non_empty_var("TWITTER_CT0"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }

        pub fn require_telegram_bot_token(&self) -> anyhow::Result<&str> {
            self.telegram_bot_token
                .as_deref()
                .context("TELEGRAM_BOT_TOKEN is required")
        }

        pub fn require_telegram_chat_id(&self) -> anyhow::Result<&str> {
            self.telegram_chat_id
                .as_deref()
                .context("TELEGRAM_CHAT_ID is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Knobs for the poll cycle and its scheduler.
    #[derive(Debug, Clone)]
    pub struct PollSettings {
        pub interval: Duration,
        pub max_posts: usize,
        pub posts_per_account: usize,
        pub summary_attempts: u32,
        pub notify_attempts: u32,
        pub retry_base_delay: Duration,
        pub call_timeout: Duration,
        pub chunk_pause: Duration,
    }

    impl Default for PollSettings {
        fn default() -> Self {
            Self {
                interval: Duration::from_secs(60),
                max_posts: 50,
                posts_per_account: 20,
                summary_attempts: 3,
                notify_attempts: 3,
                retry_base_delay: Duration::from_millis(1_000),
                call_timeout: Duration::from_secs(30),
                chunk_pause: Duration::from_millis(500),
            }
        }
    }

    impl PollSettings {
        pub fn from_env() -> Result<Self, SignalError> {
            let d = Self::default();
            let out = Self {
                interval: Duration::from_secs(env_or(
                    "POLL_INTERVAL_SECS",
                    d.interval.as_secs(),
                )?),
                max_posts: env_or("POLL_MAX_POSTS", d.max_posts)?,
                posts_per_account: env_or("POLL_POSTS_PER_ACCOUNT", d.posts_per_account)?,
                summary_attempts: env_or("SUMMARY_MAX_ATTEMPTS", d.summary_attempts)?,
                notify_attempts: env_or("NOTIFY_MAX_ATTEMPTS", d.notify_attempts)?,
                retry_base_delay: Duration::from_millis(env_or(
                    "RETRY_BASE_DELAY_MS",
                    millis(d.retry_base_delay),
                )?),
                call_timeout: Duration::from_secs(env_or(
                    "CALL_TIMEOUT_SECS",
                    d.call_timeout.as_secs(),
                )?),
                chunk_pause: Duration::from_millis(env_or(
                    "NOTIFY_CHUNK_PAUSE_MS",
                    millis(d.chunk_pause),
                )?),
            };
            out.validate()?;
            Ok(out)
        }

        pub fn validate(&self) -> Result<(), SignalError> {
            let checks = [
                (self.interval.is_zero(), "POLL_INTERVAL_SECS must be >= 1"),
                (self.max_posts == 0, "POLL_MAX_POSTS must be >= 1"),
                (self.posts_per_account == 0, "POLL_POSTS_PER_ACCOUNT must be >= 1"),
                (self.summary_attempts == 0, "SUMMARY_MAX_ATTEMPTS must be >= 1"),
                (self.notify_attempts == 0, "NOTIFY_MAX_ATTEMPTS must be >= 1"),
                (self.call_timeout.is_zero(), "CALL_TIMEOUT_SECS must be >= 1"),
            ];
            match checks.iter().find(|(failed, _)| *failed) {
                Some((_, msg)) => Err(SignalError::Configuration((*msg).to_string())),
                None => Ok(()),
            }
        }

        pub fn summary_retry(&self) -> RetryPolicy {
            RetryPolicy {
                max_attempts: self.summary_attempts,
                base_delay: self.retry_base_delay,
                timeout: self.call_timeout,
            }
        }

        pub fn notify_retry(&self) -> RetryPolicy {
            RetryPolicy {
                max_attempts: self.notify_attempts,
                base_delay: self.retry_base_delay,
                timeout: self.call_timeout,
            }
        }
    }

    fn millis(d: Duration) -> u64 {
        u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
    }

    fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, SignalError> {
        parse_or(key, std::env::var(key).ok(), default)
    }

    fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, SignalError> {
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(s) => s.parse::<T>().map_err(|_| {
                SignalError::Configuration(format!("{key} must be a non-negative integer (got {s:?})"))
            }),
        }
    }

}
