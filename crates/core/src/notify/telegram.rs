use crate::config::Settings;
use crate::error::{SignalError, Stage};
use crate::format::TELEGRAM_MAX_MESSAGE_CHARS;
use crate::notify::Notifier;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let bot_token = settings.require_telegram_bot_token()?.to_string();
        let chat_id = settings.require_telegram_chat_id()?.to_string();
        let base_url =
            std::env::var("TELEGRAM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("TELEGRAM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(base_url, bot_token, chat_id, Duration::from_secs(timeout_secs))
    }

    pub fn new(
        base_url: String,
        bot_token: String,
        chat_id: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build telegram http client")?;

        Ok(Self {
            http,
            base_url,
            bot_token,
            chat_id,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.base_url.trim_end_matches('/'),
            self.bot_token
        )
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn sink_name(&self) -> &'static str {
        "telegram"
    }

    fn max_message_chars(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_CHARS
    }

    async fn send(&self, message: &str) -> Result<(), SignalError> {
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "Markdown",
            disable_web_page_preview: false,
        };

        // reqwest errors can echo the url, which carries the bot token.
        let res = self
            .http
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(|e| SignalError::transient(Stage::Notify, e.without_url().to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| SignalError::transient(Stage::Notify, e.without_url().to_string()))?;

        let api = serde_json::from_str::<ApiResponse>(&text).ok();
        if !status.is_success() || !api.as_ref().is_some_and(|r| r.ok) {
            let description = api
                .and_then(|r| r.description)
                .unwrap_or(text);
            return Err(SignalError::from_status(
                Stage::Notify,
                status,
                format!("telegram HTTP {status}: {description}"),
            ));
        }

        tracing::debug!(chars = message.chars().count(), "telegram message accepted");
        Ok(())
    }
}
