//! Notification sink for the daily report

use crate::types::{ProfitbookError, Result};

/// Telegram Bot API base URL
const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Destination for the rendered report
pub trait Notifier {
    fn send(&self, message: &str) -> Result<()>;
}

/// Sends HTML-formatted messages through a Telegram bot
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ProfitbookError::Notify(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.bot_token)
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, message: &str) -> Result<()> {
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "HTML"),
        ];

        // without_url keeps the bot token out of error messages
        self.client
            .post(self.send_message_url())
            .form(&form)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProfitbookError::Notify(e.without_url().to_string()))?;

        tracing::info!(chat_id = %self.chat_id, "report sent to Telegram");
        Ok(())
    }
}
