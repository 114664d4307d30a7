//! Telegram sink.

use crate::message::{format_alert_message, host_name, Markup};
use crate::notifier::{Notifier, NotifyError};
use async_trait::async_trait;
use chrono::Utc;
use gossip_core::{SpreadSnapshot, TradingPair};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::info;

pub const TOKEN_VAR: &str = "TELEGRAM_BOT_TOKEN";
pub const CHAT_ID_VAR: &str = "TELEGRAM_CHAT_ID";

/// Sends alerts to one Telegram chat through a bot.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    host: String,
}

impl TelegramNotifier {
    /// Create a notifier with the given bot token and chat ID.
    pub fn new(token: &str, chat_id: &str) -> Result<Self, NotifyError> {
        if token.trim().is_empty() {
            return Err(NotifyError::Config("empty Telegram bot token".to_string()));
        }
        let chat_id = parse_chat_id(chat_id)?;
        Ok(Self {
            bot: Bot::new(token),
            chat_id,
            host: host_name(),
        })
    }

    /// Create a notifier from `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Result<Self, NotifyError> {
        let token = std::env::var(TOKEN_VAR)
            .map_err(|_| NotifyError::Config(format!("{} is not set", TOKEN_VAR)))?;
        let chat_id = std::env::var(CHAT_ID_VAR)
            .map_err(|_| NotifyError::Config(format!("{} is not set", CHAT_ID_VAR)))?;
        Self::new(&token, &chat_id)
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

fn parse_chat_id(raw: &str) -> Result<ChatId, NotifyError> {
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| NotifyError::Config(format!("invalid Telegram chat ID {:?}", raw)))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, pair: &TradingPair, snapshot: &SpreadSnapshot) -> Result<(), NotifyError> {
        let message = format_alert_message(pair, snapshot, &self.host, Utc::now(), Markup::Html);
        self.bot
            .send_message(self.chat_id, message)
            .parse_mode(ParseMode::Html)
            .await?;
        info!(chat_id = self.chat_id.0, pair = %pair, "Alert sent");
        Ok(())
    }
}
