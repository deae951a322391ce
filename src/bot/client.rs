use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::bot::api::{InlineKeyboardMarkup, ReplyMarkup};
use crate::config::Config;
use crate::error::AppError;

/// Outbound messaging capability.
///
/// The dispatch loop owns the only handle; request handlers never call this
/// directly. Implementations report per-call success or failure and nothing
/// more, so callers decide whether a failure aborts or is tolerated.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<(), AppError>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), AppError>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), AppError>;
}

/// Telegram Bot API client over HTTPS.
pub struct TelegramBot {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl TelegramBot {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: config.telegram_api_base.clone(),
            token: config.bot_token.clone(),
        }
    }

    async fn call(&self, method: &str, payload: Value) -> Result<(), AppError> {
        let url = format!("{}/bot{}/{}", self.base, self.token, method);

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::Upstream(format!("{method}: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("{method}: {status} {body}")));
        }

        debug!(method, "telegram api call ok");
        Ok(())
    }
}

#[async_trait]
impl BotApi for TelegramBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<ReplyMarkup>,
    ) -> Result<(), AppError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)
                .map_err(|err| AppError::Internal(format!("serialize reply markup: {err}")))?;
        }

        self.call("sendMessage", payload).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), AppError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = serde_json::to_value(markup)
                .map_err(|err| AppError::Internal(format!("serialize reply markup: {err}")))?;
        }

        self.call("editMessageText", payload).await
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), AppError> {
        self.call(
            "answerCallbackQuery",
            json!({
                "callback_query_id": callback_id,
                "text": text,
                "show_alert": show_alert,
            }),
        )
        .await
    }
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::bot::api::{InlineKeyboardMarkup, ReplyMarkup};
    use crate::error::AppError;

    use super::BotApi;

    /// Records every outbound call; sends to chats in `fail_chats` error out.
    #[derive(Default)]
    pub struct RecordingBot {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub edits: Mutex<Vec<(i64, i64, String)>>,
        pub answers: Mutex<Vec<(String, String, bool)>>,
        pub fail_chats: Mutex<HashSet<i64>>,
    }

    impl RecordingBot {
        pub fn fail_chat(&self, chat_id: i64) {
            self.fail_chats.lock().unwrap().insert(chat_id);
        }

        pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(chat, _)| *chat == chat_id)
                .map(|(_, text)| text.clone())
                .collect()
        }

        pub fn last_sent_to(&self, chat_id: i64) -> Option<String> {
            self.sent_to(chat_id).pop()
        }
    }

    #[async_trait]
    impl BotApi for RecordingBot {
        async fn send_message(
            &self,
            chat_id: i64,
            text: &str,
            _reply_markup: Option<ReplyMarkup>,
        ) -> Result<(), AppError> {
            if self.fail_chats.lock().unwrap().contains(&chat_id) {
                return Err(AppError::Upstream(format!("chat {chat_id} unreachable")));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }

        async fn edit_message_text(
            &self,
            chat_id: i64,
            message_id: i64,
            text: &str,
            _reply_markup: Option<InlineKeyboardMarkup>,
        ) -> Result<(), AppError> {
            self.edits
                .lock()
                .unwrap()
                .push((chat_id, message_id, text.to_string()));
            Ok(())
        }

        async fn answer_callback_query(
            &self,
            callback_id: &str,
            text: &str,
            show_alert: bool,
        ) -> Result<(), AppError> {
            self.answers.lock().unwrap().push((
                callback_id.to_string(),
                text.to_string(),
                show_alert,
            ));
            Ok(())
        }
    }
}
