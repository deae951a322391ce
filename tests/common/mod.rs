use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use courier_dispatch::api::rest::router;
use courier_dispatch::bot::api::{InlineKeyboardMarkup, ReplyMarkup};
use courier_dispatch::bot::client::BotApi;
use courier_dispatch::config::Config;
use courier_dispatch::engine::dispatch::run_dispatch_loop;
use courier_dispatch::error::AppError;
use courier_dispatch::models::courier::{Courier, CourierStatus};
use courier_dispatch::state::AppState;

/// Records every outbound call; sends to chats in `fail_chats` error out.
#[derive(Default)]
pub struct MockBot {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub edits: Mutex<Vec<(i64, i64, String)>>,
    pub answers: Mutex<Vec<(String, String, bool)>>,
    pub fail_chats: Mutex<HashSet<i64>>,
}

impl MockBot {
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

    pub fn alerts(&self) -> Vec<String> {
        self.answers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, _, alert)| *alert)
            .map(|(_, text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl BotApi for MockBot {
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

/// Full service wired to a mock bot: router + running dispatch loop.
pub fn setup() -> (axum::Router, Arc<AppState>, Arc<MockBot>) {
    let config = Config {
        send_pace_ms: 0,
        webhook_timeout_secs: 5,
        notify_timeout_secs: 5,
        ..Config::default()
    };

    let (state, job_rx) = AppState::new(config);
    let state = Arc::new(state);
    let bot = Arc::new(MockBot::default());
    tokio::spawn(run_dispatch_loop(state.clone(), bot.clone(), job_rx));

    (router(state.clone()), state, bot)
}

pub fn seed_courier(state: &AppState, telegram_id: i64, region: &str) -> Courier {
    let courier = Courier {
        id: Uuid::new_v4(),
        telegram_id: Some(telegram_id),
        telegram_username: None,
        first_name: "Courier".to_string(),
        last_name: format!("{telegram_id}"),
        phone: format!("+99890{telegram_id:07}"),
        region: region.to_string(),
        status: CourierStatus::Active,
        total_orders: 0,
        completed_orders: 0,
        cancelled_orders: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    state.couriers.insert(courier.id, courier.clone());
    courier
}
