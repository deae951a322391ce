//! Courier onboarding dialog.
//!
//! A linear four-step form keyed by chat id: first name, last name, phone,
//! region. Each state variant carries everything collected so far, so an
//! abandoned session holds no partial courier record. Token validity is
//! checked on entry AND re-checked at the final step — the flow collects as
//! much as possible before failing on a token that expired mid-dialog.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bot::api::{
    main_menu_keyboard, phone_keyboard, region_keyboard, ReplyMarkup, User,
};
use crate::bot::client::BotApi;
use crate::error::AppError;
use crate::models::courier::{Courier, CourierStatus};
use crate::region;
use crate::state::AppState;

const MIN_NAME_LEN: usize = 2;

/// Per-chat dialog state. Absence from the session store means no dialog.
#[derive(Debug, Clone)]
pub enum Registration {
    AwaitingFirstName {
        token: String,
        telegram_id: i64,
        username: Option<String>,
    },
    AwaitingLastName {
        token: String,
        telegram_id: i64,
        username: Option<String>,
        first_name: String,
    },
    AwaitingPhone {
        token: String,
        telegram_id: i64,
        username: Option<String>,
        first_name: String,
        last_name: String,
    },
    AwaitingRegion {
        token: String,
        telegram_id: i64,
        username: Option<String>,
        first_name: String,
        last_name: String,
        phone: String,
    },
}

/// One input into the dialog: typed text or a shared contact.
#[derive(Debug, Clone)]
pub enum DialogInput {
    Text(String),
    Contact(String),
}

/// Handles `/start [token]`.
pub async fn start(
    state: &AppState,
    bot: &dyn BotApi,
    chat_id: i64,
    from: &User,
    token_arg: Option<String>,
) -> Result<(), AppError> {
    if let Some(courier) = state.courier_by_telegram(from.id) {
        state.sessions.remove(&chat_id);

        if courier.status != CourierStatus::Active {
            bot.send_message(
                chat_id,
                &format!(
                    "Your account is {}. Contact the administrator.",
                    courier.status.display()
                ),
                None,
            )
            .await?;
            return Ok(());
        }

        bot.send_message(
            chat_id,
            &format!(
                "Welcome back, {}!\n\nRegion: {}\nPhone: {}",
                courier.full_name(),
                region::display_name(&courier.region),
                courier.phone
            ),
            Some(main_menu_keyboard()),
        )
        .await?;
        return Ok(());
    }

    let Some(token_str) = token_arg else {
        bot.send_message(
            chat_id,
            "A registration token is required.\n\nUsage: /start <token>",
            None,
        )
        .await?;
        return Ok(());
    };

    let valid = match state.tokens.get(&token_str) {
        Some(token) => token.is_valid(),
        None => false,
    };
    if !valid {
        bot.send_message(chat_id, "Invalid, used or expired token.", None)
            .await?;
        return Ok(());
    }

    state.sessions.insert(
        chat_id,
        Registration::AwaitingFirstName {
            token: token_str,
            telegram_id: from.id,
            username: from.username.clone(),
        },
    );

    info!(chat_id, "registration started");

    bot.send_message(
        chat_id,
        "Token accepted!\n\nEnter your first name:",
        Some(ReplyMarkup::remove_keyboard()),
    )
    .await?;

    Ok(())
}

/// Handles `/cancel` (and the plain "cancel" text) from any dialog state.
pub async fn cancel(state: &AppState, bot: &dyn BotApi, chat_id: i64) -> Result<(), AppError> {
    if state.sessions.remove(&chat_id).is_none() {
        bot.send_message(chat_id, "Nothing to cancel.", None).await?;
        return Ok(());
    }

    bot.send_message(
        chat_id,
        "Registration cancelled.\n\nStart again with /start <token>",
        Some(ReplyMarkup::remove_keyboard()),
    )
    .await?;

    Ok(())
}

/// Feeds one input into the chat's dialog. Returns `true` when the input was
/// consumed by a session; `false` means no dialog is active for this chat.
pub async fn advance(
    state: &AppState,
    bot: &dyn BotApi,
    chat_id: i64,
    input: DialogInput,
) -> Result<bool, AppError> {
    let Some((_, session)) = state.sessions.remove(&chat_id) else {
        return Ok(false);
    };

    match (session, input) {
        (
            Registration::AwaitingFirstName {
                token,
                telegram_id,
                username,
            },
            DialogInput::Text(text),
        ) => {
            let first_name = text.trim().to_string();
            if first_name.chars().count() < MIN_NAME_LEN {
                state.sessions.insert(
                    chat_id,
                    Registration::AwaitingFirstName {
                        token,
                        telegram_id,
                        username,
                    },
                );
                bot.send_message(chat_id, "First name is too short. Try again:", None)
                    .await?;
                return Ok(true);
            }

            state.sessions.insert(
                chat_id,
                Registration::AwaitingLastName {
                    token,
                    telegram_id,
                    username,
                    first_name,
                },
            );
            bot.send_message(chat_id, "Enter your last name:", None).await?;
        }

        (
            Registration::AwaitingLastName {
                token,
                telegram_id,
                username,
                first_name,
            },
            DialogInput::Text(text),
        ) => {
            let last_name = text.trim().to_string();
            if last_name.chars().count() < MIN_NAME_LEN {
                state.sessions.insert(
                    chat_id,
                    Registration::AwaitingLastName {
                        token,
                        telegram_id,
                        username,
                        first_name,
                    },
                );
                bot.send_message(chat_id, "Last name is too short. Try again:", None)
                    .await?;
                return Ok(true);
            }

            state.sessions.insert(
                chat_id,
                Registration::AwaitingPhone {
                    token,
                    telegram_id,
                    username,
                    first_name,
                    last_name,
                },
            );
            bot.send_message(
                chat_id,
                "Send your phone number:",
                Some(phone_keyboard()),
            )
            .await?;
        }

        (
            Registration::AwaitingPhone {
                token,
                telegram_id,
                username,
                first_name,
                last_name,
            },
            input,
        ) => {
            let candidate = match &input {
                DialogInput::Contact(phone) => normalize_contact_phone(phone),
                DialogInput::Text(text) => match normalize_typed_phone(text.trim()) {
                    Some(phone) => phone,
                    None => {
                        state.sessions.insert(
                            chat_id,
                            Registration::AwaitingPhone {
                                token,
                                telegram_id,
                                username,
                                first_name,
                                last_name,
                            },
                        );
                        bot.send_message(
                            chat_id,
                            "Invalid format. Expected +998XXXXXXXXX",
                            None,
                        )
                        .await?;
                        return Ok(true);
                    }
                },
            };

            state.sessions.insert(
                chat_id,
                Registration::AwaitingRegion {
                    token,
                    telegram_id,
                    username,
                    first_name,
                    last_name,
                    phone: candidate,
                },
            );
            bot.send_message(chat_id, "Pick your region:", Some(region_keyboard()))
                .await?;
        }

        (
            Registration::AwaitingRegion {
                token,
                telegram_id,
                username,
                first_name,
                last_name,
                phone,
            },
            DialogInput::Text(text),
        ) => {
            let Some(code) = region::name_to_code(text.trim()) else {
                state.sessions.insert(
                    chat_id,
                    Registration::AwaitingRegion {
                        token,
                        telegram_id,
                        username,
                        first_name,
                        last_name,
                        phone,
                    },
                );
                bot.send_message(chat_id, "Pick a region from the keyboard:", None)
                    .await?;
                return Ok(true);
            };

            complete(
                state,
                bot,
                chat_id,
                token,
                Courier {
                    id: Uuid::new_v4(),
                    telegram_id: Some(telegram_id),
                    telegram_username: username,
                    first_name,
                    last_name,
                    phone,
                    region: code.to_string(),
                    status: CourierStatus::Active,
                    total_orders: 0,
                    completed_orders: 0,
                    cancelled_orders: 0,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            )
            .await?;
        }

        // a contact payload in a text step: restore the session, re-prompt
        (session, DialogInput::Contact(_)) => {
            state.sessions.insert(chat_id, session);
            bot.send_message(chat_id, "Please answer the question above.", None)
                .await?;
        }
    }

    Ok(true)
}

/// Final step: re-validate the token and create the courier atomically with
/// its consumption. The session has already been removed by `advance`, so a
/// failure here resets the flow to no-state.
async fn complete(
    state: &AppState,
    bot: &dyn BotApi,
    chat_id: i64,
    token_str: String,
    courier: Courier,
) -> Result<(), AppError> {
    if state.phone_taken(&courier.phone) {
        bot.send_message(
            chat_id,
            "This phone number is already registered. Contact the administrator.",
            Some(ReplyMarkup::remove_keyboard()),
        )
        .await?;
        return Ok(());
    }

    let created = {
        // token entry lock makes consumption atomic with courier creation
        match state.tokens.get_mut(&token_str) {
            Some(mut token) if token.is_valid() => {
                token.consume(courier.id);
                state.couriers.insert(courier.id, courier.clone());
                true
            }
            _ => false,
        }
    };

    if !created {
        warn!(chat_id, "token expired or used before registration completed");
        bot.send_message(
            chat_id,
            "Your token expired or was already used.\n\nStart again with a fresh token: /start <token>",
            Some(ReplyMarkup::remove_keyboard()),
        )
        .await?;
        return Ok(());
    }

    info!(
        courier_id = %courier.id,
        region = %courier.region,
        "courier registered"
    );

    bot.send_message(
        chat_id,
        &format!(
            "Congratulations, {}!\n\nRegion: {}\nPhone: {}\n\nYou will now receive notifications about new orders.",
            courier.first_name,
            region::display_name(&courier.region),
            courier.phone
        ),
        Some(main_menu_keyboard()),
    )
    .await?;

    Ok(())
}

fn normalize_contact_phone(phone: &str) -> String {
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{phone}")
    }
}

fn normalize_typed_phone(text: &str) -> Option<String> {
    if text.starts_with('+') {
        Some(text.to_string())
    } else if text.starts_with("998") {
        Some(format!("+{text}"))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::bot::api::User;
    use crate::bot::client::testing::RecordingBot;
    use crate::config::Config;
    use crate::models::token::RegistrationToken;
    use crate::state::AppState;

    use super::{advance, cancel, start, DialogInput};

    const CHAT: i64 = 777;

    fn test_state() -> Arc<AppState> {
        let (state, _job_rx) = AppState::new(Config::default());
        Arc::new(state)
    }

    fn user() -> User {
        User {
            id: CHAT,
            username: Some("bekzod".to_string()),
        }
    }

    fn seed_token(state: &AppState) -> String {
        let token = RegistrationToken::generate(Some("admin".to_string()));
        let key = token.token.clone();
        state.tokens.insert(key.clone(), token);
        key
    }

    async fn text(state: &AppState, bot: &RecordingBot, input: &str) {
        advance(state, bot, CHAT, DialogInput::Text(input.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn full_flow_creates_an_active_courier_and_consumes_the_token() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token.clone()))
            .await
            .unwrap();
        text(&state, &bot, "Bekzod").await;
        text(&state, &bot, "Rahimov").await;
        text(&state, &bot, "+998901234567").await;
        text(&state, &bot, "Samarqand").await;

        let courier = state.courier_by_telegram(CHAT).expect("courier created");
        assert_eq!(courier.first_name, "Bekzod");
        assert_eq!(courier.region, "samarkand");
        assert_eq!(courier.phone, "+998901234567");

        let stored = state.tokens.get(&token).unwrap();
        assert!(stored.is_used);
        assert_eq!(stored.used_by, Some(courier.id));

        assert!(!state.sessions.contains_key(&CHAT));
        let last = bot.last_sent_to(CHAT).unwrap();
        assert!(last.contains("Congratulations"));
    }

    #[tokio::test]
    async fn short_name_reprompts_without_losing_state() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token)).await.unwrap();
        text(&state, &bot, "B").await;

        assert!(bot.last_sent_to(CHAT).unwrap().contains("too short"));
        assert!(state.sessions.contains_key(&CHAT));

        text(&state, &bot, "Bekzod").await;
        assert!(bot.last_sent_to(CHAT).unwrap().contains("last name"));
    }

    #[tokio::test]
    async fn typed_phone_must_be_international_or_local_998() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token)).await.unwrap();
        text(&state, &bot, "Bekzod").await;
        text(&state, &bot, "Rahimov").await;

        text(&state, &bot, "12345").await;
        assert!(bot.last_sent_to(CHAT).unwrap().contains("Invalid format"));

        text(&state, &bot, "998901234567").await;
        assert!(bot.last_sent_to(CHAT).unwrap().contains("region"));
    }

    #[tokio::test]
    async fn shared_contact_is_accepted_for_the_phone_step() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token)).await.unwrap();
        text(&state, &bot, "Bekzod").await;
        text(&state, &bot, "Rahimov").await;
        advance(
            &state,
            &bot,
            CHAT,
            DialogInput::Contact("998935550001".to_string()),
        )
        .await
        .unwrap();
        text(&state, &bot, "Buxoro").await;

        let courier = state.courier_by_telegram(CHAT).unwrap();
        assert_eq!(courier.phone, "+998935550001");
        assert_eq!(courier.region, "bukhara");
    }

    #[tokio::test]
    async fn cancel_discards_all_collected_data() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token)).await.unwrap();
        text(&state, &bot, "Bekzod").await;
        cancel(&state, &bot, CHAT).await.unwrap();

        assert!(!state.sessions.contains_key(&CHAT));
        assert!(state.courier_by_telegram(CHAT).is_none());
        assert!(bot.last_sent_to(CHAT).unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn missing_or_unknown_token_rejected_at_entry() {
        let state = test_state();
        let bot = RecordingBot::default();

        start(&state, &bot, CHAT, &user(), None).await.unwrap();
        assert!(bot.last_sent_to(CHAT).unwrap().contains("token is required"));

        start(&state, &bot, CHAT, &user(), Some("NOPE".to_string()))
            .await
            .unwrap();
        assert!(bot
            .last_sent_to(CHAT)
            .unwrap()
            .contains("Invalid, used or expired"));
        assert!(!state.sessions.contains_key(&CHAT));
    }

    #[tokio::test]
    async fn token_expiring_mid_dialog_fails_the_final_step() {
        let state = test_state();
        let bot = RecordingBot::default();
        let token = seed_token(&state);

        start(&state, &bot, CHAT, &user(), Some(token.clone()))
            .await
            .unwrap();
        text(&state, &bot, "Bekzod").await;
        text(&state, &bot, "Rahimov").await;
        text(&state, &bot, "+998901234567").await;

        state.tokens.get_mut(&token).unwrap().expires_at = Utc::now() - Duration::minutes(1);

        text(&state, &bot, "Samarqand").await;

        // no courier was created and the flow reset to no-state
        assert!(state.courier_by_telegram(CHAT).is_none());
        assert!(!state.sessions.contains_key(&CHAT));
        assert!(bot.last_sent_to(CHAT).unwrap().contains("expired"));
        assert!(!state.tokens.get(&token).unwrap().is_used);
    }
}
