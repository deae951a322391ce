//! Telegram Bot API wire types: the inbound update shape, the reply-markup
//! payloads, and the keyboards the bot attaches to its messages.
//!
//! Only the fields this service reads are modelled; everything else in the
//! provider payload is ignored by serde.

use serde::{Deserialize, Serialize};

use crate::models::order::OrderStatus;
use crate::region;

// ---- inbound -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<Contact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Tagged view of an update, so handler routing is one explicit match
/// instead of filter chains.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Command {
        chat_id: i64,
        from: User,
        name: String,
        arg: Option<String>,
    },
    Text {
        chat_id: i64,
        from: User,
        text: String,
    },
    Contact {
        chat_id: i64,
        from: User,
        phone: String,
    },
    Callback {
        callback_id: String,
        chat_id: i64,
        message_id: Option<i64>,
        from: User,
        data: String,
    },
}

impl InboundEvent {
    /// Classifies an update. Returns `None` for shapes this bot does not
    /// handle (channel posts, media-only messages, empty callbacks).
    pub fn from_update(update: Update) -> Option<Self> {
        if let Some(callback) = update.callback_query {
            let data = callback.data?;
            let (chat_id, message_id) = match &callback.message {
                Some(message) => (message.chat.id, Some(message.message_id)),
                None => (callback.from.id, None),
            };
            return Some(InboundEvent::Callback {
                callback_id: callback.id,
                chat_id,
                message_id,
                from: callback.from,
                data,
            });
        }

        let message = update.message?;
        let from = message.from?;
        let chat_id = message.chat.id;

        if let Some(contact) = message.contact {
            return Some(InboundEvent::Contact {
                chat_id,
                from,
                phone: contact.phone_number,
            });
        }

        let text = message.text?;
        if let Some(command) = text.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            let name = parts.next()?.to_string();
            let arg = parts.next().map(str::to_string);
            return Some(InboundEvent::Command {
                chat_id,
                from,
                name,
                arg,
            });
        }

        Some(InboundEvent::Text {
            chat_id,
            from,
            text,
        })
    }
}

/// Opaque callback tokens carried by the inline buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Accept(String),
    Reject(String),
    Status(String, OrderStatus),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, ':');
        match (parts.next()?, parts.next(), parts.next()) {
            ("accept", Some(order_id), None) => Some(CallbackAction::Accept(order_id.to_string())),
            ("reject", Some(order_id), None) => Some(CallbackAction::Reject(order_id.to_string())),
            ("status", Some(order_id), Some(target)) => Some(CallbackAction::Status(
                order_id.to_string(),
                OrderStatus::parse(target)?,
            )),
            _ => None,
        }
    }
}

// ---- outbound ----------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_contact: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

impl ReplyMarkup {
    pub fn remove_keyboard() -> Self {
        ReplyMarkup::Remove(ReplyKeyboardRemove {
            remove_keyboard: true,
        })
    }
}

fn text_button(text: &str) -> KeyboardButton {
    KeyboardButton {
        text: text.to_string(),
        request_contact: None,
    }
}

pub const MENU_MY_ORDERS: &str = "My orders";
pub const MENU_MY_PROFILE: &str = "My profile";

pub fn main_menu_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: vec![
            vec![text_button(MENU_MY_ORDERS)],
            vec![text_button(MENU_MY_PROFILE)],
        ],
        resize_keyboard: true,
        one_time_keyboard: false,
    })
}

pub fn phone_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard: vec![vec![KeyboardButton {
            text: "Share phone number".to_string(),
            request_contact: Some(true),
        }]],
        resize_keyboard: true,
        one_time_keyboard: true,
    })
}

pub fn region_keyboard() -> ReplyMarkup {
    let keyboard = region::REGIONS
        .chunks(2)
        .map(|pair| pair.iter().map(|(_, name)| text_button(name)).collect())
        .collect();

    ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
        keyboard,
        resize_keyboard: true,
        one_time_keyboard: true,
    })
}

/// Accept/reject affordance attached to the fan-out notification.
pub fn order_action_keyboard(order_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton {
                text: "Accept".to_string(),
                callback_data: format!("accept:{order_id}"),
            },
            InlineKeyboardButton {
                text: "Reject".to_string(),
                callback_data: format!("reject:{order_id}"),
            },
        ]],
    }
}

/// Next-step affordance for an order the courier already owns; `None` once
/// the order is in a state the courier cannot advance.
pub fn order_status_keyboard(order_id: &str, status: OrderStatus) -> Option<InlineKeyboardMarkup> {
    let button = match status {
        OrderStatus::Accepted => InlineKeyboardButton {
            text: "On the way".to_string(),
            callback_data: format!("status:{order_id}:delivering"),
        },
        OrderStatus::Delivering => InlineKeyboardButton {
            text: "Delivered".to_string(),
            callback_data: format!("status:{order_id}:delivered"),
        },
        _ => return None,
    };

    Some(InlineKeyboardMarkup {
        inline_keyboard: vec![vec![button]],
    })
}
