//! Inbound event routing.
//!
//! One explicit match over event kind crossed with the caller's dialog
//! state. Contention outcomes (`AlreadyAssigned`, `InvalidTransition`) are
//! answered as alerts to the courier who lost the race and are not treated
//! as errors here.

use tracing::{debug, info};

use crate::bot::api::{
    order_status_keyboard, CallbackAction, InboundEvent, Update, User, MENU_MY_ORDERS,
    MENU_MY_PROFILE,
};
use crate::bot::client::BotApi;
use crate::bot::registration::{self, DialogInput};
use crate::engine::lifecycle;
use crate::engine::notify::format_order_message;
use crate::error::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::region;
use crate::state::AppState;

pub async fn process_update(
    state: &AppState,
    bot: &dyn BotApi,
    update: Update,
) -> Result<(), AppError> {
    let update_id = update.update_id;
    let Some(event) = InboundEvent::from_update(update) else {
        debug!(update_id, "update shape not handled");
        return Ok(());
    };

    match event {
        InboundEvent::Command {
            chat_id,
            from,
            name,
            arg,
        } => match name.as_str() {
            "start" => registration::start(state, bot, chat_id, &from, arg).await,
            "cancel" => registration::cancel(state, bot, chat_id).await,
            other => {
                debug!(update_id, command = other, "unknown command ignored");
                Ok(())
            }
        },

        InboundEvent::Text {
            chat_id,
            from,
            text,
        } => {
            if text.eq_ignore_ascii_case("cancel") {
                return registration::cancel(state, bot, chat_id).await;
            }

            let consumed =
                registration::advance(state, bot, chat_id, DialogInput::Text(text.clone())).await?;
            if consumed {
                return Ok(());
            }

            match text.as_str() {
                MENU_MY_ORDERS => show_my_orders(state, bot, chat_id, &from).await,
                MENU_MY_PROFILE => show_profile(state, bot, chat_id, &from).await,
                _ => {
                    debug!(update_id, chat_id, "text outside any dialog ignored");
                    Ok(())
                }
            }
        }

        InboundEvent::Contact {
            chat_id, phone, ..
        } => {
            let consumed =
                registration::advance(state, bot, chat_id, DialogInput::Contact(phone)).await?;
            if !consumed {
                debug!(update_id, chat_id, "contact outside any dialog ignored");
            }
            Ok(())
        }

        InboundEvent::Callback {
            callback_id,
            chat_id,
            message_id,
            from,
            data,
        } => {
            handle_callback(state, bot, &callback_id, chat_id, message_id, &from, &data).await
        }
    }
}

async fn handle_callback(
    state: &AppState,
    bot: &dyn BotApi,
    callback_id: &str,
    chat_id: i64,
    message_id: Option<i64>,
    from: &User,
    data: &str,
) -> Result<(), AppError> {
    let Some(action) = CallbackAction::parse(data) else {
        debug!(chat_id, data, "unknown callback payload");
        bot.answer_callback_query(callback_id, "Unknown action.", false)
            .await?;
        return Ok(());
    };

    match action {
        CallbackAction::Accept(order_id) => {
            let Some(courier) = state.courier_by_telegram(from.id) else {
                bot.answer_callback_query(callback_id, "You are not registered.", true)
                    .await?;
                return Ok(());
            };

            match lifecycle::accept(state, &order_id, &courier) {
                Ok(order) => {
                    let text = format!(
                        "Order accepted!\n\n{}",
                        format_order_message(&order)
                    );
                    show_or_edit(bot, chat_id, message_id, &text, &order).await?;
                    bot.answer_callback_query(callback_id, "Order accepted!", false)
                        .await?;
                }
                Err(AppError::AlreadyAssigned) => {
                    bot.answer_callback_query(
                        callback_id,
                        "This order was already taken by another courier.",
                        true,
                    )
                    .await?;
                }
                Err(AppError::NotFound(_)) => {
                    bot.answer_callback_query(callback_id, "Order not found.", true)
                        .await?;
                }
                Err(err) => return Err(err),
            }
            Ok(())
        }

        CallbackAction::Reject(order_id) => {
            info!(chat_id, order_id, "order dismissed by courier");
            bot.answer_callback_query(callback_id, "Order dismissed.", false)
                .await?;
            Ok(())
        }

        CallbackAction::Status(order_id, target) => {
            match lifecycle::advance(state, &order_id, target) {
                Ok(order) => {
                    let label = match order.status {
                        OrderStatus::Delivering => "On the way",
                        OrderStatus::Delivered => "Delivered",
                        other => other.as_str(),
                    };
                    let text = format!(
                        "{label}\n\nID: {}\nCustomer: {}\nTotal: {} UZS",
                        order.order_id, order.customer_name, order.total_price
                    );
                    show_or_edit(bot, chat_id, message_id, &text, &order).await?;
                    bot.answer_callback_query(
                        callback_id,
                        &format!("Status updated: {label}"),
                        false,
                    )
                    .await?;
                }
                Err(AppError::InvalidTransition { .. }) => {
                    bot.answer_callback_query(
                        callback_id,
                        "This order is no longer in that state.",
                        true,
                    )
                    .await?;
                }
                Err(AppError::NotFound(_)) => {
                    bot.answer_callback_query(callback_id, "Order not found.", true)
                        .await?;
                }
                Err(err) => return Err(err),
            }
            Ok(())
        }
    }
}

/// Edits the courier's notification in place when possible, falling back to
/// a fresh message when the edit fails or there is nothing to edit.
async fn show_or_edit(
    bot: &dyn BotApi,
    chat_id: i64,
    message_id: Option<i64>,
    text: &str,
    order: &Order,
) -> Result<(), AppError> {
    let keyboard = order_status_keyboard(&order.order_id, order.status);

    if let Some(message_id) = message_id {
        if bot
            .edit_message_text(chat_id, message_id, text, keyboard.clone())
            .await
            .is_ok()
        {
            return Ok(());
        }
    }

    bot.send_message(
        chat_id,
        text,
        keyboard.map(crate::bot::api::ReplyMarkup::Inline),
    )
    .await
}

async fn show_my_orders(
    state: &AppState,
    bot: &dyn BotApi,
    chat_id: i64,
    from: &User,
) -> Result<(), AppError> {
    let Some(courier) = state.courier_by_telegram(from.id) else {
        bot.send_message(chat_id, "You are not registered.", None).await?;
        return Ok(());
    };

    let mut active: Vec<Order> = state
        .orders
        .iter()
        .filter(|entry| {
            let order = entry.value();
            order.courier == Some(courier.id)
                && matches!(order.status, OrderStatus::Accepted | OrderStatus::Delivering)
        })
        .map(|entry| entry.value().clone())
        .collect();
    active.sort_by_key(|order| order.created_at);

    if active.is_empty() {
        bot.send_message(chat_id, "You have no active orders.", None)
            .await?;
        return Ok(());
    }

    for order in active {
        let status_label = match order.status {
            OrderStatus::Accepted => "accepted",
            _ => "on the way",
        };
        let text = format!(
            "Order {}\n\nCustomer: {}\nPhone: {}\nAddress: {}\nTotal: {} UZS\nStatus: {status_label}",
            order.order_id,
            order.customer_name,
            order.phone,
            order.address,
            order.total_price,
        );
        bot.send_message(
            chat_id,
            &text,
            order_status_keyboard(&order.order_id, order.status)
                .map(crate::bot::api::ReplyMarkup::Inline),
        )
        .await?;
    }

    Ok(())
}

async fn show_profile(
    state: &AppState,
    bot: &dyn BotApi,
    chat_id: i64,
    from: &User,
) -> Result<(), AppError> {
    let Some(courier) = state.courier_by_telegram(from.id) else {
        bot.send_message(chat_id, "You are not registered.", None).await?;
        return Ok(());
    };

    let text = format!(
        "Profile\n\nName: {}\nPhone: {}\nRegion: {}\nStatus: {}\n\nOrders total: {}\nDelivered: {}\nCancelled: {}\nRegistered: {}",
        courier.full_name(),
        courier.phone,
        region::display_name(&courier.region),
        courier.status.display(),
        courier.total_orders,
        courier.completed_orders,
        courier.cancelled_orders,
        courier.created_at.format("%d.%m.%Y"),
    );

    bot.send_message(chat_id, &text, None).await?;

    Ok(())
}
