//! Notification fan-out: one new order broadcast to every active courier in
//! its region.
//!
//! Runs on the dispatch loop. Per-recipient failures are tolerated; losing
//! the whole pass (order vanished) is the only abort. Nothing is persisted
//! about who was notified, so a crash mid-pass loses only undelivered
//! notifications.

use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::bot::api::{order_action_keyboard, ReplyMarkup};
use crate::bot::client::BotApi;
use crate::error::AppError;
use crate::models::courier::CourierStatus;
use crate::models::order::Order;
use crate::region;
use crate::state::AppState;

pub async fn broadcast_order(
    state: &AppState,
    bot: &dyn BotApi,
    order_id: &str,
) -> Result<(), AppError> {
    let order = state
        .orders
        .get(order_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

    let code = region::resolve(&order.region);

    let recipients: Vec<(i64, String)> = state
        .couriers
        .iter()
        .filter_map(|entry| {
            let courier = entry.value();
            let eligible = courier.status == CourierStatus::Active && courier.region == code;
            match (eligible, courier.telegram_id) {
                (true, Some(chat_id)) => Some((chat_id, courier.full_name())),
                _ => None,
            }
        })
        .collect();

    info!(
        order_id = %order.order_id,
        region = %order.region,
        code,
        couriers = recipients.len(),
        "broadcasting new order"
    );

    if recipients.is_empty() {
        warn!(order_id = %order.order_id, code, "no active couriers in region");
        return Ok(());
    }

    let text = format_order_message(&order);
    let pace = Duration::from_millis(state.config.send_pace_ms);
    let mut sent = 0usize;

    for (chat_id, name) in &recipients {
        let keyboard = ReplyMarkup::Inline(order_action_keyboard(&order.order_id));
        match bot.send_message(*chat_id, &text, Some(keyboard)).await {
            Ok(()) => {
                sent += 1;
                state
                    .metrics
                    .notifications_sent_total
                    .with_label_values(&["ok"])
                    .inc();
            }
            Err(err) => {
                state
                    .metrics
                    .notifications_sent_total
                    .with_label_values(&["error"])
                    .inc();
                warn!(error = %err, courier = %name, "failed to notify courier");
            }
        }

        // upstream rate limit
        sleep(pace).await;
    }

    info!(
        order_id = %order.order_id,
        sent,
        total = recipients.len(),
        "broadcast finished"
    );

    Ok(())
}

pub fn format_order_message(order: &Order) -> String {
    format!(
        "New order!\n\n\
         ID: {}\n\
         Customer: {}\n\
         Phone: {}\n\
         Address: {}\n\
         Total: {} UZS\n\
         Payment: {}",
        order.order_id,
        order.customer_name,
        order.phone,
        order.address,
        order.total_price,
        order.payment_method.display(),
    )
}
