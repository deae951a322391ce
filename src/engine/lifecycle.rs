//! Order lifecycle machine.
//!
//! Legal transitions: pending -> accepted -> delivering -> delivered, with
//! cancellation reachable from pending and accepted. Every mutation happens
//! under the order's store entry lock and the updated order is cloned out
//! before any other store is touched, so no lock is ever held across an
//! await and concurrent accepts on one order id resolve to exactly one
//! winner.

use chrono::Utc;
use tracing::info;

use crate::error::AppError;
use crate::models::courier::Courier;
use crate::models::order::{Order, OrderStatus};
use crate::state::AppState;

/// Assigns the order to `courier` iff it is still pending.
///
/// The losing side of a race gets `AlreadyAssigned` and no mutation; that is
/// an expected contention outcome, not an error condition.
pub fn accept(state: &AppState, order_id: &str, courier: &Courier) -> Result<Order, AppError> {
    let updated = {
        let mut entry = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        if entry.status != OrderStatus::Pending {
            state
                .metrics
                .accepts_total
                .with_label_values(&["already_assigned"])
                .inc();
            return Err(AppError::AlreadyAssigned);
        }

        entry.status = OrderStatus::Accepted;
        entry.courier = Some(courier.id);
        entry.accepted_at = Some(Utc::now());
        entry.clone()
    };

    if let Some(mut entry) = state.couriers.get_mut(&courier.id) {
        entry.total_orders += 1;
        entry.updated_at = Utc::now();
    }

    state
        .metrics
        .accepts_total
        .with_label_values(&["accepted"])
        .inc();
    state.publish_event(&updated);

    info!(
        order_id = %updated.order_id,
        courier_id = %courier.id,
        "order accepted"
    );

    Ok(updated)
}

/// Moves the order along the courier-visible path: accepted -> delivering or
/// delivering -> delivered. Each transition stamps its timestamp exactly
/// once; anything else is `InvalidTransition`.
pub fn advance(state: &AppState, order_id: &str, target: OrderStatus) -> Result<Order, AppError> {
    let updated = {
        let mut entry = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        match (entry.status, target) {
            (OrderStatus::Accepted, OrderStatus::Delivering) => {
                entry.status = OrderStatus::Delivering;
                entry.delivering_at = Some(Utc::now());
            }
            (OrderStatus::Delivering, OrderStatus::Delivered) => {
                entry.status = OrderStatus::Delivered;
                entry.delivered_at = Some(Utc::now());
            }
            (from, to) => return Err(AppError::InvalidTransition { from, to }),
        }

        entry.clone()
    };

    if updated.status == OrderStatus::Delivered {
        if let Some(courier_id) = updated.courier {
            if let Some(mut entry) = state.couriers.get_mut(&courier_id) {
                entry.completed_orders += 1;
                entry.updated_at = Utc::now();
            }
        }
    }

    state.publish_event(&updated);

    info!(order_id = %updated.order_id, status = %updated.status, "order advanced");

    Ok(updated)
}

/// Administrative cancellation, legal from pending or accepted.
pub fn cancel(state: &AppState, order_id: &str) -> Result<Order, AppError> {
    let updated = {
        let mut entry = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;

        match entry.status {
            OrderStatus::Pending | OrderStatus::Accepted => {
                entry.status = OrderStatus::Cancelled;
                entry.cancelled_at = Some(Utc::now());
            }
            from => {
                return Err(AppError::InvalidTransition {
                    from,
                    to: OrderStatus::Cancelled,
                })
            }
        }

        entry.clone()
    };

    if let Some(courier_id) = updated.courier {
        if let Some(mut entry) = state.couriers.get_mut(&courier_id) {
            entry.cancelled_orders += 1;
            entry.updated_at = Utc::now();
        }
    }

    state.publish_event(&updated);

    info!(order_id = %updated.order_id, "order cancelled");

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::courier::{Courier, CourierStatus};
    use crate::models::order::{Order, OrderStatus, PaymentMethod};
    use crate::state::AppState;

    use super::{accept, advance, cancel};

    fn test_state() -> Arc<AppState> {
        let (state, _job_rx) = AppState::new(Config::default());
        Arc::new(state)
    }

    fn seed_courier(state: &AppState, telegram_id: i64) -> Courier {
        let courier = Courier {
            id: Uuid::new_v4(),
            telegram_id: Some(telegram_id),
            telegram_username: None,
            first_name: "Test".to_string(),
            last_name: format!("Courier{telegram_id}"),
            phone: format!("+9989000000{telegram_id}"),
            region: "samarkand".to_string(),
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

    fn seed_order(state: &AppState) -> String {
        let order = Order {
            order_id: Order::generate_id(),
            customer_name: "Alisher Usmonov".to_string(),
            phone: "998901234567".to_string(),
            region: "Samarqand".to_string(),
            district: "Registon".to_string(),
            address: "12 Registon street".to_string(),
            items: Vec::new(),
            total_price: Decimal::from(125_000),
            payment_method: PaymentMethod::Cash,
            comments: None,
            status: OrderStatus::Pending,
            courier: None,
            created_at: Utc::now(),
            accepted_at: None,
            delivering_at: None,
            delivered_at: None,
            cancelled_at: None,
        };
        let id = order.order_id.clone();
        state.orders.insert(id.clone(), order);
        id
    }

    #[test]
    fn accept_assigns_courier_and_stamps_time() {
        let state = test_state();
        let courier = seed_courier(&state, 1);
        let order_id = seed_order(&state);

        let order = accept(&state, &order_id, &courier).unwrap();

        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.courier, Some(courier.id));
        assert!(order.accepted_at.is_some());
        assert_eq!(
            state.couriers.get(&courier.id).unwrap().total_orders,
            1
        );
    }

    #[test]
    fn second_accept_fails_without_mutation() {
        let state = test_state();
        let first = seed_courier(&state, 1);
        let second = seed_courier(&state, 2);
        let order_id = seed_order(&state);

        accept(&state, &order_id, &first).unwrap();
        let err = accept(&state, &order_id, &second).unwrap_err();

        assert!(matches!(err, AppError::AlreadyAssigned));
        let order = state.orders.get(&order_id).unwrap().clone();
        assert_eq!(order.courier, Some(first.id));
        assert_eq!(state.couriers.get(&second.id).unwrap().total_orders, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let state = test_state();
        let order_id = seed_order(&state);
        let couriers: Vec<_> = (0..8).map(|i| seed_courier(&state, i)).collect();

        let mut tasks = Vec::new();
        for courier in couriers {
            let state = state.clone();
            let order_id = order_id.clone();
            tasks.push(tokio::spawn(async move {
                accept(&state, &order_id, &courier)
            }));
        }

        let mut winners = 0;
        let mut losers = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::AlreadyAssigned) => losers += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(losers, 7);

        let order = state.orders.get(&order_id).unwrap().clone();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert!(order.courier.is_some());
    }

    #[test]
    fn advance_follows_the_legal_path_only() {
        let state = test_state();
        let courier = seed_courier(&state, 1);
        let order_id = seed_order(&state);

        // pending -> delivering skips a state
        let err = advance(&state, &order_id, OrderStatus::Delivering).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));

        accept(&state, &order_id, &courier).unwrap();

        let order = advance(&state, &order_id, OrderStatus::Delivering).unwrap();
        assert_eq!(order.status, OrderStatus::Delivering);
        let first_stamp = order.delivering_at.unwrap();

        // replay of the same advance is rejected and the stamp survives
        let err = advance(&state, &order_id, OrderStatus::Delivering).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
        assert_eq!(
            state.orders.get(&order_id).unwrap().delivering_at,
            Some(first_stamp)
        );

        let order = advance(&state, &order_id, OrderStatus::Delivered).unwrap();
        assert!(order.delivered_at.is_some());
        assert_eq!(
            state.couriers.get(&courier.id).unwrap().completed_orders,
            1
        );
    }

    #[test]
    fn advance_cannot_move_backwards() {
        let state = test_state();
        let courier = seed_courier(&state, 1);
        let order_id = seed_order(&state);

        accept(&state, &order_id, &courier).unwrap();
        advance(&state, &order_id, OrderStatus::Delivering).unwrap();

        let err = advance(&state, &order_id, OrderStatus::Pending).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn advance_unknown_order_is_not_found() {
        let state = test_state();
        let err = advance(&state, "ZZZZZZZZ", OrderStatus::Delivering).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn cancel_from_pending_and_accepted_only() {
        let state = test_state();
        let courier = seed_courier(&state, 1);

        let pending = seed_order(&state);
        let order = cancel(&state, &pending).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.cancelled_at.is_some());

        let accepted = seed_order(&state);
        accept(&state, &accepted, &courier).unwrap();
        cancel(&state, &accepted).unwrap();
        assert_eq!(state.couriers.get(&courier.id).unwrap().cancelled_orders, 1);

        let delivered = seed_order(&state);
        accept(&state, &delivered, &courier).unwrap();
        advance(&state, &delivered, OrderStatus::Delivering).unwrap();
        advance(&state, &delivered, OrderStatus::Delivered).unwrap();
        let err = cancel(&state, &delivered).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }
}
