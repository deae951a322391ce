use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::bot::registration::Registration;
use crate::config::Config;
use crate::engine::dispatch::Job;
use crate::models::courier::Courier;
use crate::models::order::{Order, OrderEvent};
use crate::models::product::Product;
use crate::models::token::RegistrationToken;
use crate::observability::metrics::Metrics;

/// Shared service state, constructed once at startup and passed by `Arc`.
///
/// The DashMap stores are the persistence collaborator: entry-level locking
/// is what makes `accept` a true compare-and-set. `job_tx` feeds the single
/// dispatch loop; no other component talks to the messaging client.
pub struct AppState {
    pub couriers: DashMap<Uuid, Courier>,
    pub orders: DashMap<String, Order>,
    pub products: DashMap<Uuid, Product>,
    pub tokens: DashMap<String, RegistrationToken>,
    pub sessions: DashMap<i64, Registration>,
    pub job_tx: mpsc::Sender<Job>,
    pub order_events_tx: broadcast::Sender<OrderEvent>,
    pub config: Config,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Job>) {
        let (job_tx, job_rx) = mpsc::channel(config.dispatch_queue_size);
        let (order_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        (
            Self {
                couriers: DashMap::new(),
                orders: DashMap::new(),
                products: DashMap::new(),
                tokens: DashMap::new(),
                sessions: DashMap::new(),
                job_tx,
                order_events_tx,
                config,
                metrics: Metrics::new(),
            },
            job_rx,
        )
    }

    pub fn courier_by_telegram(&self, telegram_id: i64) -> Option<Courier> {
        self.couriers
            .iter()
            .find(|entry| entry.value().telegram_id == Some(telegram_id))
            .map(|entry| entry.value().clone())
    }

    pub fn phone_taken(&self, phone: &str) -> bool {
        self.couriers.iter().any(|entry| entry.value().phone == phone)
    }

    pub fn publish_event(&self, order: &Order) {
        let _ = self.order_events_tx.send(OrderEvent {
            order_id: order.order_id.clone(),
            status: order.status,
            courier: order.courier,
            occurred_at: Utc::now(),
        });
    }
}
