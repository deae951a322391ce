//! Dispatch loop: the single background context that owns the messaging
//! client.
//!
//! Request handlers never touch [`BotApi`] directly; they submit a [`Job`]
//! over the state's channel and block on the per-job reply with a timeout.
//! [`run_dispatch_loop`] is spawned exactly once at process start — one loop
//! per process is the contract, enforced by construction in `main` rather
//! than by a global.
//!
//! Each popped job runs in its own task so a paced fan-out never stalls
//! webhook processing. Submissions from one caller stay ordered because the
//! caller blocks on the reply before submitting again; ordering across
//! different conversations is not guaranteed. A caller that times out does
//! NOT cancel the job — it keeps the shared client busy until it finishes,
//! which is the accepted trade-off under sustained timeouts.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

use crate::bot::api::Update;
use crate::bot::client::BotApi;
use crate::bot::handlers;
use crate::engine::notify;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug)]
pub enum JobKind {
    /// One inbound provider event, routed through the bot handlers.
    ProcessUpdate(Box<Update>),
    /// Fan out a newly created order to its region's couriers.
    BroadcastOrder(String),
}

impl JobKind {
    fn label(&self) -> &'static str {
        match self {
            JobKind::ProcessUpdate(_) => "process_update",
            JobKind::BroadcastOrder(_) => "broadcast_order",
        }
    }
}

pub struct Job {
    pub kind: JobKind,
    pub reply: oneshot::Sender<Result<(), AppError>>,
}

/// Submits a job and waits up to `wait` for its result.
///
/// On timeout the job is left running to completion and the caller gets
/// [`AppError::Timeout`], which it should surface as retryable.
pub async fn submit(state: &AppState, kind: JobKind, wait: Duration) -> Result<(), AppError> {
    let (reply_tx, reply_rx) = oneshot::channel();

    state
        .job_tx
        .send(Job {
            kind,
            reply: reply_tx,
        })
        .await
        .map_err(|err| AppError::Internal(format!("dispatch queue send failed: {err}")))?;
    state.metrics.dispatch_queue_depth.inc();

    match timeout(wait, reply_rx).await {
        Err(_elapsed) => Err(AppError::Timeout),
        Ok(Err(_recv)) => Err(AppError::Internal("dispatch job dropped its reply".to_string())),
        Ok(Ok(result)) => result,
    }
}

pub async fn run_dispatch_loop(
    state: Arc<AppState>,
    bot: Arc<dyn BotApi>,
    mut job_rx: mpsc::Receiver<Job>,
) {
    info!("dispatch loop started");

    while let Some(job) = job_rx.recv().await {
        state.metrics.dispatch_queue_depth.dec();

        let state = state.clone();
        let bot = bot.clone();
        tokio::spawn(async move {
            let kind = job.kind.label();
            let start = Instant::now();

            let result = execute(&state, bot.as_ref(), job.kind).await;

            state
                .metrics
                .job_latency_seconds
                .with_label_values(&[kind])
                .observe(start.elapsed().as_secs_f64());
            let outcome = if result.is_ok() { "success" } else { "error" };
            state
                .metrics
                .jobs_total
                .with_label_values(&[kind, outcome])
                .inc();

            if let Err(err) = &result {
                error!(error = %err, kind, "dispatch job failed");
            }

            // the caller may have timed out and dropped its receiver
            if job.reply.send(result).is_err() {
                debug!(kind, "dispatch job finished after caller gave up");
            }
        });
    }

    warn!("dispatch loop stopped: job channel closed");
}

async fn execute(state: &AppState, bot: &dyn BotApi, kind: JobKind) -> Result<(), AppError> {
    match kind {
        JobKind::ProcessUpdate(update) => handlers::process_update(state, bot, *update).await,
        JobKind::BroadcastOrder(order_id) => notify::broadcast_order(state, bot, &order_id).await,
    }
}
