use crate::core::ReorganizationPlan;
use crate::error::AppError;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One message on a watch session's delivery channel
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanUpdate {
    Plan {
        sequence: u64,
        plan: ReorganizationPlan,
    },
    /// Plan computation failed; the session keeps watching
    Error { sequence: u64, error: AppError },
    /// Last message of a session that stopped on its own
    Terminated { sequence: u64, error: AppError },
}

impl PlanUpdate {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Plan { sequence, .. }
            | Self::Error { sequence, .. }
            | Self::Terminated { sequence, .. } => *sequence,
        }
    }

    pub fn plan(&self) -> Option<&ReorganizationPlan> {
        match self {
            Self::Plan { plan, .. } => Some(plan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The session was cancelled while waiting for room
    Cancelled,
    /// The consumer is gone
    Disconnected,
}

/// Producing half. Numbers messages in production order.
pub struct PlanSender {
    tx: mpsc::Sender<PlanUpdate>,
    next_sequence: u64,
}

/// Consuming half
pub struct PlanStream {
    rx: mpsc::Receiver<PlanUpdate>,
}

/// Bounded single-producer, single-consumer channel of plan updates
pub fn delivery_channel(capacity: usize) -> (PlanSender, PlanStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PlanSender {
            tx,
            next_sequence: 1,
        },
        PlanStream { rx },
    )
}

impl PlanSender {
    pub async fn send_plan(&mut self, plan: ReorganizationPlan, cancel: &CancellationToken) -> SendOutcome {
        let sequence = self.next_sequence;
        self.send(PlanUpdate::Plan { sequence, plan }, cancel).await
    }

    pub async fn send_error(&mut self, error: AppError, cancel: &CancellationToken) -> SendOutcome {
        let sequence = self.next_sequence;
        self.send(PlanUpdate::Error { sequence, error }, cancel).await
    }

    pub async fn send_terminated(&mut self, error: AppError, cancel: &CancellationToken) -> SendOutcome {
        let sequence = self.next_sequence;
        self.send(PlanUpdate::Terminated { sequence, error }, cancel)
            .await
    }

    /// Waits for room in the channel, giving up if `cancel` fires first
    async fn send(&mut self, update: PlanUpdate, cancel: &CancellationToken) -> SendOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => SendOutcome::Cancelled,
            sent = self.tx.send(update) => match sent {
                Ok(()) => {
                    self.next_sequence += 1;
                    SendOutcome::Delivered
                }
                Err(_) => SendOutcome::Disconnected,
            },
        }
    }
}

impl PlanStream {
    /// Next update, or `None` once the session has ended
    pub async fn recv(&mut self) -> Option<PlanUpdate> {
        self.rx.recv().await
    }
}

impl Stream for PlanStream {
    type Item = PlanUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
