use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the checkout and settlement services.
#[derive(Debug, Clone)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        account_number: String,
    },
    OrderPaid {
        order_id: Uuid,
        basket_id: String,
    },
    /// A settlement that could not be applied (amount mismatch, lost basket
    /// race). These need manual review; money moved on the provider side.
    SettlementRejected {
        provider_reference: String,
        reason: String,
    },
}

/// Cheap-to-clone sender handle shared across services.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Best-effort send; event loss is logged, never fails the transaction
    /// that produced it.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.tx.send(event).await {
            warn!(error = %e, "failed to enqueue domain event");
        }
    }
}

/// Background consumer. Settlement rejections are logged at warn so they are
/// distinguishable from the success path in log search.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::SettlementRejected {
                provider_reference,
                reason,
            } => {
                warn!(%provider_reference, %reason, "settlement rejected; manual review required");
            }
            other => {
                info!(event = ?other, "domain event");
            }
        }
    }
}
