use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after a committed engine mutation.
///
/// Delivery is best-effort: a full or closed channel is logged and dropped,
/// never surfaced as an operation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ReservationsCreated {
        order_id: Uuid,
        reservations: usize,
    },
    ReservationsReleased {
        order_id: Uuid,
        released: u64,
    },
    StockDeducted {
        order_id: Uuid,
        operations: usize,
    },
    ReservationsSwept {
        orders: u64,
        reservations: u64,
    },
    LowStock {
        warehouse_item_id: i64,
        quantity: i32,
        min_quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget send used after commit; failures are logged only.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!(error = %e, event = ?event, "Dropped domain event");
        }
    }
}

/// Creates a connected sender/receiver pair with a bounded buffer.
pub fn channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains events and logs them. Spawn as a background task:
/// `tokio::spawn(process_events(rx))`.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::ReservationsCreated {
                order_id,
                reservations,
            } => {
                info!(order_id = %order_id, reservations, "Reservations created");
            }
            Event::ReservationsReleased { order_id, released } => {
                info!(order_id = %order_id, released, "Reservations released");
            }
            Event::StockDeducted {
                order_id,
                operations,
            } => {
                info!(order_id = %order_id, operations, "Stock deducted for assembled order");
            }
            Event::ReservationsSwept {
                orders,
                reservations,
            } => {
                info!(orders, reservations, "Abandoned reservations swept");
            }
            Event::LowStock {
                warehouse_item_id,
                quantity,
                min_quantity,
            } => {
                warn!(
                    warehouse_item_id,
                    quantity, min_quantity, "Warehouse item below minimum stock"
                );
            }
        }
    }
}
