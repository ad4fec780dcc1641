use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Domain events published after their transaction commits.
#[derive(Debug, Clone)]
pub enum AppEvent {
    PaymentVerified {
        payment_id: Uuid,
        order_id: Uuid,
        customer_email: String,
        amount: i64,
        transaction_id: String,
    },
}

/// In-process fan-out bus over a tokio broadcast channel.
///
/// Emission is fire-and-forget: a missing or slow consumer must never fail
/// or block the transaction that produced the event.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: AppEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Consumes settlement events and hands confirmation mail to the (external)
/// mailer. Here the interface contract ends at composing and logging the
/// message.
pub fn spawn_notification_dispatcher(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(AppEvent::PaymentVerified {
                    payment_id,
                    order_id,
                    customer_email,
                    amount,
                    transaction_id,
                }) => {
                    tracing::info!(
                        %payment_id,
                        %order_id,
                        recipient = %customer_email,
                        amount,
                        transaction_id = %transaction_id,
                        "payment confirmation email queued"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification dispatcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::PaymentVerified {
            payment_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            customer_email: "user@example.com".into(),
            amount: 2000,
            transaction_id: "42".into(),
        });

        match rx.recv().await {
            Ok(AppEvent::PaymentVerified { amount, .. }) => assert_eq!(amount, 2000),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.emit(AppEvent::PaymentVerified {
            payment_id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            customer_email: "user@example.com".into(),
            amount: 1,
            transaction_id: "1".into(),
        });
    }
}
