//! In-process event publisher over a tokio broadcast channel.

use async_trait::async_trait;
use predict_common::PredictionEvent;
use tokio::sync::broadcast;

use super::{EventPublisher, PublishError};

/// Fans events out to every current subscriber.
///
/// Publishing with no subscribers is not an error; the event is dropped.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<PredictionEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PredictionEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: PredictionEvent) -> Result<(), PublishError> {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(event_type, receivers, "Published event");
            }
            Err(_) => {
                tracing::debug!(event_type, "No event subscribers, event dropped");
            }
        }
        Ok(())
    }
}
