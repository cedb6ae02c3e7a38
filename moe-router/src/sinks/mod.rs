//! Best-effort side effects of a prediction.
//!
//! The prediction service publishes lifecycle events and persists finished
//! outcomes through these traits. Failures are reported back as errors and
//! the service logs and drops them.

mod broadcast;
mod sqlite;

pub use broadcast::BroadcastPublisher;
pub use sqlite::SqlitePredictionStore;

use async_trait::async_trait;
use predict_common::{PredictionEvent, PredictionOutcome};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event bus unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Failed to encode outcome: {0}")]
    Encoding(String),
}

/// Sink for prediction lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: PredictionEvent) -> Result<(), PublishError>;
}

/// Durable storage for finished predictions.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Persist an outcome and return its storage id.
    async fn save(
        &self,
        outcome: &PredictionOutcome,
        user_id: Option<&str>,
    ) -> Result<String, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<PredictionOutcome>, StoreError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<PredictionOutcome>, StoreError>;
}
