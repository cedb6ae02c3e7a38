use std::sync::Mutex;

use async_trait::async_trait;
use predict_common::{PredictionEvent, PredictionOutcome};

use crate::sinks::{EventPublisher, PredictionStore, PublishError, StoreError};

/// Publisher that keeps every event it receives.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<PredictionEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PredictionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.event_type()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: PredictionEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Publisher whose bus is always down.
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _event: PredictionEvent) -> Result<(), PublishError> {
        Err(PublishError::Unavailable("bus down".to_string()))
    }
}

/// Store whose database is always down.
pub struct FailingStore;

#[async_trait]
impl PredictionStore for FailingStore {
    async fn save(
        &self,
        _outcome: &PredictionOutcome,
        _user_id: Option<&str>,
    ) -> Result<String, StoreError> {
        Err(StoreError::Database("disk full".to_string()))
    }

    async fn get(&self, _id: &str) -> Result<Option<PredictionOutcome>, StoreError> {
        Err(StoreError::Database("disk full".to_string()))
    }

    async fn list_for_user(
        &self,
        _user_id: &str,
        _limit: usize,
    ) -> Result<Vec<PredictionOutcome>, StoreError> {
        Err(StoreError::Database("disk full".to_string()))
    }
}
