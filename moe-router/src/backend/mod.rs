//! Prediction backend abstraction layer.
//!
//! This module defines the `Predictor` trait that abstracts the prediction
//! backends (baseline linear, gradient boosted, ...) behind a common
//! interface. The models themselves live outside this crate.

mod odds;
mod registry;

pub use odds::OddsImpliedPredictor;
pub use registry::BackendRegistry;

use async_trait::async_trait;
use predict_common::{BackendKind, MatchDetails, PredictionOutcome, PredictionType};
use serde::Serialize;

/// Errors raised by a prediction backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Unsupported prediction type: {0}")]
    UnsupportedPredictionType(PredictionType),

    #[error("Backend not ready: {0}")]
    NotReady(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Static description of a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub name: String,
    pub version: String,
    pub supported_prediction_types: Vec<PredictionType>,
}

/// Primary trait for prediction backends.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Which backend slot this predictor fills.
    fn kind(&self) -> BackendKind;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn supported_prediction_types(&self) -> &[PredictionType];

    /// Whether the backend can take predictions right now.
    ///
    /// Queried before every prediction. Implementations should bound the
    /// time they spend answering.
    async fn is_ready(&self) -> Result<bool>;

    /// Predict the outcome of a match.
    async fn predict(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
    ) -> Result<PredictionOutcome>;

    fn supports(&self, prediction_type: PredictionType) -> bool {
        self.supported_prediction_types().contains(&prediction_type)
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: self.kind(),
            name: self.name().to_string(),
            version: self.version().to_string(),
            supported_prediction_types: self.supported_prediction_types().to_vec(),
        }
    }
}
