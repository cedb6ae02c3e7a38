//! Errors surfaced by the prediction service.

use predict_common::BackendKind;

use crate::backend::BackendError;
use crate::routing::RouterError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No configured backend passed its readiness probe.
    #[error("No prediction models are available")]
    NoModelsAvailable,

    /// A forced backend is not among the ready ones.
    #[error("Forced model {0} not available")]
    ModelUnavailable(BackendKind),

    #[error(transparent)]
    Routing(#[from] RouterError),

    #[error("Backend {backend} prediction failed: {source}")]
    BackendPredictionFailed {
        backend: BackendKind,
        #[source]
        source: BackendError,
    },
}

pub type Result<T> = std::result::Result<T, ServiceError>;
