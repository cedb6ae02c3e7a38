//! Match Prediction Common Types
//!
//! Shared types used by the routing layer and by prediction backends.

pub mod event;
pub mod matches;
pub mod prediction;

pub use event::{
    EventEnvelope, PredictionCompleted, PredictionEvent, PredictionRequested, PredictionSummary,
};
pub use matches::{MatchDetails, Odds};
pub use prediction::{
    BackendKind, PredictionOutcome, PredictionType, Probabilities, Winner, PROBABILITY_TOLERANCE,
};
