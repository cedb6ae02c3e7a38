//! Prediction lifecycle events.
//!
//! Events are JSON-encoded with an `event_type` tag:
//!
//! - `prediction.requested` - published before a backend is invoked
//! - `prediction.completed` - published once the outcome has been decorated
//!
//! Both kinds share an [`EventEnvelope`] whose `correlation_id` ties the
//! requested and completed events of one prediction together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BackendKind, MatchDetails, PredictionOutcome, PredictionType, Winner};

/// Service name stamped on every event.
pub const SOURCE_SERVICE: &str = "prediction-engine";

/// Event schema version.
pub const EVENT_VERSION: &str = "1.0";

/// User id recorded when the requester is unknown.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Fields common to all events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
    pub source_service: String,
    pub version: String,
}

impl EventEnvelope {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            correlation_id: correlation_id.into(),
            source_service: SOURCE_SERVICE.to_string(),
            version: EVENT_VERSION.to_string(),
        }
    }
}

/// Events published by the prediction service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum PredictionEvent {
    #[serde(rename = "prediction.requested")]
    Requested(PredictionRequested),
    #[serde(rename = "prediction.completed")]
    Completed(PredictionCompleted),
}

impl PredictionEvent {
    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            Self::Requested(e) => &e.envelope,
            Self::Completed(e) => &e.envelope,
        }
    }

    /// Dotted event type name, as used in the serialized tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Requested(_) => "prediction.requested",
            Self::Completed(_) => "prediction.completed",
        }
    }
}

/// A prediction was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequested {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub user_id: String,
    pub team_home: String,
    pub team_away: String,
    pub prediction_types: Vec<PredictionType>,
    /// Match day formatted as `YYYY-MM-DD`.
    pub match_date: String,
}

impl PredictionRequested {
    pub fn new(
        correlation_id: &str,
        user_id: Option<&str>,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
    ) -> Self {
        Self {
            envelope: EventEnvelope::new(correlation_id),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            team_home: match_details.team_home.clone(),
            team_away: match_details.team_away.clone(),
            prediction_types: vec![prediction_type],
            match_date: match_details.match_date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Short summary of one prediction inside a completed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    #[serde(rename = "type")]
    pub prediction_type: PredictionType,
    pub predicted_winner: Winner,
    pub confidence: f64,
    pub model: BackendKind,
}

/// A prediction finished successfully.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionCompleted {
    #[serde(flatten)]
    pub envelope: EventEnvelope,
    pub prediction_id: String,
    pub user_id: String,
    pub team_home: String,
    pub team_away: String,
    pub predictions: Vec<PredictionSummary>,
    pub processing_time_ms: f64,
}

impl PredictionCompleted {
    pub fn new(
        correlation_id: &str,
        user_id: Option<&str>,
        outcome: &PredictionOutcome,
        processing_time_ms: f64,
    ) -> Self {
        Self {
            envelope: EventEnvelope::new(correlation_id),
            prediction_id: outcome.prediction_id.clone(),
            user_id: user_id.unwrap_or(ANONYMOUS_USER).to_string(),
            team_home: outcome.match_details.team_home.clone(),
            team_away: outcome.match_details.team_away.clone(),
            predictions: vec![PredictionSummary {
                prediction_type: outcome.prediction_type,
                predicted_winner: outcome.predicted_winner,
                confidence: outcome.confidence,
                model: outcome.backend,
            }],
            processing_time_ms,
        }
    }
}
