//! Prediction backends and their outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::MatchDetails;

/// Allowed deviation of a probability sum from 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Kinds of prediction a backend can be asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    #[default]
    MatchWinner,
    MatchMargin,
    FirstTryScorer,
    TotalPoints,
}

impl PredictionType {
    pub const ALL: [PredictionType; 4] = [
        PredictionType::MatchWinner,
        PredictionType::MatchMargin,
        PredictionType::FirstTryScorer,
        PredictionType::TotalPoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MatchWinner => "match_winner",
            Self::MatchMargin => "match_margin",
            Self::FirstTryScorer => "first_try_scorer",
            Self::TotalPoints => "total_points",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Interchangeable prediction backends.
///
/// Variants are declared in tier order, highest first, so the derived
/// `Ord` and [`BackendKind::ALL`] both iterate strongest backend first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Policy trained with reinforcement learning.
    ReinforcementLearned,
    /// Stacked ensemble over the other backends.
    StackedEnsemble,
    /// Gradient-boosted trees.
    GradientBoosted,
    /// Sequence model over recent match history.
    SequenceModel,
    /// Baseline linear model.
    BaselineLinear,
}

impl BackendKind {
    /// All backend kinds, highest tier first.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::ReinforcementLearned,
        BackendKind::StackedEnsemble,
        BackendKind::GradientBoosted,
        BackendKind::SequenceModel,
        BackendKind::BaselineLinear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReinforcementLearned => "reinforcement_learned",
            Self::StackedEnsemble => "stacked_ensemble",
            Self::GradientBoosted => "gradient_boosted",
            Self::SequenceModel => "sequence_model",
            Self::BaselineLinear => "baseline_linear",
        }
    }

    /// Parse a backend kind from its snake_case name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s.to_lowercase())
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Match winner outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Home,
    Away,
    Draw,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Home => write!(f, "home"),
            Winner::Away => write!(f, "away"),
            Winner::Draw => write!(f, "draw"),
        }
    }
}

/// Per-category outcome probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub home: f64,
    pub away: f64,
    pub draw: f64,
}

impl Probabilities {
    /// Normalize raw non-negative weights so they sum to 1.
    ///
    /// Returns None if any weight is negative or not finite, or if all are zero.
    pub fn normalized(home: f64, away: f64, draw: f64) -> Option<Self> {
        let weights = [home, away, draw];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return None;
        }
        Some(Self {
            home: home / sum,
            away: away / sum,
            draw: draw / sum,
        })
    }

    pub fn sum(&self) -> f64 {
        self.home + self.away + self.draw
    }

    /// Largest single probability.
    pub fn max(&self) -> f64 {
        self.home.max(self.away).max(self.draw)
    }

    /// Most likely outcome. Ties go home, then away.
    pub fn winner(&self) -> Winner {
        if self.home >= self.away && self.home >= self.draw {
            Winner::Home
        } else if self.away >= self.draw {
            Winner::Away
        } else {
            Winner::Draw
        }
    }

    /// Non-negative and summing to 1 within [`PROBABILITY_TOLERANCE`].
    pub fn is_valid(&self) -> bool {
        [self.home, self.away, self.draw]
            .iter()
            .all(|p| p.is_finite() && *p >= 0.0)
            && (self.sum() - 1.0).abs() <= PROBABILITY_TOLERANCE
    }
}

/// Result of a single prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub prediction_id: String,
    pub backend: BackendKind,
    pub prediction_type: PredictionType,
    pub match_details: MatchDetails,
    pub predicted_winner: Winner,
    pub probabilities: Probabilities,
    /// Always the largest of `probabilities`.
    pub confidence: f64,
    #[serde(default)]
    pub predicted_margin: Option<f64>,
    #[serde(default)]
    pub predicted_total_points: Option<f64>,
    /// Free-form metadata; the router adds its routing details here.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub processing_time_ms: f64,
    pub created_at: DateTime<Utc>,
}

impl PredictionOutcome {
    /// Build an outcome whose winner and confidence follow from `probabilities`.
    pub fn new(
        backend: BackendKind,
        prediction_type: PredictionType,
        match_details: MatchDetails,
        probabilities: Probabilities,
    ) -> Self {
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            backend,
            prediction_type,
            match_details,
            predicted_winner: probabilities.winner(),
            confidence: probabilities.max(),
            probabilities,
            predicted_margin: None,
            predicted_total_points: None,
            metadata: Map::new(),
            processing_time_ms: 0.0,
            created_at: Utc::now(),
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.predicted_margin = Some(margin);
        self
    }

    pub fn with_processing_time_ms(mut self, ms: f64) -> Self {
        self.processing_time_ms = ms;
        self
    }

    /// Probabilities are valid and confidence equals their maximum.
    pub fn is_consistent(&self) -> bool {
        self.probabilities.is_valid()
            && (self.confidence - self.probabilities.max()).abs() <= PROBABILITY_TOLERANCE
    }
}
