//! Routing strategies.
//!
//! Each strategy picks one backend out of the candidate set and reports how
//! confident the routing layer is in that choice. Strategies never fail:
//! with nothing usable to go on they fall back to [`DEFAULT_BACKEND`] at
//! [`FALLBACK_CONFIDENCE`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use predict_common::BackendKind;
use serde::{Deserialize, Serialize};

use super::context::{RoutingContext, SeasonStage};
use super::performance::{PerformanceRecord, PerformanceTable, ScenarioTag};

/// Backend chosen when a strategy has nothing to score.
pub const DEFAULT_BACKEND: BackendKind = BackendKind::ReinforcementLearned;

/// Confidence reported alongside a fallback choice.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const SCENARIO_BONUS: f64 = 0.05;
const CALIBRATION_WEIGHT: f64 = 0.1;
const RECENCY_PENALTY_PER_DAY: f64 = 0.05;
const MAX_RECENCY_PENALTY: f64 = 0.2;

/// Strategy the router uses to pick a backend.
///
/// Forcing a specific backend is not a strategy; the prediction service
/// handles that before the router is consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Score backends on recent accuracy, scenario fit, calibration and staleness.
    #[default]
    PerformanceBased,
    /// First matching hand-written rule wins.
    RuleBased,
    /// Static per-backend weights, boosted for important matches.
    EnsembleWeighted,
}

impl RoutingStrategy {
    pub const ALL: [RoutingStrategy; 3] = [
        RoutingStrategy::PerformanceBased,
        RoutingStrategy::RuleBased,
        RoutingStrategy::EnsembleWeighted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerformanceBased => "performance_based",
            Self::RuleBased => "rule_based",
            Self::EnsembleWeighted => "ensemble_weighted",
        }
    }

    /// Pick a backend out of `candidates`.
    ///
    /// `performance` is only consulted by the performance-based strategy.
    pub fn route(
        &self,
        context: &RoutingContext,
        candidates: &[BackendKind],
        performance: &PerformanceTable,
        now: DateTime<Utc>,
    ) -> (BackendKind, f64) {
        let (backend, confidence) = match self {
            Self::PerformanceBased => performance_based(context, candidates, performance, now),
            Self::RuleBased => rule_based(context, candidates),
            Self::EnsembleWeighted => ensemble_weighted(context, candidates),
        };
        if !confidence.is_finite() {
            return (backend, FALLBACK_CONFIDENCE);
        }
        (backend, confidence.clamp(0.0, 1.0))
    }
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown routing strategy '{}'", s))
    }
}

/// Score every candidate that has a performance record; highest score wins.
///
/// Ties go to the candidate listed first. Candidates whose score is not a
/// finite number are skipped.
pub fn performance_based(
    context: &RoutingContext,
    candidates: &[BackendKind],
    performance: &PerformanceTable,
    now: DateTime<Utc>,
) -> (BackendKind, f64) {
    let scores: Vec<(BackendKind, f64)> = candidates
        .iter()
        .filter_map(|kind| {
            performance
                .get(kind)
                .map(|record| (*kind, performance_score(context, record, now)))
        })
        .filter(|(kind, score)| {
            if score.is_finite() {
                return true;
            }
            tracing::warn!(
                backend = %kind,
                score,
                "Skipping backend with non-finite performance score"
            );
            false
        })
        .collect();

    let mut best: Option<(BackendKind, f64)> = None;
    for &(kind, score) in &scores {
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((kind, score)),
        }
    }

    let Some((winner, winner_score)) = best else {
        return (DEFAULT_BACKEND, FALLBACK_CONFIDENCE);
    };

    let max_score = scores.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);
    let confidence = if max_score <= 0.0 { 1.0 } else { winner_score / max_score };

    tracing::debug!(
        backend = %winner,
        confidence,
        scores = ?scores,
        "Performance-based routing"
    );

    (winner, confidence)
}

/// Score of one backend for one match.
pub fn performance_score(
    context: &RoutingContext,
    record: &PerformanceRecord,
    now: DateTime<Utc>,
) -> f64 {
    record.recent_accuracy + scenario_bonus(context, record)
        + CALIBRATION_WEIGHT * record.confidence_calibration
        - recency_penalty(record.last_updated, now)
}

fn scenario_bonus(context: &RoutingContext, record: &PerformanceRecord) -> f64 {
    let mut bonus = 0.0;

    if context.rivalry_score > 0.7 && record.is_strong_in(ScenarioTag::RivalryMatches) {
        bonus += SCENARIO_BONUS;
    }

    if context.match_importance > 0.8 && record.is_strong_in(ScenarioTag::HighStakesGames) {
        bonus += SCENARIO_BONUS;
    }

    if context.season_stage.is_finals() {
        if record.is_strong_in(ScenarioTag::Finals) {
            bonus += SCENARIO_BONUS;
        } else if record.is_weak_in(ScenarioTag::Finals) {
            bonus -= SCENARIO_BONUS;
        }
    }

    if !context.data_availability.historical_matches
        && record.is_weak_in(ScenarioTag::DataSparseMatches)
    {
        bonus -= SCENARIO_BONUS;
    }

    bonus
}

fn recency_penalty(last_updated: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - last_updated).num_days().max(0) as f64;
    (RECENCY_PENALTY_PER_DAY * days).min(MAX_RECENCY_PENALTY)
}

/// Hand-written waterfall; the first rule whose backend is available wins.
pub fn rule_based(context: &RoutingContext, candidates: &[BackendKind]) -> (BackendKind, f64) {
    let has = |kind: BackendKind| candidates.contains(&kind);

    if (context.match_importance > 0.8 || context.rivalry_score > 0.7)
        && has(BackendKind::ReinforcementLearned)
    {
        return (BackendKind::ReinforcementLearned, 0.9);
    }

    if context.head_to_head_matches > 10
        && context.form_differential.abs() < 0.3
        && has(BackendKind::StackedEnsemble)
    {
        return (BackendKind::StackedEnsemble, 0.85);
    }

    if context.season_stage == SeasonStage::Mid
        && context.data_availability.all()
        && has(BackendKind::GradientBoosted)
    {
        return (BackendKind::GradientBoosted, 0.8);
    }

    if context.head_to_head_matches > 15 && has(BackendKind::SequenceModel) {
        return (BackendKind::SequenceModel, 0.75);
    }

    if has(BackendKind::BaselineLinear) {
        return (BackendKind::BaselineLinear, 0.7);
    }

    (
        candidates.first().copied().unwrap_or(DEFAULT_BACKEND),
        FALLBACK_CONFIDENCE,
    )
}

/// Static weight of each backend in the ensemble.
fn base_weight(kind: BackendKind) -> f64 {
    match kind {
        BackendKind::ReinforcementLearned => 0.35,
        BackendKind::StackedEnsemble => 0.25,
        BackendKind::GradientBoosted => 0.20,
        BackendKind::SequenceModel => 0.15,
        BackendKind::BaselineLinear => 0.05,
    }
}

/// Heaviest weighted candidate wins; its raw weight is the confidence.
pub fn ensemble_weighted(
    context: &RoutingContext,
    candidates: &[BackendKind],
) -> (BackendKind, f64) {
    let high_stakes = context.match_importance > 0.8;

    let mut best: Option<(BackendKind, f64)> = None;
    for &kind in candidates {
        let mut weight = base_weight(kind);
        if high_stakes {
            match kind {
                BackendKind::ReinforcementLearned => weight += 0.10,
                BackendKind::StackedEnsemble => weight += 0.05,
                _ => {}
            }
        }

        match best {
            Some((_, best_weight)) if best_weight >= weight => {}
            _ => best = Some((kind, weight)),
        }
    }

    best.unwrap_or((DEFAULT_BACKEND, FALLBACK_CONFIDENCE))
}
