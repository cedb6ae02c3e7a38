//! Per-backend performance records read by the performance-based strategy.
//!
//! The registry is owned by whoever builds the router; nothing here is
//! global. Refreshing the numbers is an external concern, this crate only
//! reads them (plus [`PerformanceRegistry::upsert`] for that refresher).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use predict_common::BackendKind;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Situations a backend is known to handle well or badly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioTag {
    SimpleMatchups,
    ClearFavorites,
    CloseMatches,
    UpsetPredictions,
    FeatureRichMatches,
    RegularSeason,
    Finals,
    DataSparseMatches,
    SequencePatterns,
    SeasonalTrends,
    NewTeamMatchups,
    IrregularPatterns,
    BalancedMatchups,
    HighStakesGames,
    ModelDisagreement,
    LowConfidenceBaseModels,
    ComplexInteractions,
    RivalryMatches,
    ComputationalConstraints,
    SimplePatterns,
}

/// Performance history of one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub recent_accuracy: f64,
    pub overall_accuracy: f64,
    pub confidence_calibration: f64,
    pub strong_scenarios: Vec<ScenarioTag>,
    pub weak_scenarios: Vec<ScenarioTag>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub prediction_count: u64,
}

impl PerformanceRecord {
    pub fn new(recent_accuracy: f64, overall_accuracy: f64, confidence_calibration: f64) -> Self {
        Self {
            recent_accuracy,
            overall_accuracy,
            confidence_calibration,
            strong_scenarios: vec![],
            weak_scenarios: vec![],
            last_updated: Utc::now(),
            prediction_count: 0,
        }
    }

    pub fn strong_in(mut self, tags: &[ScenarioTag]) -> Self {
        self.strong_scenarios = tags.to_vec();
        self
    }

    pub fn weak_in(mut self, tags: &[ScenarioTag]) -> Self {
        self.weak_scenarios = tags.to_vec();
        self
    }

    pub fn updated_at(mut self, last_updated: DateTime<Utc>) -> Self {
        self.last_updated = last_updated;
        self
    }

    pub fn is_strong_in(&self, tag: ScenarioTag) -> bool {
        self.strong_scenarios.contains(&tag)
    }

    pub fn is_weak_in(&self, tag: ScenarioTag) -> bool {
        self.weak_scenarios.contains(&tag)
    }
}

/// Point-in-time copy of all records, handed to the strategies.
pub type PerformanceTable = BTreeMap<BackendKind, PerformanceRecord>;

/// Mutable store of performance records keyed by backend.
#[derive(Debug, Default)]
pub struct PerformanceRegistry {
    records: RwLock<PerformanceTable>,
}

impl PerformanceRegistry {
    /// Registry without any records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with the baseline figures for all five backends.
    pub fn with_defaults() -> Self {
        Self::from_table(default_table(Utc::now()))
    }

    pub fn from_table(table: PerformanceTable) -> Self {
        Self {
            records: RwLock::new(table),
        }
    }

    pub async fn get(&self, kind: BackendKind) -> Option<PerformanceRecord> {
        self.records.read().await.get(&kind).cloned()
    }

    /// Insert or replace the record for a backend.
    pub async fn upsert(&self, kind: BackendKind, record: PerformanceRecord) {
        self.records.write().await.insert(kind, record);
    }

    pub async fn snapshot(&self) -> PerformanceTable {
        self.records.read().await.clone()
    }
}

fn default_table(now: DateTime<Utc>) -> PerformanceTable {
    use ScenarioTag::*;

    BTreeMap::from([
        (
            BackendKind::BaselineLinear,
            PerformanceRecord::new(0.85, 0.83, 0.78)
                .strong_in(&[SimpleMatchups, ClearFavorites])
                .weak_in(&[CloseMatches, UpsetPredictions])
                .updated_at(now),
        ),
        (
            BackendKind::GradientBoosted,
            PerformanceRecord::new(0.87, 0.86, 0.82)
                .strong_in(&[FeatureRichMatches, RegularSeason])
                .weak_in(&[Finals, DataSparseMatches])
                .updated_at(now),
        ),
        (
            BackendKind::SequenceModel,
            PerformanceRecord::new(0.84, 0.83, 0.80)
                .strong_in(&[SequencePatterns, SeasonalTrends])
                .weak_in(&[NewTeamMatchups, IrregularPatterns])
                .updated_at(now),
        ),
        (
            BackendKind::StackedEnsemble,
            PerformanceRecord::new(0.89, 0.88, 0.85)
                .strong_in(&[BalancedMatchups, HighStakesGames])
                .weak_in(&[ModelDisagreement, LowConfidenceBaseModels])
                .updated_at(now),
        ),
        (
            BackendKind::ReinforcementLearned,
            PerformanceRecord::new(0.91, 0.90, 0.88)
                .strong_in(&[ComplexInteractions, RivalryMatches])
                .weak_in(&[ComputationalConstraints, SimplePatterns])
                .updated_at(now),
        ),
    ])
}
