//! Lifetime counters and the read-only reports built from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use predict_common::{BackendKind, PredictionType};
use serde::Serialize;

use crate::routing::RoutingStatistics;

/// Counters updated once per successful prediction.
#[derive(Debug, Clone, Default)]
pub struct ServiceCounters {
    total_predictions: u64,
    total_processing_time_ms: f64,
    usage: BTreeMap<BackendKind, u64>,
}

impl ServiceCounters {
    /// Count one served prediction and return the new total.
    pub fn record(&mut self, backend: BackendKind, processing_time_ms: f64) -> u64 {
        self.total_predictions += 1;
        self.total_processing_time_ms += processing_time_ms;
        *self.usage.entry(backend).or_insert(0) += 1;
        self.total_predictions
    }

    pub fn total_predictions(&self) -> u64 {
        self.total_predictions
    }

    pub fn average_processing_time_ms(&self) -> f64 {
        if self.total_predictions == 0 {
            0.0
        } else {
            self.total_processing_time_ms / self.total_predictions as f64
        }
    }

    pub fn usage_for(&self, backend: BackendKind) -> u64 {
        self.usage.get(&backend).copied().unwrap_or(0)
    }

    /// Usage for every backend kind, zero included.
    pub fn usage(&self) -> BTreeMap<BackendKind, u64> {
        BackendKind::ALL
            .iter()
            .map(|kind| (*kind, self.usage_for(*kind)))
            .collect()
    }
}

/// Status of one configured backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub version: String,
    pub is_ready: bool,
    pub supported_prediction_types: Vec<PredictionType>,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Service-wide metrics.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetrics {
    pub total_predictions: u64,
    pub average_processing_time_ms: f64,
    pub available_models: usize,
    pub total_models: usize,
    pub model_usage: BTreeMap<BackendKind, u64>,
    pub routing: RoutingStatistics,
    pub model_availability: BTreeMap<BackendKind, bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendHealth {
    pub name: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub available_models: usize,
    pub total_models: usize,
    pub total_predictions: u64,
    pub event_publisher_attached: bool,
    pub store_attached: bool,
    pub backends: BTreeMap<BackendKind, BackendHealth>,
}
