//! Mixture-of-experts router.
//!
//! Builds the routing context for a match, asks the configured strategy for
//! a backend and keeps a bounded log of decisions for statistics.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use predict_common::{BackendKind, MatchDetails};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;

use super::context::{ContextBuilder, RoutingContext};
use super::performance::PerformanceRegistry;
use super::strategy::{RoutingStrategy, FALLBACK_CONFIDENCE};

/// Default number of decisions kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Default number of recent decisions that statistics cover.
pub const DEFAULT_STATS_WINDOW: usize = 100;

/// Errors from the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Routing was attempted without any candidate backend.
    #[error("Routing invoked with an empty candidate set")]
    NoCandidates,
}

/// One entry of the decision log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingDecision {
    pub timestamp: DateTime<Utc>,
    /// Identifier of the routed match.
    pub request_id: String,
    pub backend: BackendKind,
    pub confidence: f64,
    pub strategy: RoutingStrategy,
}

/// Result of a routing call.
#[derive(Debug, Clone)]
pub struct Routed {
    pub backend: BackendKind,
    pub confidence: f64,
    pub context: RoutingContext,
    pub decision: RoutingDecision,
    pub routing_time_ms: f64,
}

/// Aggregate view over the decision log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingStatistics {
    /// Decisions made since construction, including ones evicted from the log.
    pub total_decisions: u64,
    /// Backend usage over the recent window.
    pub recent_usage: BTreeMap<BackendKind, u64>,
    /// Mean routing confidence over the recent window.
    pub average_confidence: Option<f64>,
    pub strategy: RoutingStrategy,
    pub last_decision_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct DecisionLog {
    entries: VecDeque<RoutingDecision>,
    total: u64,
}

/// Router that delegates backend selection to a fixed strategy.
pub struct MixtureOfExpertsRouter {
    strategy: RoutingStrategy,
    context_builder: ContextBuilder,
    performance: Arc<PerformanceRegistry>,
    log: RwLock<DecisionLog>,
    history_capacity: usize,
    stats_window: usize,
}

impl MixtureOfExpertsRouter {
    /// Create a router with no match history source.
    pub fn new(strategy: RoutingStrategy, performance: Arc<PerformanceRegistry>) -> Self {
        Self::with_context_builder(strategy, performance, ContextBuilder::default())
    }

    pub fn with_context_builder(
        strategy: RoutingStrategy,
        performance: Arc<PerformanceRegistry>,
        context_builder: ContextBuilder,
    ) -> Self {
        Self {
            strategy,
            context_builder,
            performance,
            log: RwLock::new(DecisionLog::default()),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stats_window: DEFAULT_STATS_WINDOW,
        }
    }

    /// Bound the retained decision log. Zero is treated as one.
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Set how many recent decisions statistics cover. Zero is treated as one.
    pub fn with_stats_window(mut self, window: usize) -> Self {
        self.stats_window = window.max(1);
        self
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    pub fn performance(&self) -> &Arc<PerformanceRegistry> {
        &self.performance
    }

    /// Build the routing context for a match without routing it.
    pub fn context_for(&self, match_details: &MatchDetails) -> RoutingContext {
        self.context_builder.build(match_details)
    }

    /// Route one match to a backend among `candidates`.
    ///
    /// The chosen backend is always a member of `candidates`.
    pub async fn route(
        &self,
        match_details: &MatchDetails,
        candidates: &[BackendKind],
    ) -> Result<Routed, RouterError> {
        if candidates.is_empty() {
            tracing::error!(
                match_id = %match_details.match_id(),
                "Router called without candidates"
            );
            return Err(RouterError::NoCandidates);
        }

        let start = Instant::now();
        let context = self.context_builder.build(match_details);
        let performance = match self.strategy {
            RoutingStrategy::PerformanceBased => self.performance.snapshot().await,
            _ => Default::default(),
        };

        let (mut backend, mut confidence) =
            self.strategy.route(&context, candidates, &performance, Utc::now());

        if !candidates.contains(&backend) {
            tracing::debug!(
                suggested = %backend,
                "Strategy suggested a backend outside the candidate set, using first candidate"
            );
            backend = candidates[0];
            confidence = FALLBACK_CONFIDENCE;
        }

        let decision = RoutingDecision {
            timestamp: Utc::now(),
            request_id: match_details.match_id(),
            backend,
            confidence,
            strategy: self.strategy,
        };
        self.record(decision.clone()).await;

        let routing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            backend = %backend,
            confidence,
            strategy = %self.strategy,
            season_stage = %context.season_stage,
            match_importance = context.match_importance,
            candidates = candidates.len(),
            "MoE routing selected backend"
        );

        Ok(Routed {
            backend,
            confidence,
            context,
            decision,
            routing_time_ms,
        })
    }

    async fn record(&self, decision: RoutingDecision) {
        let mut log = self.log.write().await;
        log.total += 1;
        log.entries.push_back(decision);
        while log.entries.len() > self.history_capacity {
            log.entries.pop_front();
        }
    }

    /// Most recent decisions, oldest first.
    pub async fn recent_decisions(&self, limit: usize) -> Vec<RoutingDecision> {
        let log = self.log.read().await;
        let skip = log.entries.len().saturating_sub(limit);
        log.entries.iter().skip(skip).cloned().collect()
    }

    pub async fn statistics(&self) -> RoutingStatistics {
        let log = self.log.read().await;
        let skip = log.entries.len().saturating_sub(self.stats_window);
        let recent: Vec<&RoutingDecision> = log.entries.iter().skip(skip).collect();

        let mut recent_usage = BTreeMap::new();
        for decision in &recent {
            *recent_usage.entry(decision.backend).or_insert(0) += 1;
        }

        let average_confidence = if recent.is_empty() {
            None
        } else {
            Some(recent.iter().map(|d| d.confidence).sum::<f64>() / recent.len() as f64)
        };

        RoutingStatistics {
            total_decisions: log.total,
            recent_usage,
            average_confidence,
            strategy: self.strategy,
            last_decision_at: recent.last().map(|d| d.timestamp),
        }
    }
}
