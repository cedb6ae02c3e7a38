//! Backend routing.
//!
//! This module provides:
//! - Routing context derived from match details
//! - Performance records consulted by the performance-based strategy
//! - The routing strategies themselves
//! - The mixture-of-experts router that ties them together

pub mod context;
pub mod performance;
pub mod router;
pub mod strategy;

pub use context::{
    ContextBuilder, DataAvailability, MatchHistory, NoHistory, RoutingContext, SeasonStage,
};
pub use performance::{PerformanceRecord, PerformanceRegistry, PerformanceTable, ScenarioTag};
pub use router::{
    MixtureOfExpertsRouter, Routed, RouterError, RoutingDecision, RoutingStatistics,
    DEFAULT_HISTORY_CAPACITY, DEFAULT_STATS_WINDOW,
};
pub use strategy::RoutingStrategy;
