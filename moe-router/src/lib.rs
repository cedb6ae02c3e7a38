pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod routing;
pub mod service;
pub mod sinks;
pub mod test_util;

pub use backend::{
    BackendDescriptor, BackendError, BackendRegistry, OddsImpliedPredictor, Predictor,
};
pub use config::Config;
pub use error::ServiceError;
pub use routing::{
    ContextBuilder, MatchHistory, MixtureOfExpertsRouter, PerformanceRecord, PerformanceRegistry,
    RouterError, RoutingContext, RoutingStatistics, RoutingStrategy, ScenarioTag, SeasonStage,
};
pub use service::{HealthReport, ModelStatus, PredictionService, ServiceMetrics};
pub use sinks::{BroadcastPublisher, EventPublisher, PredictionStore, SqlitePredictionStore};
