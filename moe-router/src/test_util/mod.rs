pub mod mock_predictor;
pub mod mock_sinks;

pub use mock_predictor::MockPredictor;
pub use mock_sinks::{FailingPublisher, FailingStore, RecordingPublisher};

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use predict_common::{BackendKind, MatchDetails};

use crate::backend::BackendRegistry;
use crate::config::Config;
use crate::routing::{MixtureOfExpertsRouter, PerformanceRegistry, RoutingStrategy};
use crate::service::PredictionService;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.logging.level = "debug".to_string();
    config.readiness.timeout_ms = 500;
    config.events.enabled = false;
    config
}

/// A mid-season fixture with no odds.
pub fn test_match(home: &str, away: &str) -> MatchDetails {
    MatchDetails::new(home, away, Utc.with_ymd_and_hms(2024, 7, 12, 9, 0, 0).unwrap())
        .with_round(18)
}

/// Registry holding one ready mock per kind.
pub async fn mock_registry(kinds: &[BackendKind]) -> Arc<BackendRegistry> {
    let registry = Arc::new(BackendRegistry::new());
    for kind in kinds {
        registry.register(Arc::new(MockPredictor::new(*kind))).await;
    }
    registry
}

/// Service over the given registry with default performance records.
pub fn test_service(
    registry: Arc<BackendRegistry>,
    strategy: RoutingStrategy,
) -> PredictionService {
    let performance = Arc::new(PerformanceRegistry::with_defaults());
    let router = MixtureOfExpertsRouter::new(strategy, performance);
    PredictionService::new(registry, router)
}
