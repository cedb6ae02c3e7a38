//! Integration tests for bounded-concurrency batch prediction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use moe_router::backend::Result as BackendResult;
use moe_router::test_util::{test_match, test_service, MockPredictor};
use moe_router::{BackendRegistry, Predictor, RoutingStrategy};
use predict_common::{BackendKind, MatchDetails, PredictionOutcome, PredictionType, Probabilities};

const CALL_LATENCY: Duration = Duration::from_millis(100);

fn fixtures(n: usize) -> Vec<MatchDetails> {
    (0..n)
        .map(|i| test_match(&format!("Home {}", i), &format!("Away {}", i)))
        .collect()
}

/// Predictor that records the highest number of overlapping calls.
struct ConcurrencyTracker {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Predictor for ConcurrencyTracker {
    fn kind(&self) -> BackendKind {
        BackendKind::GradientBoosted
    }

    fn name(&self) -> &str {
        "concurrency-tracker"
    }

    fn version(&self) -> &str {
        "0"
    }

    fn supported_prediction_types(&self) -> &[PredictionType] {
        &[PredictionType::MatchWinner]
    }

    async fn is_ready(&self) -> BackendResult<bool> {
        Ok(true)
    }

    async fn predict(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
    ) -> BackendResult<PredictionOutcome> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(PredictionOutcome::new(
            self.kind(),
            prediction_type,
            match_details.clone(),
            Probabilities {
                home: 0.6,
                away: 0.35,
                draw: 0.05,
            },
        ))
    }
}

/// Counts WARN and ERROR events seen on the current thread.
#[derive(Clone, Default)]
struct LevelCounter {
    warn: Arc<AtomicUsize>,
    error: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> Layer<S> for LevelCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        match *event.metadata().level() {
            tracing::Level::WARN => {
                self.warn.fetch_add(1, Ordering::SeqCst);
            }
            tracing::Level::ERROR => {
                self.error.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_batch_logs_each_failure_once() {
    let counter = LevelCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let registry = Arc::new(BackendRegistry::new());
    registry
        .register(Arc::new(
            MockPredictor::new(BackendKind::StackedEnsemble).failing_for_home("Home 1"),
        ))
        .await;
    let service = test_service(registry, RoutingStrategy::RuleBased);

    let outcomes = service
        .predict_batch(&fixtures(3), PredictionType::MatchWinner, None, Some(2))
        .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(counter.warn.load(Ordering::SeqCst), 1);
    assert_eq!(counter.error.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_isolates_failures_and_runs_concurrently() {
    let registry = Arc::new(BackendRegistry::new());
    registry
        .register(Arc::new(
            MockPredictor::new(BackendKind::StackedEnsemble)
                .with_latency(CALL_LATENCY)
                .failing_for_home("Home 2"),
        ))
        .await;
    let service = test_service(registry, RoutingStrategy::RuleBased);
    let matches = fixtures(5);

    let start = Instant::now();
    let outcomes = service
        .predict_batch(&matches, PredictionType::MatchWinner, None, Some(2))
        .await;
    let elapsed = start.elapsed();

    assert_eq!(outcomes.len(), 4);
    assert!(
        elapsed < CALL_LATENCY * 5,
        "batch took {:?}, expected well under {:?}",
        elapsed,
        CALL_LATENCY * 5
    );

    let homes: Vec<&str> = outcomes.iter().map(|o| o.match_details.team_home.as_str()).collect();
    assert_eq!(homes, vec!["Home 0", "Home 1", "Home 3", "Home 4"]);

    let metrics = service.service_metrics().await;
    assert_eq!(metrics.total_predictions, 4);
    assert_eq!(metrics.model_usage.values().sum::<u64>(), 4);
    assert_eq!(metrics.routing.total_decisions, 5);
}

#[tokio::test]
async fn test_batch_respects_concurrency_cap() {
    let tracker = Arc::new(ConcurrencyTracker {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let registry = Arc::new(BackendRegistry::new());
    registry.register(tracker.clone()).await;
    let service = test_service(registry, RoutingStrategy::EnsembleWeighted);

    let outcomes = service
        .predict_batch(&fixtures(8), PredictionType::MatchWinner, None, Some(3))
        .await;

    assert_eq!(outcomes.len(), 8);
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_batch_uses_service_default_concurrency() {
    let tracker = Arc::new(ConcurrencyTracker {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let registry = Arc::new(BackendRegistry::new());
    registry.register(tracker.clone()).await;
    let service = test_service(registry, RoutingStrategy::EnsembleWeighted).with_max_concurrent(2);

    service
        .predict_batch(&fixtures(6), PredictionType::MatchWinner, None, None)
        .await;
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 2);

    // Zero is treated as one.
    tracker.peak.store(0, Ordering::SeqCst);
    service
        .predict_batch(&fixtures(3), PredictionType::MatchWinner, None, Some(0))
        .await;
    assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_batch() {
    let registry = Arc::new(BackendRegistry::new());
    let service = test_service(registry, RoutingStrategy::RuleBased);

    let outcomes = service
        .predict_batch(&[], PredictionType::MatchWinner, None, None)
        .await;
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_batch_with_no_ready_backends_returns_nothing() {
    let registry = Arc::new(BackendRegistry::new());
    registry
        .register(Arc::new(MockPredictor::new(BackendKind::BaselineLinear).not_ready()))
        .await;
    let service = test_service(registry, RoutingStrategy::RuleBased);

    let outcomes = service
        .predict_batch(&fixtures(3), PredictionType::MatchWinner, None, Some(2))
        .await;
    assert!(outcomes.is_empty());
    assert_eq!(service.service_metrics().await.total_predictions, 0);
}

#[tokio::test]
async fn test_dropped_batch_leaves_no_background_work() {
    let registry = Arc::new(BackendRegistry::new());
    let backend = Arc::new(
        MockPredictor::new(BackendKind::SequenceModel).with_latency(Duration::from_millis(200)),
    );
    registry.register(backend.clone()).await;
    let service = test_service(registry, RoutingStrategy::RuleBased);
    let matches = fixtures(4);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        service.predict_batch(&matches, PredictionType::MatchWinner, None, Some(2)),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;

    // Only the first two items were dispatched and none of them finished.
    assert_eq!(backend.predict_calls(), 2);
    assert_eq!(service.service_metrics().await.total_predictions, 0);
}
