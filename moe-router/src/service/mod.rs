//! Prediction service.
//!
//! The facade request handlers call. It finds the ready backends, routes the
//! request (or honors a forced backend), calls the chosen backend and
//! decorates the outcome with routing metadata. Event publishing and
//! persistence are best-effort: their failures are logged and dropped.

mod stats;

pub use stats::{
    BackendHealth, HealthReport, HealthStatus, ModelStatus, ServiceCounters, ServiceMetrics,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use predict_common::{
    BackendKind, MatchDetails, PredictionCompleted, PredictionEvent, PredictionOutcome,
    PredictionRequested, PredictionType,
};
use serde_json::{json, Value};
use tokio::sync::{Mutex, Semaphore};

use crate::backend::{BackendError, BackendRegistry, Predictor};
use crate::config::Config;
use crate::error::{Result, ServiceError};
use crate::routing::{MixtureOfExpertsRouter, PerformanceRegistry};
use crate::sinks::{
    BroadcastPublisher, EventPublisher, PredictionStore, SqlitePredictionStore, StoreError,
};

/// Default cap on concurrent predictions in a batch.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default upper bound on a single readiness probe.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_millis(2000);

/// Strategy label recorded for forced routes.
const FORCED_STRATEGY: &str = "forced";

/// Result of probing one backend.
enum Probe {
    Ready,
    NotReady,
    Failed(String),
}

impl Probe {
    fn is_ready(&self) -> bool {
        matches!(self, Probe::Ready)
    }

    fn error(&self) -> Option<String> {
        match self {
            Probe::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }
}

/// Backend choice for one request, with the metadata describing it.
struct Selection {
    backend: BackendKind,
    confidence: f64,
    metadata: Value,
}

pub struct PredictionService {
    backends: Arc<BackendRegistry>,
    router: MixtureOfExpertsRouter,
    publisher: Option<Arc<dyn EventPublisher>>,
    store: Option<Arc<dyn PredictionStore>>,
    counters: Mutex<ServiceCounters>,
    readiness_timeout: Duration,
    max_concurrent: usize,
}

impl PredictionService {
    pub fn new(backends: Arc<BackendRegistry>, router: MixtureOfExpertsRouter) -> Self {
        Self {
            backends,
            router,
            publisher: None,
            store: None,
            counters: Mutex::new(ServiceCounters::default()),
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Build a service wired the way `config` describes.
    ///
    /// Opens the SQLite store when a database URL is configured and attaches
    /// an in-process broadcast publisher when events are enabled.
    pub fn from_config(
        config: &Config,
        backends: Arc<BackendRegistry>,
        performance: Arc<PerformanceRegistry>,
    ) -> std::result::Result<Self, StoreError> {
        let router = MixtureOfExpertsRouter::new(config.routing.strategy, performance)
            .with_history_capacity(config.routing.history_capacity)
            .with_stats_window(config.routing.stats_window);

        let mut service = Self::new(backends, router)
            .with_readiness_timeout(Duration::from_millis(config.readiness.timeout_ms))
            .with_max_concurrent(config.batch.max_concurrent);

        if config.events.enabled {
            let publisher = BroadcastPublisher::new(config.events.capacity);
            service = service.with_publisher(Arc::new(publisher));
        }
        if let Some(url) = &config.persistence.database_url {
            service = service.with_store(Arc::new(SqlitePredictionStore::open(url)?));
        }

        Ok(service)
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn PredictionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Default batch concurrency. Zero is treated as one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn router(&self) -> &MixtureOfExpertsRouter {
        &self.router
    }

    pub fn backends(&self) -> &Arc<BackendRegistry> {
        &self.backends
    }

    /// Probe every configured backend, concurrently, in tier order.
    async fn probe_all(&self) -> Vec<(Arc<dyn Predictor>, Probe)> {
        let backends = self.backends.all().await;
        let probes = backends.iter().map(|backend| self.probe(backend.as_ref()));
        let results = join_all(probes).await;
        backends.into_iter().zip(results).collect()
    }

    async fn probe(&self, backend: &dyn Predictor) -> Probe {
        match tokio::time::timeout(self.readiness_timeout, backend.is_ready()).await {
            Ok(Ok(true)) => Probe::Ready,
            Ok(Ok(false)) => Probe::NotReady,
            Ok(Err(e)) => {
                tracing::warn!(
                    origin = "readiness_probe",
                    backend = %backend.kind(),
                    error = %e,
                    "Backend readiness probe failed"
                );
                Probe::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    origin = "readiness_probe",
                    backend = %backend.kind(),
                    timeout_ms = self.readiness_timeout.as_millis() as u64,
                    "Backend readiness probe timed out"
                );
                Probe::Failed(format!(
                    "readiness probe timed out after {:?}",
                    self.readiness_timeout
                ))
            }
        }
    }

    /// Backends that are ready right now, in tier order.
    pub async fn available_backends(&self) -> Vec<Arc<dyn Predictor>> {
        self.probe_all()
            .await
            .into_iter()
            .filter(|(_, probe)| probe.is_ready())
            .map(|(backend, _)| backend)
            .collect()
    }

    /// Predict one match.
    ///
    /// With `forced` set, that backend answers with routing confidence 1.0
    /// provided it is ready. Otherwise the router picks among the ready
    /// backends.
    pub async fn predict(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
        requester_id: Option<&str>,
        forced: Option<BackendKind>,
    ) -> Result<PredictionOutcome> {
        let result = self
            .execute(match_details, prediction_type, requester_id, forced)
            .await;

        if let Err(e) = &result {
            tracing::error!(
                match_id = %match_details.match_id(),
                error = %e,
                "Prediction failed"
            );
        }
        result
    }

    /// `predict` without the failure log; callers decide how to report errors.
    async fn execute(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
        requester_id: Option<&str>,
        forced: Option<BackendKind>,
    ) -> Result<PredictionOutcome> {
        let start = Instant::now();
        let correlation_id = uuid::Uuid::new_v4().to_string();

        self.publish(PredictionEvent::Requested(PredictionRequested::new(
            &correlation_id,
            requester_id,
            match_details,
            prediction_type,
        )))
        .await;

        self.run(match_details, prediction_type, requester_id, forced, &correlation_id, start)
            .await
    }

    async fn run(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
        requester_id: Option<&str>,
        forced: Option<BackendKind>,
        correlation_id: &str,
        start: Instant,
    ) -> Result<PredictionOutcome> {
        let ready = self.available_backends().await;
        if ready.is_empty() {
            return Err(ServiceError::NoModelsAvailable);
        }
        let candidates: Vec<BackendKind> = ready.iter().map(|b| b.kind()).collect();

        let selection = match forced {
            Some(kind) => Self::select_forced(kind, &candidates)?,
            None => self.select_routed(match_details, &candidates).await?,
        };
        let backend = selection.backend;

        let predictor = ready
            .iter()
            .find(|b| b.kind() == backend)
            .cloned()
            .ok_or(ServiceError::ModelUnavailable(backend))?;

        let mut outcome = predictor
            .predict(match_details, prediction_type)
            .await
            .map_err(|source| ServiceError::BackendPredictionFailed { backend, source })?;

        if !outcome.is_consistent() {
            return Err(ServiceError::BackendPredictionFailed {
                backend,
                source: BackendError::InvalidOutput(format!(
                    "probabilities {:?} with confidence {}",
                    outcome.probabilities, outcome.confidence
                )),
            });
        }

        let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        let served = self.counters.lock().await.record(backend, processing_time_ms);

        outcome.metadata.insert("moe_routing".into(), selection.metadata);
        outcome.metadata.insert("prediction_service_id".into(), json!(correlation_id));
        outcome.metadata.insert("total_available_models".into(), json!(candidates.len()));
        outcome.metadata.insert("service_prediction_count".into(), json!(served));

        if let Some(store) = &self.store {
            match store.save(&outcome, requester_id).await {
                Ok(id) => {
                    outcome.metadata.insert("repository_id".into(), json!(id));
                }
                Err(e) => {
                    tracing::warn!(
                        origin = "persistence",
                        prediction_id = %outcome.prediction_id,
                        error = %e,
                        "Failed to save prediction"
                    );
                }
            }
        }

        self.publish(PredictionEvent::Completed(PredictionCompleted::new(
            correlation_id,
            requester_id,
            &outcome,
            processing_time_ms,
        )))
        .await;

        tracing::info!(
            prediction_id = %outcome.prediction_id,
            backend = %backend,
            routing_confidence = selection.confidence,
            predicted_winner = %outcome.predicted_winner,
            latency_ms = processing_time_ms,
            "Prediction completed"
        );

        Ok(outcome)
    }

    fn select_forced(kind: BackendKind, candidates: &[BackendKind]) -> Result<Selection> {
        if !candidates.contains(&kind) {
            return Err(ServiceError::ModelUnavailable(kind));
        }
        Ok(Selection {
            backend: kind,
            confidence: 1.0,
            metadata: json!({
                "strategy": FORCED_STRATEGY,
                "selected_model": kind,
                "routing_confidence": 1.0,
                "forced": true,
                "available_models": candidates,
            }),
        })
    }

    async fn select_routed(
        &self,
        match_details: &MatchDetails,
        candidates: &[BackendKind],
    ) -> Result<Selection> {
        let routed = self.router.route(match_details, candidates).await?;
        Ok(Selection {
            backend: routed.backend,
            confidence: routed.confidence,
            metadata: json!({
                "strategy": self.router.strategy(),
                "selected_model": routed.backend,
                "routing_confidence": routed.confidence,
                "routing_time_ms": routed.routing_time_ms,
                "context": routed.context.summary(),
                "available_models": candidates,
            }),
        })
    }

    async fn publish(&self, event: PredictionEvent) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let event_type = event.event_type();
        if let Err(e) = publisher.publish(event).await {
            tracing::warn!(
                origin = "event_publish",
                event_type,
                error = %e,
                "Failed to publish event"
            );
        }
    }

    /// Predict many matches with at most `max_concurrent` in flight.
    ///
    /// Failed items are logged once, at WARN, and left out. Successful
    /// outcomes keep the input order. `None` uses the service default; zero
    /// is treated as one.
    ///
    /// Items are polled as futures on the caller's task rather than spawned,
    /// so dropping the returned future drops every in-flight prediction. The
    /// flip side is that they share one task: a backend that does CPU-bound
    /// work inside `predict` without yielding serializes the batch. Such
    /// backends should move that work to `tokio::task::spawn_blocking`.
    pub async fn predict_batch(
        &self,
        matches: &[MatchDetails],
        prediction_type: PredictionType,
        requester_id: Option<&str>,
        max_concurrent: Option<usize>,
    ) -> Vec<PredictionOutcome> {
        let limit = max_concurrent.unwrap_or(self.max_concurrent).max(1);
        tracing::info!(total = matches.len(), max_concurrent = limit, "Starting batch prediction");

        let semaphore = Semaphore::new(limit);
        let tasks = matches.iter().map(|match_details| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await.ok()?;
                match self
                    .execute(match_details, prediction_type, requester_id, None)
                    .await
                {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        tracing::warn!(
                            match_id = %match_details.match_id(),
                            error = %e,
                            "Batch item failed"
                        );
                        None
                    }
                }
            }
        });

        let outcomes: Vec<PredictionOutcome> =
            join_all(tasks).await.into_iter().flatten().collect();

        tracing::info!(
            total = matches.len(),
            succeeded = outcomes.len(),
            failed = matches.len() - outcomes.len(),
            "Batch prediction completed"
        );
        outcomes
    }

    /// Status of every configured backend.
    pub async fn model_status(&self) -> std::collections::BTreeMap<BackendKind, ModelStatus> {
        let probes = self.probe_all().await;
        let counters = self.counters.lock().await;

        probes
            .into_iter()
            .map(|(backend, probe)| {
                let descriptor = backend.descriptor();
                let status = ModelStatus {
                    name: descriptor.name,
                    version: descriptor.version,
                    is_ready: probe.is_ready(),
                    supported_prediction_types: descriptor.supported_prediction_types,
                    usage_count: counters.usage_for(descriptor.kind),
                    error: probe.error(),
                };
                (descriptor.kind, status)
            })
            .collect()
    }

    pub async fn service_metrics(&self) -> ServiceMetrics {
        let probes = self.probe_all().await;
        let routing = self.router.statistics().await;
        let counters = self.counters.lock().await.clone();

        let model_availability: std::collections::BTreeMap<BackendKind, bool> = probes
            .iter()
            .map(|(backend, probe)| (backend.kind(), probe.is_ready()))
            .collect();

        ServiceMetrics {
            total_predictions: counters.total_predictions(),
            average_processing_time_ms: counters.average_processing_time_ms(),
            available_models: model_availability.values().filter(|ready| **ready).count(),
            total_models: probes.len(),
            model_usage: counters.usage(),
            routing,
            model_availability,
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let probes = self.probe_all().await;
        let total_predictions = self.counters.lock().await.total_predictions();

        let backends: std::collections::BTreeMap<BackendKind, BackendHealth> = probes
            .iter()
            .map(|(backend, probe)| {
                let health = BackendHealth {
                    name: backend.name().to_string(),
                    ready: probe.is_ready(),
                    error: probe.error(),
                };
                (backend.kind(), health)
            })
            .collect();

        let available_models = backends.values().filter(|b| b.ready).count();
        let status = if available_models > 0 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport {
            status,
            timestamp: Utc::now(),
            available_models,
            total_models: probes.len(),
            total_predictions,
            event_publisher_attached: self.publisher.is_some(),
            store_attached: self.store.is_some(),
            backends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::RoutingStrategy;
    use crate::test_util::{
        mock_registry, test_config, test_match, test_service, MockPredictor, RecordingPublisher,
    };

    #[tokio::test]
    async fn test_predict_attaches_routing_metadata() {
        let registry =
            mock_registry(&[BackendKind::GradientBoosted, BackendKind::BaselineLinear]).await;
        let service = test_service(registry, RoutingStrategy::EnsembleWeighted);

        let outcome = service
            .predict(
                &test_match("Penrith Panthers", "Parramatta Eels"),
                PredictionType::MatchWinner,
                None,
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.backend, BackendKind::GradientBoosted);
        let routing = &outcome.metadata["moe_routing"];
        assert_eq!(routing["strategy"], "ensemble_weighted");
        assert_eq!(routing["selected_model"], "gradient_boosted");
        assert_eq!(routing["routing_confidence"], 0.2);
        assert_eq!(routing["available_models"], json!(["gradient_boosted", "baseline_linear"]));
        assert_eq!(routing["context"]["rivalry_score"], 0.7);
        assert_eq!(outcome.metadata["total_available_models"], 2);
        assert_eq!(outcome.metadata["service_prediction_count"], 1);
        assert!(outcome.metadata.contains_key("prediction_service_id"));
        assert!(!outcome.metadata.contains_key("repository_id"));
    }

    #[tokio::test]
    async fn test_forced_metadata() {
        let registry =
            mock_registry(&[BackendKind::ReinforcementLearned, BackendKind::SequenceModel]).await;
        let service = test_service(registry, RoutingStrategy::PerformanceBased);

        let outcome = service
            .predict(
                &test_match("A", "B"),
                PredictionType::MatchWinner,
                None,
                Some(BackendKind::SequenceModel),
            )
            .await
            .unwrap();

        let routing = &outcome.metadata["moe_routing"];
        assert_eq!(routing["strategy"], "forced");
        assert_eq!(routing["forced"], true);
        assert_eq!(routing["routing_confidence"], 1.0);
        assert_eq!(outcome.backend, BackendKind::SequenceModel);
        // Forced routes bypass the router entirely.
        assert_eq!(service.router().statistics().await.total_decisions, 0);
    }

    #[tokio::test]
    async fn test_events_share_correlation_id() {
        let publisher = Arc::new(RecordingPublisher::new());
        let registry = mock_registry(&[BackendKind::StackedEnsemble]).await;
        let service =
            test_service(registry, RoutingStrategy::RuleBased).with_publisher(publisher.clone());

        let outcome = service
            .predict(&test_match("A", "B"), PredictionType::MatchWinner, Some("user-7"), None)
            .await
            .unwrap();

        let events = publisher.events();
        assert_eq!(publisher.event_types(), vec!["prediction.requested", "prediction.completed"]);
        assert_eq!(events[0].envelope().correlation_id, events[1].envelope().correlation_id);
        assert_eq!(
            outcome.metadata["prediction_service_id"],
            json!(events[0].envelope().correlation_id)
        );
        match &events[1] {
            PredictionEvent::Completed(completed) => {
                assert_eq!(completed.user_id, "user-7");
                assert_eq!(completed.prediction_id, outcome.prediction_id);
                assert_eq!(completed.predictions[0].model, BackendKind::StackedEnsemble);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_requested_event_published_even_when_failing() {
        let publisher = Arc::new(RecordingPublisher::new());
        let service = test_service(Arc::new(BackendRegistry::new()), RoutingStrategy::RuleBased)
            .with_publisher(publisher.clone());

        let err = service
            .predict(&test_match("A", "B"), PredictionType::MatchWinner, None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NoModelsAvailable));
        assert_eq!(publisher.event_types(), vec!["prediction.requested"]);
    }

    #[tokio::test]
    async fn test_inconsistent_outcome_rejected() {
        let registry = Arc::new(BackendRegistry::new());
        registry
            .register(Arc::new(MockPredictor::new(BackendKind::BaselineLinear).inconsistent()))
            .await;
        let service = test_service(registry, RoutingStrategy::RuleBased);

        let err = service
            .predict(&test_match("A", "B"), PredictionType::MatchWinner, None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::BackendPredictionFailed {
                backend: BackendKind::BaselineLinear,
                source: BackendError::InvalidOutput(_),
            }
        ));
        assert_eq!(service.service_metrics().await.total_predictions, 0);
    }

    #[tokio::test]
    async fn test_slow_probe_counts_as_not_ready() {
        struct Hanging;

        #[async_trait::async_trait]
        impl Predictor for Hanging {
            fn kind(&self) -> BackendKind {
                BackendKind::SequenceModel
            }
            fn name(&self) -> &str {
                "hanging"
            }
            fn version(&self) -> &str {
                "0"
            }
            fn supported_prediction_types(&self) -> &[PredictionType] {
                &[PredictionType::MatchWinner]
            }
            async fn is_ready(&self) -> crate::backend::Result<bool> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(true)
            }
            async fn predict(
                &self,
                _match_details: &MatchDetails,
                _prediction_type: PredictionType,
            ) -> crate::backend::Result<PredictionOutcome> {
                Err(BackendError::Inference("unreachable".into()))
            }
        }

        let registry = mock_registry(&[BackendKind::BaselineLinear]).await;
        registry.register(Arc::new(Hanging)).await;
        let service = test_service(registry, RoutingStrategy::PerformanceBased)
            .with_readiness_timeout(Duration::from_millis(50));

        let ready: Vec<BackendKind> =
            service.available_backends().await.iter().map(|b| b.kind()).collect();
        assert_eq!(ready, vec![BackendKind::BaselineLinear]);

        let health = service.health_check().await;
        assert!(health.backends[&BackendKind::SequenceModel].error.is_some());
    }

    #[tokio::test]
    async fn test_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = test_config();
        config.events.enabled = true;
        config.routing.strategy = RoutingStrategy::RuleBased;
        let db_path = dir.path().join("p.db");
        config.persistence.database_url = Some(format!("sqlite:{}", db_path.display()));

        let registry = mock_registry(&[BackendKind::ReinforcementLearned]).await;
        let performance = Arc::new(PerformanceRegistry::empty());
        let service = PredictionService::from_config(&config, registry, performance).unwrap();

        assert_eq!(service.router().strategy(), RoutingStrategy::RuleBased);
        let outcome = service
            .predict(&test_match("A", "B"), PredictionType::MatchWinner, None, None)
            .await
            .unwrap();
        assert!(outcome.metadata.contains_key("repository_id"));

        let health = service.health_check().await;
        assert!(health.event_publisher_attached);
        assert!(health.store_attached);
    }
}
