use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use predict_common::{BackendKind, MatchDetails, PredictionOutcome, PredictionType, Probabilities};

use crate::backend::{BackendError, Predictor, Result};

/// Scripted predictor for tests.
pub struct MockPredictor {
    kind: BackendKind,
    name: String,
    supported: Vec<PredictionType>,
    probabilities: Probabilities,
    latency: Duration,
    ready: AtomicBool,
    probe_error: AtomicBool,
    failing: AtomicBool,
    fail_for_home: Option<String>,
    inconsistent: bool,
    predict_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockPredictor {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            name: format!("mock-{}", kind),
            supported: vec![PredictionType::MatchWinner, PredictionType::MatchMargin],
            probabilities: Probabilities {
                home: 0.5,
                away: 0.45,
                draw: 0.05,
            },
            latency: Duration::ZERO,
            ready: AtomicBool::new(true),
            probe_error: AtomicBool::new(false),
            failing: AtomicBool::new(false),
            fail_for_home: None,
            inconsistent: false,
            predict_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_ready(self, ready: bool) -> Self {
        self.ready.store(ready, Ordering::SeqCst);
        self
    }

    pub fn not_ready(self) -> Self {
        self.with_ready(false)
    }

    /// Readiness probes fail with an error.
    pub fn probe_failing(self) -> Self {
        self.probe_error.store(true, Ordering::SeqCst);
        self
    }

    /// Every prediction fails.
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Predictions fail only for matches with this home team.
    pub fn failing_for_home(mut self, team: &str) -> Self {
        self.fail_for_home = Some(team.to_string());
        self
    }

    /// Predictions report a confidence that disagrees with the probabilities.
    pub fn inconsistent(mut self) -> Self {
        self.inconsistent = true;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_probabilities(mut self, home: f64, away: f64, draw: f64) -> Self {
        self.probabilities = Probabilities { home, away, draw };
        self
    }

    pub fn with_supported(mut self, types: &[PredictionType]) -> Self {
        self.supported = types.to_vec();
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn predict_calls(&self) -> usize {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Predictor for MockPredictor {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "mock-1.0"
    }

    fn supported_prediction_types(&self) -> &[PredictionType] {
        &self.supported
    }

    async fn is_ready(&self) -> Result<bool> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_error.load(Ordering::SeqCst) {
            return Err(BackendError::NotReady("probe failed".to_string()));
        }
        Ok(self.ready.load(Ordering::SeqCst))
    }

    async fn predict(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
    ) -> Result<PredictionOutcome> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !self.supports(prediction_type) {
            return Err(BackendError::UnsupportedPredictionType(prediction_type));
        }

        let fails_here = self.fail_for_home.as_deref() == Some(match_details.team_home.as_str());
        if self.failing.load(Ordering::SeqCst) || fails_here {
            return Err(BackendError::Inference(format!(
                "scripted failure for {}",
                match_details.match_id()
            )));
        }

        let mut outcome = PredictionOutcome::new(
            self.kind,
            prediction_type,
            match_details.clone(),
            self.probabilities,
        )
        .with_processing_time_ms(self.latency.as_secs_f64() * 1000.0);

        if self.inconsistent {
            outcome.confidence = 0.1;
        }
        Ok(outcome)
    }
}
