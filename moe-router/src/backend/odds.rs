//! Backend that reads the bookmaker market instead of running a model.
//!
//! Useful as a stand-in for any backend slot: it is always ready and its
//! probabilities are the de-vigged implied probabilities of the odds.

use std::time::Instant;

use async_trait::async_trait;
use predict_common::{
    BackendKind, MatchDetails, Odds, PredictionOutcome, PredictionType, Probabilities,
};

use super::{BackendError, Predictor, Result};

/// Probabilities used when a match has no odds.
const HOME_PRIOR: (f64, f64, f64) = (0.55, 0.40, 0.05);

const SUPPORTED: &[PredictionType] = &[PredictionType::MatchWinner];

/// Market-implied predictor.
pub struct OddsImpliedPredictor {
    kind: BackendKind,
    name: String,
}

impl OddsImpliedPredictor {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            name: format!("odds-implied ({})", kind),
        }
    }
}

#[async_trait]
impl Predictor for OddsImpliedPredictor {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn supported_prediction_types(&self) -> &[PredictionType] {
        SUPPORTED
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(true)
    }

    async fn predict(
        &self,
        match_details: &MatchDetails,
        prediction_type: PredictionType,
    ) -> Result<PredictionOutcome> {
        if !self.supports(prediction_type) {
            return Err(BackendError::UnsupportedPredictionType(prediction_type));
        }

        let start = Instant::now();
        let probabilities = match match_details.odds {
            Some(odds) => no_vig(&odds).ok_or_else(|| {
                BackendError::InvalidInput(format!(
                    "decimal odds must exceed 1.0, got {:?} for {}",
                    odds,
                    match_details.match_id()
                ))
            })?,
            None => {
                let (home, away, draw) = HOME_PRIOR;
                Probabilities { home, away, draw }
            }
        };

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(
            PredictionOutcome::new(self.kind, prediction_type, match_details.clone(), probabilities)
                .with_processing_time_ms(elapsed_ms),
        )
    }
}

/// Implied probabilities with the bookmaker margin removed.
///
/// A market without a draw price yields a draw probability of zero.
fn no_vig(odds: &Odds) -> Option<Probabilities> {
    let prices = [Some(odds.home), Some(odds.away), odds.draw];
    if prices.iter().flatten().any(|price| *price <= 1.0 || !price.is_finite()) {
        return None;
    }

    let implied = |price: Option<f64>| price.map(|p| 1.0 / p).unwrap_or(0.0);
    Probabilities::normalized(
        implied(Some(odds.home)),
        implied(Some(odds.away)),
        implied(odds.draw),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use predict_common::Winner;

    fn details() -> MatchDetails {
        MatchDetails::new(
            "Penrith Panthers",
            "Parramatta Eels",
            Utc.with_ymd_and_hms(2024, 6, 14, 9, 55, 0).unwrap(),
        )
    }

    fn odds(home: f64, away: f64, draw: Option<f64>) -> Odds {
        Odds { home, away, draw }
    }

    #[test]
    fn test_descriptor() {
        let descriptor = OddsImpliedPredictor::new(BackendKind::SequenceModel).descriptor();
        assert_eq!(descriptor.kind, BackendKind::SequenceModel);
        assert_eq!(descriptor.name, "odds-implied (sequence_model)");
        assert_eq!(descriptor.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(descriptor.supported_prediction_types, vec![PredictionType::MatchWinner]);
    }

    #[test]
    fn test_no_vig_sums_to_one() {
        let p = no_vig(&odds(2.10, 3.60, Some(3.40))).unwrap();
        assert!(p.is_valid());
        assert_eq!(p.winner(), Winner::Home);
    }

    #[test]
    fn test_no_vig_two_way_market() {
        let p = no_vig(&odds(1.50, 2.60, None)).unwrap();
        assert!(p.is_valid());
        assert_eq!(p.draw, 0.0);
        assert!(p.home > p.away);
    }

    #[test]
    fn test_no_vig_rejects_bad_prices() {
        assert!(no_vig(&odds(1.0, 2.0, None)).is_none());
        assert!(no_vig(&odds(1.8, 2.0, Some(0.5))).is_none());
    }

    #[tokio::test]
    async fn test_predict_without_odds_uses_prior() {
        let predictor = OddsImpliedPredictor::new(BackendKind::BaselineLinear);
        assert!(predictor.is_ready().await.unwrap());

        let outcome = predictor.predict(&details(), PredictionType::MatchWinner).await.unwrap();
        assert_eq!(outcome.backend, BackendKind::BaselineLinear);
        assert_eq!(outcome.predicted_winner, Winner::Home);
        assert_eq!(outcome.confidence, 0.55);
        assert!(outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_predict_with_odds() {
        let predictor = OddsImpliedPredictor::new(BackendKind::StackedEnsemble);
        let match_details = details().with_odds(odds(3.20, 1.40, None));

        let outcome = predictor.predict(&match_details, PredictionType::MatchWinner).await.unwrap();
        assert_eq!(outcome.predicted_winner, Winner::Away);
        assert!(outcome.is_consistent());
    }

    #[tokio::test]
    async fn test_predict_rejects_unsupported_type() {
        let predictor = OddsImpliedPredictor::new(BackendKind::SequenceModel);
        let result = predictor.predict(&details(), PredictionType::FirstTryScorer).await;
        assert!(matches!(
            result,
            Err(BackendError::UnsupportedPredictionType(PredictionType::FirstTryScorer))
        ));
    }

    #[tokio::test]
    async fn test_predict_rejects_invalid_odds() {
        let predictor = OddsImpliedPredictor::new(BackendKind::SequenceModel);
        let match_details = details().with_odds(odds(0.9, 1.4, None));
        let result = predictor.predict(&match_details, PredictionType::MatchWinner).await;
        assert!(matches!(result, Err(BackendError::InvalidInput(_))));
    }
}
