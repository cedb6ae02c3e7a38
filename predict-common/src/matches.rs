//! Match input types.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Decimal bookmaker odds for a match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    pub home: f64,
    pub away: f64,
    /// Draw price, when the market offers one.
    #[serde(default)]
    pub draw: Option<f64>,
}

/// Input match details for a prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
    pub team_home: String,
    pub team_away: String,
    pub match_date: DateTime<Utc>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub round_number: Option<u32>,
    #[serde(default)]
    pub season_year: Option<i32>,
    #[serde(default)]
    pub odds: Option<Odds>,
}

impl MatchDetails {
    /// Create match details with only the required fields set.
    pub fn new(
        team_home: impl Into<String>,
        team_away: impl Into<String>,
        match_date: DateTime<Utc>,
    ) -> Self {
        Self {
            team_home: team_home.into(),
            team_away: team_away.into(),
            match_date,
            venue: None,
            round_number: None,
            season_year: None,
            odds: None,
        }
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    pub fn with_round(mut self, round_number: u32) -> Self {
        self.round_number = Some(round_number);
        self
    }

    pub fn with_odds(mut self, odds: Odds) -> Self {
        self.odds = Some(odds);
        self
    }

    /// Stable identifier derived from the teams and the match day.
    ///
    /// Recomputed on every call; never stored.
    pub fn match_id(&self) -> String {
        format!(
            "predict_{}_{}_{}",
            self.team_home,
            self.team_away,
            self.match_date.format("%Y-%m-%d")
        )
    }

    /// Calendar month of the match (1-12).
    pub fn month(&self) -> u32 {
        self.match_date.month()
    }
}
