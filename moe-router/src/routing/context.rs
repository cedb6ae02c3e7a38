//! Routing context derived from raw match details.
//!
//! Everything here is synchronous and infallible: unknown team pairs simply
//! have no rivalry, and a missing head-to-head record falls back to a
//! deterministic stand-in.

use std::fmt;
use std::sync::Arc;

use predict_common::MatchDetails;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Known rivalries and their intensity. Lookup is symmetric.
const RIVALRIES: &[(&str, &str, f64)] = &[
    ("Brisbane Broncos", "Melbourne Storm", 0.8),
    ("Sydney Roosters", "South Sydney Rabbitohs", 0.9),
    ("Manly Sea Eagles", "Sydney Roosters", 0.7),
    ("Penrith Panthers", "Parramatta Eels", 0.7),
    ("St George Dragons", "Canterbury Bulldogs", 0.6),
];

/// Bounds of the stand-in head-to-head count, `[MIN, MAX)`.
const H2H_STANDIN_MIN: u32 = 10;
const H2H_STANDIN_MAX: u32 = 30;

/// Stage of the season, a pure function of the match month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStage {
    #[serde(rename = "early_season")]
    Early,
    #[serde(rename = "mid_season")]
    Mid,
    Finals,
    GrandFinal,
    OffSeason,
}

impl SeasonStage {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Self::Early,
            6..=8 => Self::Mid,
            9 => Self::Finals,
            10 => Self::GrandFinal,
            _ => Self::OffSeason,
        }
    }

    /// Finals series, including the grand final.
    pub fn is_finals(&self) -> bool {
        matches!(self, Self::Finals | Self::GrandFinal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Early => "early_season",
            Self::Mid => "mid_season",
            Self::Finals => "finals",
            Self::GrandFinal => "grand_final",
            Self::OffSeason => "off_season",
        }
    }
}

impl fmt::Display for SeasonStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which kinds of supporting data exist for a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAvailability {
    pub historical_matches: bool,
    pub player_stats: bool,
    pub odds_data: bool,
    pub venue_data: bool,
    pub injury_reports: bool,
}

impl DataAvailability {
    pub fn all(&self) -> bool {
        self.historical_matches
            && self.player_stats
            && self.odds_data
            && self.venue_data
            && self.injury_reports
    }
}

impl Default for DataAvailability {
    fn default() -> Self {
        Self {
            historical_matches: true,
            player_stats: true,
            odds_data: true,
            venue_data: true,
            injury_reports: false,
        }
    }
}

/// Features the routing strategies decide on. One per routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingContext {
    pub rivalry_score: f64,
    pub match_importance: f64,
    pub season_stage: SeasonStage,
    pub head_to_head_matches: u32,
    pub form_differential: f64,
    pub data_availability: DataAvailability,
}

impl RoutingContext {
    /// Compact view attached to outcome metadata.
    pub fn summary(&self) -> Value {
        json!({
            "rivalry_score": self.rivalry_score,
            "match_importance": self.match_importance,
            "season_stage": self.season_stage,
            "h2h_matches": self.head_to_head_matches,
        })
    }
}

impl Default for RoutingContext {
    fn default() -> Self {
        Self {
            rivalry_score: 0.0,
            match_importance: 0.5,
            season_stage: SeasonStage::OffSeason,
            head_to_head_matches: 0,
            form_differential: 0.0,
            data_availability: DataAvailability::default(),
        }
    }
}

/// Source of historical match data between two teams.
pub trait MatchHistory: Send + Sync {
    /// Number of past meetings, if known.
    fn head_to_head(&self, team_home: &str, team_away: &str) -> Option<u32>;

    /// Recent form of the home side minus the away side, roughly in [-1, 1].
    fn form_differential(&self, _team_home: &str, _team_away: &str) -> f64 {
        0.0
    }

    fn has_historical_data(&self, _team_home: &str, _team_away: &str) -> bool {
        true
    }
}

/// History source that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl MatchHistory for NoHistory {
    fn head_to_head(&self, _team_home: &str, _team_away: &str) -> Option<u32> {
        None
    }
}

/// Builds a [`RoutingContext`] for each match.
#[derive(Clone)]
pub struct ContextBuilder {
    history: Arc<dyn MatchHistory>,
}

impl ContextBuilder {
    pub fn new(history: Arc<dyn MatchHistory>) -> Self {
        Self { history }
    }

    pub fn build(&self, match_details: &MatchDetails) -> RoutingContext {
        let home = match_details.team_home.as_str();
        let away = match_details.team_away.as_str();

        let head_to_head_matches = self
            .history
            .head_to_head(home, away)
            .unwrap_or_else(|| standin_head_to_head(home, away));

        RoutingContext {
            rivalry_score: rivalry_score(home, away),
            match_importance: match_importance(match_details),
            season_stage: SeasonStage::from_month(match_details.month()),
            head_to_head_matches,
            form_differential: self.history.form_differential(home, away),
            data_availability: DataAvailability {
                historical_matches: self.history.has_historical_data(home, away),
                player_stats: true,
                odds_data: match_details.odds.is_some(),
                venue_data: match_details.venue.is_some(),
                injury_reports: false,
            },
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(Arc::new(NoHistory))
    }
}

/// Rivalry intensity between two teams, 0.0 for unknown pairs.
pub fn rivalry_score(team_a: &str, team_b: &str) -> f64 {
    RIVALRIES
        .iter()
        .find(|(x, y, _)| (*x == team_a && *y == team_b) || (*x == team_b && *y == team_a))
        .map(|(_, _, score)| *score)
        .unwrap_or(0.0)
}

/// Importance of a match in [0, 1].
///
/// Late rounds raise the base of 0.5; from September on the result is
/// raised to at least 0.8 but never lowered.
pub fn match_importance(match_details: &MatchDetails) -> f64 {
    let mut importance: f64 = 0.5;
    if let Some(round) = match_details.round_number {
        if round > 20 {
            importance = 0.9;
        } else if round > 15 {
            importance = 0.7;
        }
    }

    if match_details.month() >= 9 {
        importance = importance.max(0.8);
    }

    importance.clamp(0.0, 1.0)
}

/// Deterministic head-to-head estimate in `[10, 30)` for pairs without history.
///
/// FNV-1a over the unordered team pair, so both fixture orders agree.
fn standin_head_to_head(team_a: &str, team_b: &str) -> u32 {
    let (first, second) = if team_a <= team_b { (team_a, team_b) } else { (team_b, team_a) };

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in first.bytes().chain(std::iter::once(0)).chain(second.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }

    H2H_STANDIN_MIN + (hash % u64::from(H2H_STANDIN_MAX - H2H_STANDIN_MIN)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn match_in(month: u32, round: Option<u32>) -> MatchDetails {
        let mut details = MatchDetails::new(
            "Brisbane Broncos",
            "Sydney Roosters",
            Utc.with_ymd_and_hms(2024, month, 14, 9, 0, 0).unwrap(),
        );
        details.round_number = round;
        details
    }

    struct FixedHistory {
        h2h: Option<u32>,
        form: f64,
    }

    impl MatchHistory for FixedHistory {
        fn head_to_head(&self, _: &str, _: &str) -> Option<u32> {
            self.h2h
        }

        fn form_differential(&self, _: &str, _: &str) -> f64 {
            self.form
        }

        fn has_historical_data(&self, _: &str, _: &str) -> bool {
            self.h2h.is_some()
        }
    }

    #[rstest]
    #[case(1, SeasonStage::OffSeason)]
    #[case(2, SeasonStage::OffSeason)]
    #[case(3, SeasonStage::Early)]
    #[case(4, SeasonStage::Early)]
    #[case(5, SeasonStage::Early)]
    #[case(6, SeasonStage::Mid)]
    #[case(7, SeasonStage::Mid)]
    #[case(8, SeasonStage::Mid)]
    #[case(9, SeasonStage::Finals)]
    #[case(10, SeasonStage::GrandFinal)]
    #[case(11, SeasonStage::OffSeason)]
    #[case(12, SeasonStage::OffSeason)]
    fn test_season_stage_by_month(#[case] month: u32, #[case] expected: SeasonStage) {
        assert_eq!(SeasonStage::from_month(month), expected);
        let context = ContextBuilder::default().build(&match_in(month, None));
        assert_eq!(context.season_stage, expected);
    }

    #[rstest]
    #[case(4, None, 0.5)]
    #[case(4, Some(10), 0.5)]
    #[case(7, Some(16), 0.7)]
    #[case(7, Some(21), 0.9)]
    #[case(9, None, 0.8)]
    #[case(9, Some(16), 0.8)]
    #[case(9, Some(22), 0.9)]
    #[case(12, Some(3), 0.8)]
    fn test_match_importance(
        #[case] month: u32,
        #[case] round: Option<u32>,
        #[case] expected: f64,
    ) {
        let importance = match_importance(&match_in(month, round));
        assert!((importance - expected).abs() < 1e-12, "got {importance}");
    }

    #[test]
    fn test_importance_in_range_and_floored_late_in_year() {
        for month in 1..=12 {
            for round in [None, Some(1), Some(16), Some(21), Some(30)] {
                let importance = match_importance(&match_in(month, round));
                assert!((0.0..=1.0).contains(&importance));
                if month >= 9 {
                    assert!(importance >= 0.8);
                }
            }
        }
    }

    #[test]
    fn test_late_round_finals_not_lowered_by_floor() {
        let details = MatchDetails::new(
            "Brisbane Broncos",
            "Sydney Roosters",
            Utc.with_ymd_and_hms(2024, 9, 6, 9, 0, 0).unwrap(),
        )
        .with_round(22);
        let context = ContextBuilder::default().build(&details);
        assert_eq!(context.match_importance, 0.9);
        assert_eq!(context.rivalry_score, 0.0);
    }

    #[test]
    fn test_rivalry_is_symmetric() {
        assert_eq!(rivalry_score("Sydney Roosters", "South Sydney Rabbitohs"), 0.9);
        assert_eq!(rivalry_score("South Sydney Rabbitohs", "Sydney Roosters"), 0.9);
        assert_eq!(rivalry_score("Melbourne Storm", "Brisbane Broncos"), 0.8);
        assert_eq!(rivalry_score("Gold Coast Titans", "Newcastle Knights"), 0.0);
    }

    #[test]
    fn test_standin_head_to_head_is_stable_and_bounded() {
        let a = standin_head_to_head("Penrith Panthers", "Parramatta Eels");
        let b = standin_head_to_head("Parramatta Eels", "Penrith Panthers");
        assert_eq!(a, b);
        assert!((H2H_STANDIN_MIN..H2H_STANDIN_MAX).contains(&a));

        for (x, y) in [("A", "B"), ("Cowboys", "Titans"), ("", "")] {
            let h = standin_head_to_head(x, y);
            assert!((H2H_STANDIN_MIN..H2H_STANDIN_MAX).contains(&h));
        }
    }

    #[test]
    fn test_history_provider_is_used() {
        let builder = ContextBuilder::new(Arc::new(FixedHistory { h2h: Some(3), form: -0.4 }));
        let context = builder.build(&match_in(7, None));
        assert_eq!(context.head_to_head_matches, 3);
        assert_eq!(context.form_differential, -0.4);
        assert!(context.data_availability.historical_matches);

        let sparse = ContextBuilder::new(Arc::new(FixedHistory { h2h: None, form: 0.0 }));
        let context = sparse.build(&match_in(7, None));
        assert!(!context.data_availability.historical_matches);
        assert!((H2H_STANDIN_MIN..H2H_STANDIN_MAX).contains(&context.head_to_head_matches));
    }

    #[test]
    fn test_data_availability_follows_optional_fields() {
        let bare = ContextBuilder::default().build(&match_in(6, None));
        assert!(!bare.data_availability.odds_data);
        assert!(!bare.data_availability.venue_data);
        assert!(!bare.data_availability.injury_reports);
        assert!(bare.data_availability.player_stats);

        let rich = ContextBuilder::default().build(
            &match_in(6, None)
                .with_venue("Suncorp Stadium")
                .with_odds(predict_common::Odds {
                    home: 1.9,
                    away: 1.9,
                    draw: None,
                }),
        );
        assert!(rich.data_availability.odds_data);
        assert!(rich.data_availability.venue_data);
        assert!(!rich.data_availability.all());
    }

    #[test]
    fn test_summary_fields() {
        let summary = ContextBuilder::default().build(&match_in(10, Some(27))).summary();
        assert_eq!(summary["season_stage"], "grand_final");
        assert_eq!(summary["match_importance"], 0.9);
        assert!(summary["h2h_matches"].is_u64());
    }
}
