// Stat aggregator: turns raw upstream payloads into complete feature
// records or explicit empty results.
//
// Every lookup is read-only and keyed by (entity, date range), so repeated
// calls against a memoizing feed are free and always agree.

pub mod games;
pub mod parse;
pub mod players;
pub mod teams;
pub mod window;

use serde_json::Value;

use betbuddy_core::config::Config;
use betbuddy_core::model::{
    Aggregate, DateWindow, EmptyReason, EntityKind, EntityRef, FeatureRecord, HittingStats, PitchingStats,
    TeamOffenseStats,
};
use betbuddy_core::stats_api::{StatsFeed, StatsQuery, UpstreamError};

pub use games::{GameState, GameSummary, ScoringPlay};
pub use players::QualifiedHitter;
pub use window::{WindowSearch, WindowState};

// ---------------------------------------------------------------------------
// Sample rules
// ---------------------------------------------------------------------------

/// Minimum-sample rules applied before a record counts as complete.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRules {
    pub min_games_started: u32,
    /// Games required by the rolling "last N games" lookup.
    pub rolling_games: u32,
    pub initial_lag_days: u32,
    pub max_lookback_days: u32,
    pub qualified_pa_per_game: f64,
    pub min_games_played: Option<u32>,
    pub page_size: u32,
}

impl SampleRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_games_started: config.thresholds.min_games_started,
            rolling_games: config.rolling_window.games,
            initial_lag_days: config.rolling_window.initial_lag_days,
            max_lookback_days: config.rolling_window.max_lookback_days,
            qualified_pa_per_game: config.thresholds.qualified_pa_per_game,
            min_games_played: config.thresholds.min_games_played,
            page_size: config.upstream.page_size.max(1),
        }
    }
}

impl Default for SampleRules {
    fn default() -> Self {
        Self {
            min_games_started: 3,
            rolling_games: 10,
            initial_lag_days: 7,
            max_lookback_days: 21,
            qualified_pa_per_game: 3.1,
            min_games_played: None,
            page_size: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Stats of whichever entity kind was requested through [`StatAggregator::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntityStats {
    Pitching(PitchingStats),
    Hitting(HittingStats),
    TeamOffense(TeamOffenseStats),
}

pub struct StatAggregator<F> {
    feed: F,
    rules: SampleRules,
}

impl<F: StatsFeed> StatAggregator<F> {
    pub fn new(feed: F, rules: SampleRules) -> Self {
        Self { feed, rules }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn rules(&self) -> &SampleRules {
        &self.rules
    }

    /// Uniform entry point: a complete record for `id` over `window`, or an
    /// explicit empty result. Upstream failures that survived the retry
    /// policy are returned as errors.
    pub async fn fetch(
        &self,
        kind: EntityKind,
        id: u32,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<EntityStats>, UpstreamError> {
        Ok(match kind {
            EntityKind::Pitcher => self.pitching(id, season, window).await?.map(EntityStats::Pitching),
            EntityKind::Hitter => self.hitting(id, season, window).await?.map(EntityStats::Hitting),
            EntityKind::Team => self
                .team_offense(id, season, window)
                .await?
                .map(EntityStats::TeamOffense),
        })
    }

    /// Run `query`, mapping "not found" to `None`.
    pub(crate) async fn lookup(&self, query: StatsQuery) -> Result<Option<Value>, UpstreamError> {
        match self.feed.fetch_json(&query).await {
            Ok(body) => Ok(Some(body)),
            Err(UpstreamError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Wrap parsed stats into a record, or the reason they could not be parsed.
pub(crate) fn complete<S>(entity: EntityRef, window: DateWindow, stats: Result<S, EmptyReason>) -> Aggregate<S> {
    match stats {
        Ok(stats) => Aggregate::Complete(FeatureRecord { entity, window, stats }),
        Err(reason) => Aggregate::Empty(reason),
    }
}

/// Zero-safe ratio.
pub(crate) fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
