// Prediction builder: joins a day's schedule with the stat aggregator and
// the scoring engine to produce the ranked NRFI and hitting sets.
//
// Rows with missing or insufficient data are dropped one at a time; only a
// failed schedule lookup aborts a run.

pub mod hitting;
pub mod nrfi;
pub mod schedule;

use chrono::NaiveDate;
use tracing::info;

use betbuddy_core::config::Config;
use betbuddy_core::model::{DateWindow, GamePrediction, HitterPrediction};
use betbuddy_core::stats_api::{StatsFeed, UpstreamError};
use betbuddy_core::weather::WeatherClient;
use betbuddy_core::weights::WeightVector;

use crate::aggregator::{SampleRules, StatAggregator};
use crate::scoring::FormGates;

/// Both ranked sets produced for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayPredictions {
    pub date: NaiveDate,
    /// Ascending by overall NRFI score.
    pub nrfi: Vec<GamePrediction>,
    /// Descending by overall hitting score.
    pub hitting: Vec<HitterPrediction>,
}

pub struct Predictor<F> {
    aggregator: StatAggregator<F>,
    weather: WeatherClient,
    weights: WeightVector,
    gates: FormGates,
    season: i32,
    opening_day: NaiveDate,
}

impl<F: StatsFeed> Predictor<F> {
    pub fn new(
        aggregator: StatAggregator<F>,
        weather: WeatherClient,
        weights: WeightVector,
        gates: FormGates,
        season: i32,
        opening_day: NaiveDate,
    ) -> Self {
        Self {
            aggregator,
            weather,
            weights,
            gates,
            season,
            opening_day,
        }
    }

    /// Wire a predictor from configuration with the given active weights.
    pub fn from_config(feed: F, config: &Config, weights: WeightVector) -> Self {
        Self::new(
            StatAggregator::new(feed, SampleRules::from_config(config)),
            WeatherClient::from_config(config),
            weights,
            FormGates::from_config(config),
            config.season.year,
            config.season.opening_day,
        )
    }

    pub fn aggregator(&self) -> &StatAggregator<F> {
        &self.aggregator
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    /// `[opening_day, date)`.
    pub fn season_window(&self, date: NaiveDate) -> DateWindow {
        DateWindow::before(self.opening_day, date)
    }

    /// Build both prediction sets for `date`.
    pub async fn run_day(&self, date: NaiveDate) -> Result<DayPredictions, UpstreamError> {
        let schedule = self.build_schedule(date).await?;
        let nrfi = self.build_nrfi(date, &schedule).await;
        let hitting = self.build_hitting(date, &schedule).await;
        info!(
            "{date}: {} games scheduled, {} NRFI rows, {} hitting rows (weights v{})",
            schedule.len(),
            nrfi.len(),
            hitting.len(),
            self.weights.version
        );
        Ok(DayPredictions { date, nrfi, hitting })
    }
}
