// Backtest evaluator: replay stored prediction sets under a weight vector and
// tally top-K win rates per market.
//
// Pure over its inputs. The same corpus, weights and policy always give the
// same report.

use serde::Serialize;
use tracing::debug;

use betbuddy_core::config::Config;
use betbuddy_core::model::{DaySet, HittingRow, HittingThreshold, NrfiRow};
use betbuddy_core::weights::WeightVector;

use crate::scoring::{hitting_order, nrfi_order, rescore_game, rescore_hitter, FormGates};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Selection sizes and day-eligibility minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktestPolicy {
    pub top_nrfi: usize,
    pub top_hitting: usize,
    pub min_nrfi_bets: usize,
    pub min_hitting_bets: usize,
    pub gates: FormGates,
}

impl BacktestPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_nrfi: config.backtest.top_nrfi,
            top_hitting: config.backtest.top_hitting,
            min_nrfi_bets: config.backtest.min_nrfi_bets,
            min_hitting_bets: config.backtest.min_hitting_bets,
            gates: FormGates::from_config(config),
        }
    }

    /// Minimum NRFI rows for a day to count: room for K NRFI and K YRFI picks.
    pub fn nrfi_day_minimum(&self) -> usize {
        (2 * self.top_nrfi).max(self.min_nrfi_bets)
    }
}

impl Default for BacktestPolicy {
    fn default() -> Self {
        Self {
            top_nrfi: 1,
            top_hitting: 1,
            min_nrfi_bets: 7,
            min_hitting_bets: 40,
            gates: FormGates::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Eligible picks and wins for one market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MarketTally {
    pub picks: usize,
    pub wins: usize,
}

impl MarketTally {
    fn record(&mut self, won: bool) {
        self.picks += 1;
        if won {
            self.wins += 1;
        }
    }

    /// `wins / picks`, or 0 with no eligible picks.
    pub fn rate(&self) -> f64 {
        if self.picks == 0 {
            0.0
        } else {
            self.wins as f64 / self.picks as f64
        }
    }
}

/// Days that met or missed the eligibility minimum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub included: usize,
    pub excluded: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    pub top_nrfi: usize,
    pub top_hitting: usize,
    pub nrfi: MarketTally,
    pub yrfi: MarketTally,
    /// Indexed like [`HittingThreshold::ALL`].
    pub hitting: [MarketTally; 4],
    pub nrfi_days: DayCounts,
    pub hitting_days: DayCounts,
}

fn threshold_index(threshold: HittingThreshold) -> usize {
    match threshold {
        HittingThreshold::OverHalfHit => 0,
        HittingThreshold::OverOneAndHalfHits => 1,
        HittingThreshold::OverOneAndHalfHrr => 2,
        HittingThreshold::OverTwoAndHalfHrr => 3,
    }
}

impl AccuracyReport {
    fn empty(policy: &BacktestPolicy) -> Self {
        Self {
            top_nrfi: policy.top_nrfi,
            top_hitting: policy.top_hitting,
            nrfi: MarketTally::default(),
            yrfi: MarketTally::default(),
            hitting: [MarketTally::default(); 4],
            nrfi_days: DayCounts::default(),
            hitting_days: DayCounts::default(),
        }
    }

    pub fn hitting(&self, threshold: HittingThreshold) -> MarketTally {
        self.hitting[threshold_index(threshold)]
    }

    pub fn nrfi_rate(&self) -> f64 {
        self.nrfi.rate()
    }

    pub fn yrfi_rate(&self) -> f64 {
        self.yrfi.rate()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Historical rows to replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub nrfi: Vec<DaySet<NrfiRow>>,
    pub hitting: Vec<DaySet<HittingRow>>,
}

impl Corpus {
    pub fn is_empty(&self) -> bool {
        self.nrfi.is_empty() && self.hitting.is_empty()
    }
}

/// Replay the corpus under `weights`.
///
/// NRFI days are re-scored and re-sorted; the first K rows are NRFI picks
/// and the last K are YRFI picks. Hitting days contribute their top K rows
/// to every threshold. Picks without a settled outcome (pending, postponed,
/// did not play) keep their slot but are not counted.
pub fn evaluate(corpus: &Corpus, weights: &WeightVector, policy: &BacktestPolicy) -> AccuracyReport {
    let mut report = AccuracyReport::empty(policy);
    for day in &corpus.nrfi {
        evaluate_nrfi_day(day, weights, policy, &mut report);
    }
    for day in &corpus.hitting {
        evaluate_hitting_day(day, weights, policy, &mut report);
    }
    report
}

fn evaluate_nrfi_day(day: &DaySet<NrfiRow>, weights: &WeightVector, policy: &BacktestPolicy, report: &mut AccuracyReport) {
    let k = policy.top_nrfi;
    if day.rows.len() < policy.nrfi_day_minimum() {
        debug!("{}: {} NRFI rows, day excluded", day.date, day.rows.len());
        report.nrfi_days.excluded += 1;
        return;
    }
    report.nrfi_days.included += 1;

    let mut rows: Vec<NrfiRow> = day
        .rows
        .iter()
        .map(|row| NrfiRow {
            prediction: rescore_game(&row.prediction, weights),
            outcome: row.outcome,
        })
        .collect();
    rows.sort_by(|a, b| nrfi_order(&a.prediction, &b.prediction));

    for row in &rows[..k] {
        if let Some(scored) = row.outcome.run_scored() {
            report.nrfi.record(!scored);
        }
    }
    for row in &rows[rows.len() - k..] {
        if let Some(scored) = row.outcome.run_scored() {
            report.yrfi.record(scored);
        }
    }
}

fn evaluate_hitting_day(
    day: &DaySet<HittingRow>,
    weights: &WeightVector,
    policy: &BacktestPolicy,
    report: &mut AccuracyReport,
) {
    if day.rows.len() < policy.min_hitting_bets.max(policy.top_hitting) {
        debug!("{}: {} hitting rows, day excluded", day.date, day.rows.len());
        report.hitting_days.excluded += 1;
        return;
    }
    report.hitting_days.included += 1;

    let mut rows: Vec<HittingRow> = day
        .rows
        .iter()
        .map(|row| HittingRow {
            prediction: rescore_hitter(&row.prediction, policy.gates, weights),
            outcome: row.outcome.clone(),
        })
        .collect();
    rows.sort_by(|a, b| hitting_order(&a.prediction, &b.prediction));

    for row in rows.iter().take(policy.top_hitting) {
        let Some(line) = row.outcome.line() else {
            continue;
        };
        for threshold in HittingThreshold::ALL {
            report.hitting[threshold_index(threshold)].record(line.meets(threshold));
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use betbuddy_core::model::*;
    use chrono::NaiveDate;

    pub fn pitcher(era: f64) -> FeatureRecord<PitchingStats> {
        FeatureRecord {
            entity: EntityRef {
                kind: EntityKind::Pitcher,
                id: 1,
                name: "Starter".into(),
            },
            window: DateWindow::before(
                NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            ),
            stats: PitchingStats {
                games_started: 6,
                innings_pitched: 36.0,
                wins: 3,
                losses: 2,
                era,
                whip: 1.25,
                strikeouts_per_9: 9.0,
                home_runs_per_9: 1.1,
                first_inning_run_rate: 0.25,
            },
        }
    }

    pub fn offense() -> FeatureRecord<TeamOffenseStats> {
        FeatureRecord {
            entity: EntityRef {
                kind: EntityKind::Team,
                id: 100,
                name: "Lineup".into(),
            },
            window: DateWindow::before(
                NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            ),
            stats: TeamOffenseStats {
                games_played: 30,
                batting_average: 0.245,
                ops: 0.715,
                runs_per_game: 4.5,
                strikeout_rate: 0.225,
                home_run_rate: 0.03,
                first_inning_scoring_rate: 0.27,
            },
        }
    }

    /// A game whose score rises with `era`, so rows order by it.
    pub fn game(date: NaiveDate, game_id: GameId, era: f64) -> GamePrediction {
        let side = |team_id: TeamId| GameSide {
            team_id,
            team_name: format!("Team {team_id}"),
            record: None,
            pitcher: pitcher(era),
            offense: offense(),
        };
        GamePrediction {
            game_id,
            date,
            start_time: None,
            home: side(1),
            away: side(2),
            local: LocalFactors {
                stadium: "Neutral Park".into(),
                ballpark_factor: 100.0,
                roofed: true,
                weather: None,
            },
            scores: NrfiScores {
                home_pitching: 0.0,
                away_pitching: 0.0,
                home_offense: 0.0,
                away_offense: 0.0,
                top_first: 0.0,
                bottom_first: 0.0,
                weather_factor: 1.0,
                overall: 0.0,
            },
        }
    }
}
