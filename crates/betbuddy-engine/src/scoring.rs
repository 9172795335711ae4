// Scoring engine: pure functions from feature records and an explicit
// weight vector to sub-scores and composite scores.
//
// NRFI sub-scores are relative to league baselines, so 1.0 is a league
// average pitcher or lineup. Every ratio is oriented so that a higher value
// means more first-inning runs; lower composite scores favour NRFI.

use std::cmp::Ordering;

use betbuddy_core::config::Config;
use betbuddy_core::model::{
    BatSide, CareerMatchup, Form, FormFactor, GamePrediction, Hand, HitterPrediction, HittingScores, HittingStats,
    LocalFactors, NrfiScores, PitchingStats, Side, Splits, TeamOffenseStats,
};
use betbuddy_core::weights::{FormTable, WeightVector};

// ---------------------------------------------------------------------------
// League baselines
// ---------------------------------------------------------------------------

const LEAGUE_ERA: f64 = 4.20;
const LEAGUE_WHIP: f64 = 1.30;
const LEAGUE_K_PER_9: f64 = 8.6;
const LEAGUE_HR_PER_9: f64 = 1.2;
const LEAGUE_FIRST_INNING_RATE: f64 = 0.27;

const LEAGUE_AVG: f64 = 0.245;
const LEAGUE_OPS: f64 = 0.715;
const LEAGUE_RUNS_PER_GAME: f64 = 4.5;
const LEAGUE_K_RATE: f64 = 0.225;
const LEAGUE_HR_RATE: f64 = 0.030;
const LEAGUE_TEAM_FIRST_INNING_RATE: f64 = 0.27;

/// Cap on any single relative ratio.
const MAX_RATIO: f64 = 3.0;

/// Neutral multiplier used for roofed parks and missing forecasts.
pub const NEUTRAL_WEATHER: f64 = 1.0;

/// `value / baseline` clamped to `[0, MAX_RATIO]`; undefined ratios are neutral.
fn relative(value: f64, baseline: f64) -> f64 {
    let r = value / baseline;
    if r.is_finite() {
        r.clamp(0.0, MAX_RATIO)
    } else {
        1.0
    }
}

/// Inverse ratio for stats where a higher value suppresses runs.
fn inverse_relative(value: f64, baseline: f64) -> f64 {
    if value <= 0.0 {
        return MAX_RATIO;
    }
    relative(baseline, value)
}

fn dot<const N: usize>(weights: [f64; N], parts: [f64; N]) -> f64 {
    weights.iter().zip(parts).map(|(w, p)| w * p).sum()
}

// ---------------------------------------------------------------------------
// NRFI
// ---------------------------------------------------------------------------

/// Weighted pitching score. Lower is better for NRFI. Home pitchers get the
/// configured home edge.
pub fn pitching_score(stats: &PitchingStats, side: Side, weights: &WeightVector) -> f64 {
    let parts = [
        relative(stats.era, LEAGUE_ERA),
        relative(stats.whip, LEAGUE_WHIP),
        inverse_relative(stats.strikeouts_per_9, LEAGUE_K_PER_9),
        relative(stats.home_runs_per_9, LEAGUE_HR_PER_9),
        relative(stats.first_inning_run_rate, LEAGUE_FIRST_INNING_RATE),
    ];
    let edge = weights.blend.home_edge;
    let venue = match side {
        Side::Home => 1.0 - edge,
        Side::Away => 1.0 + edge,
    };
    dot(weights.pitching.to_array(), parts) * venue
}

/// Weighted team offense score, same polarity as [`pitching_score`]. Home
/// lineups get the configured home edge.
pub fn team_hitting_score(stats: &TeamOffenseStats, side: Side, weights: &WeightVector) -> f64 {
    let parts = [
        relative(stats.batting_average, LEAGUE_AVG),
        relative(stats.ops, LEAGUE_OPS),
        relative(stats.runs_per_game, LEAGUE_RUNS_PER_GAME),
        inverse_relative(stats.strikeout_rate, LEAGUE_K_RATE),
        relative(stats.home_run_rate, LEAGUE_HR_RATE),
        relative(stats.first_inning_scoring_rate, LEAGUE_TEAM_FIRST_INNING_RATE),
    ];
    let edge = weights.blend.home_edge;
    let venue = match side {
        Side::Home => 1.0 + edge,
        Side::Away => 1.0 - edge,
    };
    dot(weights.team_offense.to_array(), parts) * venue
}

/// One half inning: a pitcher against the opposing lineup.
pub fn half_inning_score(pitching: f64, offense: f64, weights: &WeightVector) -> f64 {
    let share = weights.blend.pitcher_share;
    share * pitching + (1.0 - share) * offense
}

/// Weather multiplier for run scoring. Roofed parks and missing forecasts
/// are neutral.
pub fn weather_factor(local: &LocalFactors) -> f64 {
    if local.roofed {
        return NEUTRAL_WEATHER;
    }
    let Some(weather) = &local.weather else {
        return NEUTRAL_WEATHER;
    };
    let mut factor = NEUTRAL_WEATHER;
    if weather.temperature_f > 85.0 {
        factor += 0.03;
    } else if weather.temperature_f < 50.0 {
        factor -= 0.03;
    }
    if weather.wind_mph > 15.0 {
        factor += 0.02;
    }
    if is_wet(weather.code) {
        factor -= 0.02;
    }
    factor
}

/// Rain, drizzle, sleet and thunder condition codes.
fn is_wet(code: u32) -> bool {
    matches!(code, 1063 | 1087 | 1150..=1201 | 1240..=1246 | 1273..=1276)
}

/// Composite NRFI score: the mean of both half innings scaled by the park
/// factor (100 is neutral) and the weather multiplier.
pub fn overall_nrfi_score(top_first: f64, bottom_first: f64, ballpark_factor: f64, weather_factor: f64) -> f64 {
    (top_first + bottom_first) / 2.0 * (ballpark_factor / 100.0) * weather_factor
}

/// Score one game from both starters, both lineups and local factors.
pub fn score_game(
    home_pitcher: &PitchingStats,
    away_pitcher: &PitchingStats,
    home_offense: &TeamOffenseStats,
    away_offense: &TeamOffenseStats,
    local: &LocalFactors,
    weights: &WeightVector,
) -> NrfiScores {
    let home_pitching = pitching_score(home_pitcher, Side::Home, weights);
    let away_pitching = pitching_score(away_pitcher, Side::Away, weights);
    let home_offense = team_hitting_score(home_offense, Side::Home, weights);
    let away_offense = team_hitting_score(away_offense, Side::Away, weights);
    let top_first = half_inning_score(home_pitching, away_offense, weights);
    let bottom_first = half_inning_score(away_pitching, home_offense, weights);
    let weather = weather_factor(local);
    NrfiScores {
        home_pitching,
        away_pitching,
        home_offense,
        away_offense,
        top_first,
        bottom_first,
        weather_factor: weather,
        overall: overall_nrfi_score(top_first, bottom_first, local.ballpark_factor, weather),
    }
}

/// Recompute a stored prediction's scores under `weights`.
pub fn rescore_game(prediction: &GamePrediction, weights: &WeightVector) -> GamePrediction {
    let scores = score_game(
        &prediction.home.pitcher.stats,
        &prediction.away.pitcher.stats,
        &prediction.home.offense.stats,
        &prediction.away.offense.stats,
        &prediction.local,
        weights,
    );
    GamePrediction {
        scores,
        ..prediction.clone()
    }
}

// ---------------------------------------------------------------------------
// Hitting
// ---------------------------------------------------------------------------

/// Minimum plate appearances before recent form or career history counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormGates {
    pub hot_cold_min_pa: u32,
    pub career_min_pa: u32,
}

impl FormGates {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hot_cold_min_pa: config.thresholds.min_pa_hot_cold,
            career_min_pa: config.thresholds.min_pa_career,
        }
    }
}

impl Default for FormGates {
    fn default() -> Self {
        Self {
            hot_cold_min_pa: 20,
            career_min_pa: 7,
        }
    }
}

/// Blend the hitter's average against the pitcher's hand with the pitcher's
/// average against the side the hitter actually bats from.
pub fn adjusted_batting_average(
    hitter: &Splits,
    pitcher: &Splits,
    bat_side: BatSide,
    pitch_hand: Hand,
    weights: &WeightVector,
) -> f64 {
    let share = weights.hitting.batter_share;
    let batter = hitter.against(pitch_hand).average;
    let against = pitcher.against(bat_side.effective_against(pitch_hand)).average;
    share * batter + (1.0 - share) * against
}

fn classify(table: &FormTable, min_pa: u32, plate_appearances: u32, average: f64) -> FormFactor {
    let (form, weight) = if plate_appearances < min_pa {
        (Form::Average, table.weight_of(Form::Average))
    } else {
        table.classify(average)
    };
    FormFactor { form, weight }
}

/// Recent form bin. Below the plate-appearance gate the neutral Average bin
/// is used.
pub fn hot_cold_factor(plate_appearances: u32, average: f64, gates: FormGates, weights: &WeightVector) -> FormFactor {
    classify(&weights.hitting.hot_cold, gates.hot_cold_min_pa, plate_appearances, average)
}

/// Career-versus-pitcher bin, gated like [`hot_cold_factor`].
pub fn career_stats_factor(plate_appearances: u32, average: f64, gates: FormGates, weights: &WeightVector) -> FormFactor {
    classify(&weights.hitting.career, gates.career_min_pa, plate_appearances, average)
}

/// Composite hitting score. Higher is better.
pub fn overall_hitting_score(
    adjusted_ba: f64,
    hot_cold: FormFactor,
    career: FormFactor,
    weather_factor: f64,
    ballpark_factor: f64,
) -> f64 {
    adjusted_ba * hot_cold.weight * career.weight * weather_factor * (ballpark_factor / 100.0)
}

/// Everything a hitter row is scored from.
#[derive(Debug, Clone, Copy)]
pub struct HitterInputs<'a> {
    pub splits: &'a Splits,
    pub pitcher_splits: &'a Splits,
    pub bat_side: BatSide,
    pub pitch_hand: Hand,
    pub recent: Option<&'a HittingStats>,
    pub career: Option<&'a CareerMatchup>,
    pub local: &'a LocalFactors,
}

impl<'a> HitterInputs<'a> {
    pub fn of(prediction: &'a HitterPrediction) -> Self {
        Self {
            splits: &prediction.splits.stats,
            pitcher_splits: &prediction.pitcher_splits.stats,
            bat_side: prediction.bat_side,
            pitch_hand: prediction.pitch_hand,
            recent: prediction.recent.as_ref().map(|r| &r.stats),
            career: prediction.career.as_ref().map(|c| &c.stats),
            local: &prediction.local,
        }
    }
}

/// Sub-scores and composite for one hitter against one pitcher. A missing
/// recent or career line is scored as a zero-PA sample.
pub fn score_hitter(inputs: &HitterInputs<'_>, gates: FormGates, weights: &WeightVector) -> HittingScores {
    let adjusted_ba = adjusted_batting_average(
        inputs.splits,
        inputs.pitcher_splits,
        inputs.bat_side,
        inputs.pitch_hand,
        weights,
    );
    let (recent_pa, recent_avg) = inputs
        .recent
        .map_or((0, 0.0), |r| (r.plate_appearances, r.batting_average));
    let (career_pa, career_avg) = inputs
        .career
        .map_or((0, 0.0), |c| (c.plate_appearances, c.batting_average));
    let hot_cold = hot_cold_factor(recent_pa, recent_avg, gates, weights);
    let career = career_stats_factor(career_pa, career_avg, gates, weights);
    let weather = weather_factor(inputs.local);
    HittingScores {
        adjusted_ba,
        hot_cold,
        career,
        weather_factor: weather,
        overall: overall_hitting_score(adjusted_ba, hot_cold, career, weather, inputs.local.ballpark_factor),
    }
}

/// Recompute a stored hitter row's scores under `weights`.
pub fn rescore_hitter(prediction: &HitterPrediction, gates: FormGates, weights: &WeightVector) -> HitterPrediction {
    HitterPrediction {
        scores: score_hitter(&HitterInputs::of(prediction), gates, weights),
        ..prediction.clone()
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// NRFI order: ascending overall score, ties by game id.
pub fn nrfi_order(a: &GamePrediction, b: &GamePrediction) -> Ordering {
    a.scores
        .overall
        .total_cmp(&b.scores.overall)
        .then(a.game_id.cmp(&b.game_id))
}

/// Hitting order: descending overall score, ties by hitter id then game id.
pub fn hitting_order(a: &HitterPrediction, b: &HitterPrediction) -> Ordering {
    b.scores
        .overall
        .total_cmp(&a.scores.overall)
        .then(a.hitter.id.cmp(&b.hitter.id))
        .then(a.game_id.cmp(&b.game_id))
}
