// Value objects passed between the aggregation, prediction, review and
// backtest stages.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

pub type PlayerId = u32;
pub type TeamId = u32;
pub type GameId = u64;

// ---------------------------------------------------------------------------
// Identity and handedness
// ---------------------------------------------------------------------------

/// Which half of the matchup an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Home => "Home",
            Side::Away => "Away",
        }
    }
}

/// Throwing hand of a pitcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    /// Parse the upstream hand code (`"L"` / `"R"`).
    pub fn from_code(code: &str) -> Option<Hand> {
        match code.trim() {
            "L" => Some(Hand::Left),
            "R" => Some(Hand::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }
}

/// The side of the plate a hitter bats from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatSide {
    Left,
    Right,
    Switch,
}

impl BatSide {
    /// Parse the upstream bat-side code (`"L"` / `"R"` / `"S"`).
    pub fn from_code(code: &str) -> Option<BatSide> {
        match code.trim() {
            "L" => Some(BatSide::Left),
            "R" => Some(BatSide::Right),
            "S" => Some(BatSide::Switch),
            _ => None,
        }
    }

    /// The side the hitter actually stands on against a pitcher throwing
    /// with `pitch_hand`. Switch hitters take the opposite side.
    pub fn effective_against(self, pitch_hand: Hand) -> Hand {
        match self {
            BatSide::Left => Hand::Left,
            BatSide::Right => Hand::Right,
            BatSide::Switch => pitch_hand.opposite(),
        }
    }
}

/// Core player identity. Stat capabilities are attached separately by the
/// aggregator that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

/// Handedness capability of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handedness {
    pub bat_side: BatSide,
    pub pitch_hand: Hand,
}

/// The kind of entity a feature record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Pitcher,
    Hitter,
    Team,
}

/// The entity a feature record was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: u32,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Date windows
// ---------------------------------------------------------------------------

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Everything from `start` up to, but excluding, `date`.
    pub fn before(start: NaiveDate, date: NaiveDate) -> Self {
        Self { start, end: date }
    }

    /// Last day covered by the window (the upstream provider takes
    /// inclusive date ranges).
    pub fn last_day(&self) -> NaiveDate {
        self.end - Duration::days(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }
}

// ---------------------------------------------------------------------------
// Feature records
// ---------------------------------------------------------------------------

/// Named numeric fields of a stats payload, used for export and logging.
pub trait NamedFields {
    fn fields(&self) -> Vec<(&'static str, f64)>;
}

/// A complete, immutable set of statistics for one entity over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord<S> {
    pub entity: EntityRef,
    pub window: DateWindow,
    pub stats: S,
}

impl<S: NamedFields> FeatureRecord<S> {
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        self.stats.fields()
    }
}

/// Why an aggregation produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyReason {
    /// The upstream provider does not recognise the identifier.
    UnknownEntity,
    /// The entity has no recorded games in the window.
    NoGamesInWindow,
    /// The sample exists but is below the entity's minimum.
    BelowMinimumSample { required: u32, found: u32 },
    /// A required field was absent or unparseable.
    MissingField(String),
    /// The expanding window search hit its maximum lookback.
    WindowExhausted,
}

/// Result of an aggregation: a complete record or an explicit empty marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate<S> {
    Complete(FeatureRecord<S>),
    Empty(EmptyReason),
}

impl<S> Aggregate<S> {
    pub fn into_record(self) -> Option<FeatureRecord<S>> {
        match self {
            Aggregate::Complete(record) => Some(record),
            Aggregate::Empty(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Aggregate::Empty(_))
    }

    pub fn map<T>(self, f: impl FnOnce(S) -> T) -> Aggregate<T> {
        match self {
            Aggregate::Complete(record) => Aggregate::Complete(FeatureRecord {
                entity: record.entity,
                window: record.window,
                stats: f(record.stats),
            }),
            Aggregate::Empty(reason) => Aggregate::Empty(reason),
        }
    }
}

/// Season or date-range pitching line for a starter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchingStats {
    pub games_started: u32,
    pub innings_pitched: f64,
    pub wins: u32,
    pub losses: u32,
    pub era: f64,
    pub whip: f64,
    pub strikeouts_per_9: f64,
    pub home_runs_per_9: f64,
    /// Share of starts in the window where the pitcher allowed a first-inning run.
    pub first_inning_run_rate: f64,
}

impl NamedFields for PitchingStats {
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("gamesStarted", self.games_started as f64),
            ("inningsPitched", self.innings_pitched),
            ("wins", self.wins as f64),
            ("losses", self.losses as f64),
            ("ERA", self.era),
            ("WHIP", self.whip),
            ("strikeoutsPer9", self.strikeouts_per_9),
            ("homeRunsPer9", self.home_runs_per_9),
            ("firstInningRunRate", self.first_inning_run_rate),
        ]
    }
}

/// Team offensive production over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamOffenseStats {
    pub games_played: u32,
    pub runs_per_game: f64,
    pub batting_average: f64,
    pub ops: f64,
    pub strikeout_rate: f64,
    pub home_run_rate: f64,
    /// Share of final games in the window where the team scored in the first inning.
    pub first_inning_scoring_rate: f64,
}

impl NamedFields for TeamOffenseStats {
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("gamesPlayed", self.games_played as f64),
            ("runsPerGame", self.runs_per_game),
            ("battingAverage", self.batting_average),
            ("OPS", self.ops),
            ("strikeoutPercentage", self.strikeout_rate),
            ("homerunPercentage", self.home_run_rate),
            ("firstInningScoringRate", self.first_inning_scoring_rate),
        ]
    }
}

/// Individual hitting line over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HittingStats {
    pub games_played: u32,
    pub plate_appearances: u32,
    pub hits: u32,
    pub batting_average: f64,
    pub obp: f64,
    pub ops: f64,
    pub home_runs: u32,
}

impl NamedFields for HittingStats {
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("gamesPlayed", self.games_played as f64),
            ("plateAppearances", self.plate_appearances as f64),
            ("hits", self.hits as f64),
            ("battingAverage", self.batting_average),
            ("OBP", self.obp),
            ("OPS", self.ops),
            ("homeRuns", self.home_runs as f64),
        ]
    }
}

/// One side of a left/right split. For hitters `average` is the batting
/// average; for pitchers it is the batting average against and `sample` is
/// batters faced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitLine {
    pub sample: u32,
    pub average: f64,
}

/// Left/right splits. Complete only when both sides are present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    pub vs_left: SplitLine,
    pub vs_right: SplitLine,
}

impl Splits {
    pub fn against(&self, hand: Hand) -> SplitLine {
        match hand {
            Hand::Left => self.vs_left,
            Hand::Right => self.vs_right,
        }
    }
}

impl NamedFields for Splits {
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("vsLeftSample", self.vs_left.sample as f64),
            ("vsLeftAverage", self.vs_left.average),
            ("vsRightSample", self.vs_right.sample as f64),
            ("vsRightAverage", self.vs_right.average),
        ]
    }
}

/// A hitter's career line against one specific pitcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CareerMatchup {
    pub plate_appearances: u32,
    pub hits: u32,
    pub batting_average: f64,
}

impl NamedFields for CareerMatchup {
    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("careerPlateAppearances", self.plate_appearances as f64),
            ("careerHits", self.hits as f64),
            ("careerBattingAverage", self.batting_average),
        ]
    }
}

// ---------------------------------------------------------------------------
// Schedule and local factors
// ---------------------------------------------------------------------------

/// Wins and losses on a given date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub wins: u32,
    pub losses: u32,
}

impl std::fmt::Display for TeamRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.wins, self.losses)
    }
}

/// Forecast conditions at first pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub condition: String,
    pub code: u32,
    pub temperature_f: f64,
    pub wind_mph: f64,
}

/// Ballpark and weather context for one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFactors {
    pub stadium: String,
    /// Park run factor where 100 is neutral.
    pub ballpark_factor: f64,
    pub roofed: bool,
    pub weather: Option<WeatherReport>,
}

/// One team's slot in a scheduled game. `probable_pitcher` is `None` while
/// the starter is still to be announced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSlot {
    pub team_id: TeamId,
    pub team_name: String,
    pub record: Option<TeamRecord>,
    pub probable_pitcher: Option<Player>,
}

/// A game on the day's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub game_id: GameId,
    pub date: NaiveDate,
    /// UTC start time as reported upstream (e.g. `2024-05-01T23:05:00Z`).
    pub start_time: Option<String>,
    pub home: TeamSlot,
    pub away: TeamSlot,
    pub local: LocalFactors,
}

impl ScheduledGame {
    pub fn slot(&self, side: Side) -> &TeamSlot {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    /// Which side `team_id` plays on in this game, if any.
    pub fn side_of(&self, team_id: TeamId) -> Option<Side> {
        if self.home.team_id == team_id {
            Some(Side::Home)
        } else if self.away.team_id == team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn both_pitchers_announced(&self) -> bool {
        self.home.probable_pitcher.is_some() && self.away.probable_pitcher.is_some()
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// Inputs gathered for one side of an NRFI prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSide {
    pub team_id: TeamId,
    pub team_name: String,
    pub record: Option<TeamRecord>,
    pub pitcher: FeatureRecord<PitchingStats>,
    pub offense: FeatureRecord<TeamOffenseStats>,
}

/// Sub-scores and the composite for one game. Lower `overall` favours NRFI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NrfiScores {
    pub home_pitching: f64,
    pub away_pitching: f64,
    pub home_offense: f64,
    pub away_offense: f64,
    /// Home pitcher against the away lineup.
    pub top_first: f64,
    /// Away pitcher against the home lineup.
    pub bottom_first: f64,
    pub weather_factor: f64,
    pub overall: f64,
}

/// One NRFI/YRFI candidate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GamePrediction {
    pub game_id: GameId,
    pub date: NaiveDate,
    pub start_time: Option<String>,
    pub home: GameSide,
    pub away: GameSide,
    pub local: LocalFactors,
    pub scores: NrfiScores,
}

impl GamePrediction {
    pub fn side(&self, side: Side) -> &GameSide {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

/// Named hot/cold classification bins, ordered from hottest to coldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    OnFire,
    Hot,
    Average,
    Cool,
    IceCold,
}

impl Form {
    pub const ALL: [Form; 5] = [Form::OnFire, Form::Hot, Form::Average, Form::Cool, Form::IceCold];

    pub fn label(self) -> &'static str {
        match self {
            Form::OnFire => "On Fire",
            Form::Hot => "Hot",
            Form::Average => "Average",
            Form::Cool => "Cool",
            Form::IceCold => "Ice Cold",
        }
    }
}

/// A classified bin together with its configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormFactor {
    pub form: Form,
    pub weight: f64,
}

/// Sub-scores and the composite for one hitter row. Higher `overall` is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HittingScores {
    pub adjusted_ba: f64,
    pub hot_cold: FormFactor,
    pub career: FormFactor,
    pub weather_factor: f64,
    pub overall: f64,
}

/// One hitting candidate row: a (hitter, game) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitterPrediction {
    pub date: NaiveDate,
    pub game_id: GameId,
    pub hitter: Player,
    pub team_id: TeamId,
    pub team_name: String,
    pub bat_side: BatSide,
    pub pitcher: Player,
    pub pitch_hand: Hand,
    pub opponent_name: String,
    pub season: FeatureRecord<HittingStats>,
    pub splits: FeatureRecord<Splits>,
    /// Rolling last-N-games line, absent when the window search was exhausted.
    pub recent: Option<FeatureRecord<HittingStats>>,
    /// Career line against this pitcher, absent when they have never met.
    pub career: Option<FeatureRecord<CareerMatchup>>,
    pub pitcher_stats: FeatureRecord<PitchingStats>,
    pub pitcher_splits: FeatureRecord<Splits>,
    pub local: LocalFactors,
    pub scores: HittingScores,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Realised result of an NRFI/YRFI prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NrfiOutcome {
    /// Game not final yet.
    Pending,
    /// Game never completed.
    Postponed,
    Final { first_inning_runs: u32 },
}

impl NrfiOutcome {
    /// `Some(true)` when a run scored in the first inning; `None` when the
    /// outcome is not eligible for accuracy arithmetic.
    pub fn run_scored(&self) -> Option<bool> {
        match self {
            NrfiOutcome::Final { first_inning_runs } => Some(*first_inning_runs > 0),
            NrfiOutcome::Pending | NrfiOutcome::Postponed => None,
        }
    }
}

/// Hitting bet thresholds tracked by the backtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HittingThreshold {
    OverHalfHit,
    OverOneAndHalfHits,
    OverOneAndHalfHrr,
    OverTwoAndHalfHrr,
}

impl HittingThreshold {
    pub const ALL: [HittingThreshold; 4] = [
        HittingThreshold::OverHalfHit,
        HittingThreshold::OverOneAndHalfHits,
        HittingThreshold::OverOneAndHalfHrr,
        HittingThreshold::OverTwoAndHalfHrr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            HittingThreshold::OverHalfHit => "Over 0.5 Hits",
            HittingThreshold::OverOneAndHalfHits => "Over 1.5 Hits",
            HittingThreshold::OverOneAndHalfHrr => "Over 1.5 Hits+Runs+RBIs",
            HittingThreshold::OverTwoAndHalfHrr => "Over 2.5 Hits+Runs+RBIs",
        }
    }
}

/// A hitter's box-score line for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HittingLine {
    pub hits: u32,
    pub runs: u32,
    pub rbi: u32,
    pub summary: String,
}

impl HittingLine {
    /// Hits + runs + RBIs.
    pub fn hrr(&self) -> u32 {
        self.hits + self.runs + self.rbi
    }

    pub fn meets(&self, threshold: HittingThreshold) -> bool {
        match threshold {
            HittingThreshold::OverHalfHit => self.hits >= 1,
            HittingThreshold::OverOneAndHalfHits => self.hits >= 2,
            HittingThreshold::OverOneAndHalfHrr => self.hrr() >= 2,
            HittingThreshold::OverTwoAndHalfHrr => self.hrr() >= 3,
        }
    }
}

/// Realised result of a hitting prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HittingOutcome {
    Pending,
    Postponed,
    DidNotPlay,
    Played(HittingLine),
}

impl HittingOutcome {
    /// The box-score line when the outcome counts toward accuracy.
    pub fn line(&self) -> Option<&HittingLine> {
        match self {
            HittingOutcome::Played(line) => Some(line),
            _ => None,
        }
    }
}

/// A stored NRFI row with whatever outcome has been recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NrfiRow {
    pub prediction: GamePrediction,
    pub outcome: NrfiOutcome,
}

/// A stored hitting row with whatever outcome has been recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HittingRow {
    pub prediction: HitterPrediction,
    pub outcome: HittingOutcome,
}

/// All rows stored for one historical day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySet<R> {
    pub date: NaiveDate,
    pub rows: Vec<R>,
}
