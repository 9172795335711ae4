// Schedule, standings, live game feeds and per-game hitting lines.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use betbuddy_core::model::{
    GameId, HittingLine, Player, PlayerId, ScheduledGame, Side, TeamId, TeamRecord, TeamSlot,
};
use betbuddy_core::stats_api::{StatsFeed, StatsQuery, UpstreamError};

use super::parse::{at, count_or_zero, first_group_splits, str_at, u32_at, u64_at};
use super::StatAggregator;
use crate::local_factors::local_factors;

// ---------------------------------------------------------------------------
// Game feed summary
// ---------------------------------------------------------------------------

/// Coarse game status used by outcome review and first-inning rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Final,
    /// Postponed, cancelled or suspended: the game will not complete as scheduled.
    Postponed,
    Pending,
}

impl GameState {
    /// Classify the upstream `detailedState` string.
    pub fn from_detailed(state: &str) -> GameState {
        let state = state.trim();
        if ["Final", "Completed Early", "Game Over"].iter().any(|s| state.starts_with(s)) {
            GameState::Final
        } else if ["Postponed", "Cancelled", "Suspended"].iter().any(|s| state.starts_with(s)) {
            GameState::Postponed
        } else {
            GameState::Pending
        }
    }
}

/// A first-inning play on which at least one run scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPlay {
    /// The batting side (top of the inning is the away team).
    pub batting: Side,
    pub pitcher_id: Option<PlayerId>,
}

/// What the engine needs from one game's live feed.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub game_id: GameId,
    pub state: GameState,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_first_inning_runs: u32,
    pub away_first_inning_runs: u32,
    pub first_inning_scoring: Vec<ScoringPlay>,
}

impl GameSummary {
    pub fn first_inning_runs(&self) -> u32 {
        self.home_first_inning_runs + self.away_first_inning_runs
    }

    /// Whether `team_id` scored in the first inning; `None` if the team did
    /// not play in this game.
    pub fn team_scored_first(&self, team_id: TeamId) -> Option<bool> {
        if team_id == self.home_team_id {
            Some(self.home_first_inning_runs > 0)
        } else if team_id == self.away_team_id {
            Some(self.away_first_inning_runs > 0)
        } else {
            None
        }
    }

    /// Whether a first-inning run scored with `pitcher_id` on the mound.
    pub fn pitcher_allowed_first(&self, pitcher_id: PlayerId) -> bool {
        self.first_inning_scoring
            .iter()
            .any(|play| play.pitcher_id == Some(pitcher_id))
    }
}

/// Parse a live game feed. First-inning runs come from the line score;
/// when it is absent the scoring plays of each half are counted instead.
pub fn parse_game_feed(body: &Value, game_id: GameId) -> Option<GameSummary> {
    let game_data = body.get("gameData")?;
    let state = str_at(game_data, &["status", "detailedState"])
        .map(GameState::from_detailed)
        .unwrap_or(GameState::Pending);
    let home_team_id = u32_at(game_data, &["teams", "home", "id"])?;
    let away_team_id = u32_at(game_data, &["teams", "away", "id"])?;

    let plays = at(body, &["liveData", "plays", "allPlays"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let scoring_indices = at(body, &["liveData", "plays", "scoringPlays"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let first_inning_scoring: Vec<ScoringPlay> = scoring_indices
        .iter()
        .filter_map(|i| plays.get(usize::try_from(i.as_u64()?).ok()?))
        .filter(|play| u64_at(play, &["about", "inning"]) == Some(1))
        .map(|play| ScoringPlay {
            batting: match str_at(play, &["about", "halfInning"]) {
                Some("top") => Side::Away,
                _ => Side::Home,
            },
            pitcher_id: u32_at(play, &["matchup", "pitcher", "id"]),
        })
        .collect();

    let first_inning = at(body, &["liveData", "linescore", "innings"])
        .and_then(Value::as_array)
        .and_then(|innings| innings.first());
    let runs_for = |side: Side, key: &str| -> u32 {
        match first_inning.and_then(|inning| u32_at(inning, &[key, "runs"])) {
            Some(runs) => runs,
            None => first_inning_scoring.iter().filter(|p| p.batting == side).count() as u32,
        }
    };
    let home_first_inning_runs = runs_for(Side::Home, "home");
    let away_first_inning_runs = runs_for(Side::Away, "away");

    Some(GameSummary {
        game_id,
        state,
        home_team_id,
        away_team_id,
        home_first_inning_runs,
        away_first_inning_runs,
        first_inning_scoring,
    })
}

// ---------------------------------------------------------------------------
// Schedule and standings
// ---------------------------------------------------------------------------

fn parse_slot(side: &Value) -> Option<TeamSlot> {
    let team_id = u32_at(side, &["team", "id"])?;
    let team_name = str_at(side, &["team", "name"]).unwrap_or_default().to_string();
    let probable_pitcher = side.get("probablePitcher").and_then(|p| {
        Some(Player {
            id: u32_at(p, &["id"])?,
            name: str_at(p, &["fullName"])?.to_string(),
        })
    });
    Some(TeamSlot {
        team_id,
        team_name,
        record: None,
        probable_pitcher,
    })
}

/// Parse the games of a one-day schedule response. Games without an id or
/// team ids are skipped; missing probable pitchers stay `None`.
pub fn parse_schedule(body: &Value, date: NaiveDate) -> Vec<ScheduledGame> {
    let games = body
        .get("dates")
        .and_then(Value::as_array)
        .and_then(|dates| dates.first())
        .and_then(|day| day.get("games"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    games
        .iter()
        .filter_map(|game| {
            let parsed = (|| {
                let game_id = u64_at(game, &["gamePk"])?;
                let home = parse_slot(at(game, &["teams", "home"])?)?;
                let away = parse_slot(at(game, &["teams", "away"])?)?;
                let stadium = str_at(game, &["venue", "name"]).unwrap_or_default();
                Some(ScheduledGame {
                    game_id,
                    date,
                    start_time: str_at(game, &["gameDate"]).map(str::to_string),
                    home,
                    away,
                    local: local_factors(stadium),
                })
            })();
            if parsed.is_none() {
                debug!("skipping malformed schedule entry on {date}");
            }
            parsed
        })
        .collect()
}

/// Team records keyed by team id, from a standings response.
pub fn parse_standings(body: &Value) -> HashMap<TeamId, TeamRecord> {
    body.get("records")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|division| division.get("teamRecords")?.as_array())
        .flatten()
        .filter_map(|team| {
            let id = u32_at(team, &["team", "id"])?;
            let record = team.get("leagueRecord")?;
            Some((
                id,
                TeamRecord {
                    wins: count_or_zero(record, "wins"),
                    losses: count_or_zero(record, "losses"),
                },
            ))
        })
        .collect()
}

/// The line for `game_id` within a hitter's game log.
pub fn parse_hitting_line(body: &Value, game_id: GameId) -> Option<HittingLine> {
    first_group_splits(body)
        .iter()
        .find(|split| u64_at(split, &["game", "gamePk"]) == Some(game_id))
        .and_then(|split| split.get("stat"))
        .map(|stat| HittingLine {
            hits: count_or_zero(stat, "hits"),
            runs: count_or_zero(stat, "runs"),
            rbi: count_or_zero(stat, "rbi"),
            summary: str_at(stat, &["summary"]).unwrap_or_default().to_string(),
        })
}

// ---------------------------------------------------------------------------
// Aggregator lookups
// ---------------------------------------------------------------------------

impl<F: StatsFeed> StatAggregator<F> {
    /// The day's games with probable pitchers and local factors (no weather,
    /// no records).
    pub async fn schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>, UpstreamError> {
        let body = self.lookup(StatsQuery::Schedule { date }).await?;
        Ok(body.map(|b| parse_schedule(&b, date)).unwrap_or_default())
    }

    pub async fn standings(&self, date: NaiveDate, season: i32) -> Result<HashMap<TeamId, TeamRecord>, UpstreamError> {
        let body = self.lookup(StatsQuery::Standings { date, season }).await?;
        Ok(body.map(|b| parse_standings(&b)).unwrap_or_default())
    }

    /// Summary of one game's live feed, `None` for an unknown game.
    pub async fn game_summary(&self, game_id: GameId) -> Result<Option<GameSummary>, UpstreamError> {
        let body = self.lookup(StatsQuery::GameFeed { game_id }).await?;
        Ok(body.and_then(|b| parse_game_feed(&b, game_id)))
    }

    /// A hitter's box-score line for `game_id` played on `date`.
    pub async fn hitting_line(
        &self,
        hitter_id: PlayerId,
        season: i32,
        date: NaiveDate,
        game_id: GameId,
    ) -> Result<Option<HittingLine>, UpstreamError> {
        let body = self
            .lookup(StatsQuery::HittingGameLog {
                player_id: hitter_id,
                season,
                start: date,
            })
            .await?;
        Ok(body.and_then(|b| parse_hitting_line(&b, game_id)))
    }
}
