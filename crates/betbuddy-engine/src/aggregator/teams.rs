// Team offense over a date range, including the first-inning scoring rate.

use chrono::NaiveDate;
use serde_json::Value;

use betbuddy_core::model::{
    Aggregate, DateWindow, EmptyReason, EntityKind, EntityRef, GameId, TeamId, TeamOffenseStats,
};
use betbuddy_core::stats_api::{StatsFeed, StatsQuery, UpstreamError};

use super::games::GameState;
use super::parse::{field_f64, field_u32, first_group_splits, str_at, u64_at};
use super::{complete, ratio, StatAggregator};

fn parse_team_offense(stat: &Value) -> Result<TeamOffenseStats, EmptyReason> {
    let games_played = field_u32(stat, "gamesPlayed")?;
    if games_played == 0 {
        return Err(EmptyReason::NoGamesInWindow);
    }
    let plate_appearances = field_f64(stat, "plateAppearances")?;
    Ok(TeamOffenseStats {
        games_played,
        runs_per_game: ratio(field_f64(stat, "runs")?, f64::from(games_played)),
        batting_average: field_f64(stat, "avg")?,
        ops: field_f64(stat, "ops")?,
        strikeout_rate: ratio(field_f64(stat, "strikeOuts")?, plate_appearances),
        home_run_rate: ratio(field_f64(stat, "homeRuns")?, plate_appearances),
        first_inning_scoring_rate: 0.0,
    })
}

/// Completed games in a team schedule response whose official date falls in
/// `window`. Games that were suspended and resumed on a later date are
/// skipped so they are not counted twice.
pub fn completed_games(body: &Value, window: DateWindow) -> Vec<GameId> {
    body.get("dates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|day| day.get("games")?.as_array())
        .flatten()
        .filter(|game| {
            let official = str_at(game, &["officialDate"]).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let state = str_at(game, &["status", "detailedState"]).map(GameState::from_detailed);
            official.is_some_and(|d| window.contains(d))
                && state == Some(GameState::Final)
                && game.get("resumeDate").is_none()
        })
        .filter_map(|game| u64_at(game, &["gamePk"]))
        .collect()
}

impl<F: StatsFeed> StatAggregator<F> {
    /// Team batting line over `window` plus the share of its completed games
    /// in which it scored in the first inning.
    pub async fn team_offense(
        &self,
        team_id: TeamId,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<TeamOffenseStats>, UpstreamError> {
        if window.is_empty() {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        }
        let query = StatsQuery::TeamHittingByDateRange {
            team_id,
            season,
            start: window.start,
            end: window.last_day(),
        };
        let Some(body) = self.lookup(query).await? else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(split) = first_group_splits(&body).first() else {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        };
        let Some(stat) = split.get("stat") else {
            return Ok(Aggregate::Empty(EmptyReason::MissingField("stat".into())));
        };
        let entity = EntityRef {
            kind: EntityKind::Team,
            id: team_id,
            name: str_at(split, &["team", "name"]).map_or_else(|| team_id.to_string(), str::to_string),
        };

        let mut stats = match parse_team_offense(stat) {
            Ok(stats) => stats,
            Err(reason) => return Ok(Aggregate::Empty(reason)),
        };
        stats.first_inning_scoring_rate = self.team_first_inning_rate(team_id, season, window).await?;
        Ok(complete(entity, window, Ok(stats)))
    }

    /// Share of the team's completed games in `window` in which it scored in
    /// the first inning. Zero when it has no completed games.
    pub async fn team_first_inning_rate(
        &self,
        team_id: TeamId,
        season: i32,
        window: DateWindow,
    ) -> Result<f64, UpstreamError> {
        let query = StatsQuery::TeamSchedule {
            team_id,
            season,
            start: window.start,
            end: window.last_day(),
        };
        let Some(body) = self.lookup(query).await? else {
            return Ok(0.0);
        };
        let games = completed_games(&body, window);

        let mut counted = 0usize;
        let mut scored = 0usize;
        for game_id in games {
            let Some(summary) = self.game_summary(game_id).await? else {
                continue;
            };
            if let Some(did_score) = summary.team_scored_first(team_id) {
                counted += 1;
                if did_score {
                    scored += 1;
                }
            }
        }
        Ok(ratio(scored as f64, counted as f64))
    }
}
