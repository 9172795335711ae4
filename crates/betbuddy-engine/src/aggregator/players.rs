// Pitcher and hitter lookups: date-range lines, splits, career matchups,
// handedness, rolling windows and the qualified-hitter universe.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use betbuddy_core::model::{
    Aggregate, BatSide, CareerMatchup, DateWindow, EmptyReason, EntityKind, EntityRef, Hand, Handedness,
    HittingStats, PitchingStats, Player, PlayerId, SplitLine, Splits, TeamId,
};
use betbuddy_core::stats_api::{StatsFeed, StatsQuery, UpstreamError};

use super::games::GameState;
use super::parse::{count_or_zero, field_f64, field_u32, first_group_splits, first_person, str_at, u32_at, u64_at};
use super::window::{WindowSearch, WindowState};
use super::{complete, StatAggregator};

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn entity(kind: EntityKind, id: u32, person: &Value) -> EntityRef {
    EntityRef {
        kind,
        id,
        name: str_at(person, &["fullName"]).map_or_else(|| id.to_string(), str::to_string),
    }
}

/// Stat object of the last split of a person's first stats group.
fn last_stat(person: &Value) -> Option<&Value> {
    first_group_splits(person).last()?.get("stat")
}

fn parse_pitching(stat: &Value) -> Result<PitchingStats, EmptyReason> {
    Ok(PitchingStats {
        games_started: field_u32(stat, "gamesStarted")?,
        innings_pitched: field_f64(stat, "inningsPitched")?,
        wins: count_or_zero(stat, "wins"),
        losses: count_or_zero(stat, "losses"),
        era: field_f64(stat, "era")?,
        whip: field_f64(stat, "whip")?,
        strikeouts_per_9: field_f64(stat, "strikeoutsPer9Inn")?,
        home_runs_per_9: field_f64(stat, "homeRunsPer9")?,
        first_inning_run_rate: 0.0,
    })
}

fn parse_career(stat: &Value) -> Result<CareerMatchup, EmptyReason> {
    Ok(CareerMatchup {
        plate_appearances: field_u32(stat, "plateAppearances")?,
        hits: field_u32(stat, "hits")?,
        batting_average: field_f64(stat, "avg")?,
    })
}

fn parse_hitting(stat: &Value) -> Result<HittingStats, EmptyReason> {
    let games_played = field_u32(stat, "gamesPlayed")?;
    if games_played == 0 {
        return Err(EmptyReason::NoGamesInWindow);
    }
    Ok(HittingStats {
        games_played,
        plate_appearances: field_u32(stat, "plateAppearances")?,
        hits: field_u32(stat, "hits")?,
        batting_average: field_f64(stat, "avg")?,
        obp: field_f64(stat, "obp")?,
        ops: field_f64(stat, "ops")?,
        home_runs: count_or_zero(stat, "homeRuns"),
    })
}

/// Which hand a split describes, from its `split.code` (`vl` / `vr`) or,
/// failing that, its description.
fn split_hand(split: &Value) -> Option<Hand> {
    match str_at(split, &["split", "code"]) {
        Some("vl") => Some(Hand::Left),
        Some("vr") => Some(Hand::Right),
        _ => {
            let description = str_at(split, &["split", "description"])?.to_ascii_lowercase();
            if description.contains("left") {
                Some(Hand::Left)
            } else if description.contains("right") {
                Some(Hand::Right)
            } else {
                None
            }
        }
    }
}

/// Left/right splits. `sample_field` is `plateAppearances` for hitters and
/// `battersFaced` for pitchers. Both sides must be present.
fn parse_splits(person: &Value, sample_field: &str) -> Result<Splits, EmptyReason> {
    let mut vs_left = None;
    let mut vs_right = None;
    for split in first_group_splits(person) {
        let (Some(hand), Some(stat)) = (split_hand(split), split.get("stat")) else {
            continue;
        };
        let line = SplitLine {
            sample: field_u32(stat, sample_field)?,
            average: field_f64(stat, "avg")?,
        };
        match hand {
            Hand::Left => vs_left = Some(line),
            Hand::Right => vs_right = Some(line),
        }
    }
    match (vs_left, vs_right) {
        (Some(vs_left), Some(vs_right)) => Ok(Splits { vs_left, vs_right }),
        (None, _) => Err(EmptyReason::MissingField("split vs left".into())),
        (_, None) => Err(EmptyReason::MissingField("split vs right".into())),
    }
}

fn parse_handedness(person: &Value) -> Option<Handedness> {
    Some(Handedness {
        bat_side: BatSide::from_code(str_at(person, &["batSide", "code"])?)?,
        pitch_hand: Hand::from_code(str_at(person, &["pitchHand", "code"])?)?,
    })
}

// ---------------------------------------------------------------------------
// Qualified hitters
// ---------------------------------------------------------------------------

/// A hitter in the season's qualified pool.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedHitter {
    pub player: Player,
    pub team_id: TeamId,
    pub team_name: String,
    pub games_played: u32,
    pub plate_appearances: u32,
}

fn parse_qualified(split: &Value) -> Option<QualifiedHitter> {
    let stat = split.get("stat")?;
    Some(QualifiedHitter {
        player: Player {
            id: u32_at(split, &["player", "id"])?,
            name: str_at(split, &["player", "fullName"]).unwrap_or_default().to_string(),
        },
        team_id: u32_at(split, &["team", "id"])?,
        team_name: str_at(split, &["team", "name"]).unwrap_or_default().to_string(),
        games_played: count_or_zero(stat, "gamesPlayed"),
        plate_appearances: count_or_zero(stat, "plateAppearances"),
    })
}

// ---------------------------------------------------------------------------
// Aggregator lookups
// ---------------------------------------------------------------------------

impl<F: StatsFeed> StatAggregator<F> {
    /// Pitching line over `window`, including the first-inning run rate over
    /// the pitcher's starts. Fewer starts than the minimum is an empty result.
    pub async fn pitching(
        &self,
        pitcher_id: PlayerId,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<PitchingStats>, UpstreamError> {
        if window.is_empty() {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        }
        let query = StatsQuery::PitchingByDateRange {
            player_id: pitcher_id,
            season,
            start: window.start,
            end: window.last_day(),
        };
        let Some(body) = self.lookup(query).await? else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(person) = first_person(&body) else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(stat) = last_stat(person) else {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        };

        let mut stats = match parse_pitching(stat) {
            Ok(stats) => stats,
            Err(reason) => return Ok(Aggregate::Empty(reason)),
        };
        let required = self.rules().min_games_started;
        if stats.games_started < required {
            return Ok(Aggregate::Empty(EmptyReason::BelowMinimumSample {
                required,
                found: stats.games_started,
            }));
        }
        stats.first_inning_run_rate = self.pitcher_first_inning_rate(pitcher_id, season, window).await?;

        Ok(complete(entity(EntityKind::Pitcher, pitcher_id, person), window, Ok(stats)))
    }

    /// Share of the pitcher's starts in `window` where a first-inning run
    /// scored with him on the mound. Starts whose game never went final count
    /// in the denominator only.
    pub async fn pitcher_first_inning_rate(
        &self,
        pitcher_id: PlayerId,
        season: i32,
        window: DateWindow,
    ) -> Result<f64, UpstreamError> {
        let query = StatsQuery::PitchingGameLog {
            player_id: pitcher_id,
            season,
            start: window.start,
            end: window.last_day(),
        };
        let Some(body) = self.lookup(query).await? else {
            return Ok(0.0);
        };
        let starts: Vec<u64> = first_group_splits(&body)
            .iter()
            .filter(|split| split.get("stat").is_some_and(|stat| count_or_zero(stat, "gamesStarted") > 0))
            .filter_map(|split| u64_at(split, &["game", "gamePk"]))
            .collect();
        if starts.is_empty() {
            return Ok(0.0);
        }

        let mut allowed = 0usize;
        for game_id in &starts {
            if let Some(summary) = self.game_summary(*game_id).await? {
                if summary.state == GameState::Final && summary.pitcher_allowed_first(pitcher_id) {
                    allowed += 1;
                }
            }
        }
        Ok(allowed as f64 / starts.len() as f64)
    }

    /// Hitting line over `window`.
    pub async fn hitting(
        &self,
        hitter_id: PlayerId,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<HittingStats>, UpstreamError> {
        if window.is_empty() {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        }
        let query = StatsQuery::HittingByDateRange {
            player_id: hitter_id,
            season,
            start: window.start,
            end: window.last_day(),
        };
        let Some(body) = self.lookup(query).await? else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(person) = first_person(&body) else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(stat) = last_stat(person) else {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        };
        Ok(complete(entity(EntityKind::Hitter, hitter_id, person), window, parse_hitting(stat)))
    }

    /// Hitting line over the hitter's last N games before `date`, found by a
    /// bounded expanding-window search.
    pub async fn recent_hitting(
        &self,
        hitter_id: PlayerId,
        season: i32,
        date: NaiveDate,
    ) -> Result<Aggregate<HittingStats>, UpstreamError> {
        let rules = self.rules();
        let mut search = WindowSearch::new(date, rules.initial_lag_days, rules.max_lookback_days, rules.rolling_games);
        let mut last = None;
        loop {
            match search.state() {
                WindowState::Searching { .. } => {
                    let Some(window) = search.pending_window() else {
                        return Ok(Aggregate::Empty(EmptyReason::WindowExhausted));
                    };
                    let games = match self.hitting(hitter_id, season, window).await? {
                        Aggregate::Complete(record) => {
                            let games = record.stats.games_played;
                            last = Some(record);
                            games
                        }
                        Aggregate::Empty(EmptyReason::UnknownEntity) => {
                            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
                        }
                        Aggregate::Empty(_) => 0,
                    };
                    search.observe(games);
                }
                WindowState::Found(window) => {
                    return Ok(match last {
                        Some(record) if record.window == window => Aggregate::Complete(record),
                        _ => Aggregate::Empty(EmptyReason::NoGamesInWindow),
                    });
                }
                WindowState::Exhausted => {
                    debug!("no {}-game window for hitter {hitter_id} before {date}", rules.rolling_games);
                    return Ok(Aggregate::Empty(EmptyReason::WindowExhausted));
                }
            }
        }
    }

    /// Hitter's season splits against left- and right-handed pitching,
    /// tagged with `window`.
    pub async fn hitter_splits(
        &self,
        hitter_id: PlayerId,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<Splits>, UpstreamError> {
        let query = StatsQuery::HittingSplits {
            player_id: hitter_id,
            season,
        };
        self.splits(query, EntityKind::Hitter, hitter_id, "plateAppearances", window)
            .await
    }

    /// Pitcher's season batting-average-against splits by batter side.
    pub async fn pitcher_splits(
        &self,
        pitcher_id: PlayerId,
        season: i32,
        window: DateWindow,
    ) -> Result<Aggregate<Splits>, UpstreamError> {
        let query = StatsQuery::PitchingSplits {
            player_id: pitcher_id,
            season,
        };
        self.splits(query, EntityKind::Pitcher, pitcher_id, "battersFaced", window)
            .await
    }

    async fn splits(
        &self,
        query: StatsQuery,
        kind: EntityKind,
        id: PlayerId,
        sample_field: &str,
        window: DateWindow,
    ) -> Result<Aggregate<Splits>, UpstreamError> {
        let Some(body) = self.lookup(query).await? else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(person) = first_person(&body) else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        Ok(complete(entity(kind, id, person), window, parse_splits(person, sample_field)))
    }

    /// Hitter's career line against one pitcher; empty when they never met.
    pub async fn career_matchup(
        &self,
        hitter_id: PlayerId,
        pitcher_id: PlayerId,
        window: DateWindow,
    ) -> Result<Aggregate<CareerMatchup>, UpstreamError> {
        let Some(body) = self.lookup(StatsQuery::CareerVsPitcher { hitter_id, pitcher_id }).await? else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(person) = first_person(&body) else {
            return Ok(Aggregate::Empty(EmptyReason::UnknownEntity));
        };
        let Some(stat) = first_group_splits(person).first().and_then(|s| s.get("stat")) else {
            return Ok(Aggregate::Empty(EmptyReason::NoGamesInWindow));
        };
        Ok(complete(entity(EntityKind::Hitter, hitter_id, person), window, parse_career(stat)))
    }

    /// Bat side and throwing hand, `None` when unknown or unparseable.
    pub async fn handedness(&self, player_id: PlayerId) -> Result<Option<Handedness>, UpstreamError> {
        let body = self.lookup(StatsQuery::PersonInfo { player_id }).await?;
        Ok(body.as_ref().and_then(first_person).and_then(parse_handedness))
    }

    /// The season's qualified hitters: at least `qualified_pa_per_game`
    /// plate appearances per game played, and the optional games floor.
    ///
    /// The first page reports the pool size and is reused; the remaining
    /// pages are fetched at `page_size` offsets. Results are deduplicated by
    /// player id, keeping first-seen order.
    pub async fn qualified_hitters(&self, season: i32) -> Result<Vec<QualifiedHitter>, UpstreamError> {
        let limit = self.rules().page_size.max(1);
        let page = |offset| StatsQuery::QualifiedHitters { season, offset, limit };

        let Some(first) = self.lookup(page(0)).await? else {
            return Ok(Vec::new());
        };
        let total = first
            .get("stats")
            .and_then(Value::as_array)
            .and_then(|groups| groups.first())
            .and_then(|group| u32_at(group, &["totalSplits"]))
            .unwrap_or(0);
        let pages = total.div_ceil(limit).max(1);

        let mut bodies = vec![first];
        for n in 1..pages {
            if let Some(body) = self.lookup(page(n * limit)).await? {
                bodies.push(body);
            }
        }

        let rules = self.rules();
        let mut seen = HashSet::new();
        let hitters = bodies
            .iter()
            .flat_map(|body| first_group_splits(body).iter())
            .filter_map(parse_qualified)
            .filter(|h| seen.insert(h.player.id))
            .filter(|h| {
                h.games_played > 0
                    && f64::from(h.plate_appearances) >= f64::from(h.games_played) * rules.qualified_pa_per_game
                    && rules.min_games_played.map_or(true, |floor| h.games_played >= floor)
            })
            .collect();
        Ok(hitters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::MapFeed;
    use crate::aggregator::SampleRules;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn season_window() -> DateWindow {
        DateWindow::before(date(2024, 3, 28), date(2024, 5, 1))
    }

    fn pitching_body(starts: u32) -> Value {
        json!({ "people": [ { "fullName": "Test Starter", "stats": [ { "splits": [ { "stat": {
            "gamesStarted": starts, "inningsPitched": "31.1", "wins": 3, "losses": 1,
            "era": "2.87", "whip": "1.05", "strikeoutsPer9Inn": "10.10", "homeRunsPer9": "0.86"
        } } ] } ] } ] })
    }

    fn pitching_query(window: DateWindow) -> StatsQuery {
        StatsQuery::PitchingByDateRange {
            player_id: 10,
            season: 2024,
            start: window.start,
            end: window.last_day(),
        }
    }

    #[tokio::test]
    async fn pitcher_below_minimum_starts_is_empty() {
        let window = season_window();
        let feed = MapFeed::default().with(pitching_query(window), pitching_body(2));
        let agg = StatAggregator::new(feed, SampleRules::default());
        let result = agg.pitching(10, 2024, window).await.unwrap();
        assert_eq!(
            result,
            Aggregate::Empty(EmptyReason::BelowMinimumSample { required: 3, found: 2 })
        );
    }

    #[tokio::test]
    async fn pitcher_first_inning_rate_counts_starts() {
        let window = season_window();
        let log = json!({ "stats": [ { "splits": [
            { "game": { "gamePk": 1 }, "stat": { "gamesStarted": 1 } },
            { "game": { "gamePk": 2 }, "stat": { "gamesStarted": 1 } },
            { "game": { "gamePk": 3 }, "stat": { "gamesStarted": 0 } },
            { "game": { "gamePk": 4 }, "stat": { "gamesStarted": 1 } }
        ] } ] });
        let final_game = |pitcher: u64| {
            json!({
                "gameData": { "status": { "detailedState": "Final" },
                              "teams": { "home": { "id": 1 }, "away": { "id": 2 } } },
                "liveData": { "plays": {
                    "allPlays": [ { "about": { "inning": 1, "halfInning": "top" },
                                    "matchup": { "pitcher": { "id": pitcher } } } ],
                    "scoringPlays": [0]
                } }
            })
        };
        let feed = MapFeed::default()
            .with(pitching_query(window), pitching_body(3))
            .with(
                StatsQuery::PitchingGameLog {
                    player_id: 10,
                    season: 2024,
                    start: window.start,
                    end: window.last_day(),
                },
                log,
            )
            .with(StatsQuery::GameFeed { game_id: 1 }, final_game(10))
            .with(StatsQuery::GameFeed { game_id: 2 }, final_game(99))
            .with(StatsQuery::GameFeed { game_id: 4 }, final_game(10));
        let agg = StatAggregator::new(feed, SampleRules::default());
        let record = agg.pitching(10, 2024, window).await.unwrap().into_record().unwrap();
        assert_eq!(record.entity.name, "Test Starter");
        assert_eq!(record.stats.games_started, 3);
        assert_eq!(record.stats.era, 2.87);
        assert!((record.stats.first_inning_run_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn splits_need_both_sides() {
        let window = season_window();
        let one_sided = json!({ "people": [ { "stats": [ { "splits": [
            { "split": { "code": "vl" }, "stat": { "plateAppearances": 40, "avg": ".310" } }
        ] } ] } ] });
        let both = json!({ "people": [ { "stats": [ { "splits": [
            { "split": { "code": "vl" }, "stat": { "battersFaced": 60, "avg": ".210" } },
            { "split": { "description": "vs Right" }, "stat": { "battersFaced": 90, "avg": ".250" } }
        ] } ] } ] });
        let feed = MapFeed::default()
            .with(StatsQuery::HittingSplits { player_id: 7, season: 2024 }, one_sided)
            .with(StatsQuery::PitchingSplits { player_id: 10, season: 2024 }, both);
        let agg = StatAggregator::new(feed, SampleRules::default());

        let hitter = agg.hitter_splits(7, 2024, window).await.unwrap();
        assert_eq!(hitter, Aggregate::Empty(EmptyReason::MissingField("split vs right".into())));

        let pitcher = agg.pitcher_splits(10, 2024, window).await.unwrap().into_record().unwrap();
        assert_eq!(pitcher.stats.against(Hand::Left), SplitLine { sample: 60, average: 0.210 });
        assert_eq!(pitcher.stats.against(Hand::Right).sample, 90);
    }

    #[tokio::test]
    async fn career_without_meetings_is_empty() {
        let feed = MapFeed::default().with(
            StatsQuery::CareerVsPitcher { hitter_id: 7, pitcher_id: 10 },
            json!({ "people": [ { "stats": [] } ] }),
        );
        let agg = StatAggregator::new(feed, SampleRules::default());
        let result = agg.career_matchup(7, 10, season_window()).await.unwrap();
        assert_eq!(result, Aggregate::Empty(EmptyReason::NoGamesInWindow));
    }

    #[tokio::test]
    async fn handedness_parses_codes() {
        let feed = MapFeed::default().with(
            StatsQuery::PersonInfo { player_id: 7 },
            json!({ "people": [ { "batSide": { "code": "S" }, "pitchHand": { "code": "R" } } ] }),
        );
        let agg = StatAggregator::new(feed, SampleRules::default());
        let hand = agg.handedness(7).await.unwrap().unwrap();
        assert_eq!(hand.bat_side, BatSide::Switch);
        assert_eq!(hand.pitch_hand, Hand::Right);
        assert_eq!(agg.handedness(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rolling_window_widens_until_threshold() {
        let day = date(2024, 6, 15);
        let body = |games: u32| {
            json!({ "people": [ { "fullName": "Test Hitter", "stats": [ { "splits": [ { "stat": {
                "gamesPlayed": games, "plateAppearances": games * 4, "hits": games,
                "avg": ".250", "obp": ".300", "ops": ".700"
            } } ] } ] } ] })
        };
        let query = |start: NaiveDate| StatsQuery::HittingByDateRange {
            player_id: 7,
            season: 2024,
            start,
            end: date(2024, 6, 14),
        };
        let feed = MapFeed::default()
            .with(query(date(2024, 6, 8)), body(7))
            .with(query(date(2024, 6, 7)), body(8))
            .with(query(date(2024, 6, 6)), body(10));
        let agg = StatAggregator::new(feed, SampleRules::default());
        let record = agg.recent_hitting(7, 2024, day).await.unwrap().into_record().unwrap();
        assert_eq!(record.stats.games_played, 10);
        assert_eq!(record.window, DateWindow::before(date(2024, 6, 6), day));
        assert_eq!(agg.feed().calls().len(), 3);
    }

    #[tokio::test]
    async fn rolling_window_exhausts() {
        let day = date(2024, 6, 15);
        let mut feed = MapFeed::default();
        for back in 7..=20 {
            let start = day - chrono::Duration::days(back);
            feed = feed.with(
                StatsQuery::HittingByDateRange {
                    player_id: 7,
                    season: 2024,
                    start,
                    end: date(2024, 6, 14),
                },
                json!({ "people": [ { "stats": [ { "splits": [ { "stat": {
                    "gamesPlayed": 4, "plateAppearances": 16, "hits": 4,
                    "avg": ".250", "obp": ".300", "ops": ".700"
                } } ] } ] } ] }),
            );
        }
        let agg = StatAggregator::new(feed, SampleRules::default());
        let result = agg.recent_hitting(7, 2024, day).await.unwrap();
        assert_eq!(result, Aggregate::Empty(EmptyReason::WindowExhausted));
        assert_eq!(agg.feed().calls().len(), 14);
    }

    #[tokio::test]
    async fn qualified_pool_filters_ratio_and_dedupes() {
        let split = |id: u32, gp: u32, pa: u32| {
            json!({ "player": { "id": id, "fullName": format!("Hitter {id}") },
                    "team": { "id": 147, "name": "New York Yankees" },
                    "stat": { "gamesPlayed": gp, "plateAppearances": pa } })
        };
        let page0 = json!({ "stats": [ { "totalSplits": 4, "splits": [ split(1, 10, 40), split(2, 10, 30) ] } ] });
        let page1 = json!({ "stats": [ { "totalSplits": 4, "splits": [ split(1, 10, 40), split(3, 10, 35) ] } ] });
        let feed = MapFeed::default()
            .with(StatsQuery::QualifiedHitters { season: 2024, offset: 0, limit: 2 }, page0)
            .with(StatsQuery::QualifiedHitters { season: 2024, offset: 2, limit: 2 }, page1);
        let rules = SampleRules {
            page_size: 2,
            ..SampleRules::default()
        };
        let agg = StatAggregator::new(feed, rules);
        let hitters = agg.qualified_hitters(2024).await.unwrap();
        let ids: Vec<_> = hitters.iter().map(|h| h.player.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(agg.feed().calls().len(), 2);
    }
}
