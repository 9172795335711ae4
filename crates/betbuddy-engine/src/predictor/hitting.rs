// Hitting candidate rows, one per (qualified hitter, game) pair.

use chrono::NaiveDate;
use tracing::{debug, warn};

use betbuddy_core::model::{Aggregate, HitterPrediction, ScheduledGame};
use betbuddy_core::stats_api::{StatsFeed, UpstreamError};

use super::Predictor;
use crate::aggregator::QualifiedHitter;
use crate::scoring::{hitting_order, score_hitter, HitterInputs};

/// Unwrap a complete record or log why the row is dropped and return.
macro_rules! complete_or_skip {
    ($aggregate:expr, $what:expr) => {
        match $aggregate {
            Aggregate::Complete(record) => record,
            Aggregate::Empty(reason) => {
                debug!("{} excluded: {reason:?}", $what);
                return Ok(None);
            }
        }
    };
}

impl<F: StatsFeed> Predictor<F> {
    /// Score every qualified hitter against the opposing starter of each
    /// game the hitter's team plays on `date`, best pick first. A
    /// doubleheader gives two independent rows.
    pub async fn build_hitting(&self, date: NaiveDate, schedule: &[ScheduledGame]) -> Vec<HitterPrediction> {
        if schedule.is_empty() {
            return Vec::new();
        }
        let hitters = match self.aggregator.qualified_hitters(self.season).await {
            Ok(hitters) => hitters,
            Err(e) => {
                warn!("qualified hitters unavailable for {date}: {e}");
                return Vec::new();
            }
        };

        let mut rows = Vec::new();
        for hitter in &hitters {
            for game in schedule {
                if game.side_of(hitter.team_id).is_none() {
                    continue;
                }
                match self.hitter_row(date, hitter, game).await {
                    Ok(Some(row)) => rows.push(row),
                    Ok(None) => {}
                    Err(e) => warn!(
                        "{} in game {}: dropped after upstream failure: {e}",
                        hitter.player.name, game.game_id
                    ),
                }
            }
        }

        rows.sort_by(hitting_order);
        rows
    }

    async fn hitter_row(
        &self,
        date: NaiveDate,
        hitter: &QualifiedHitter,
        game: &ScheduledGame,
    ) -> Result<Option<HitterPrediction>, UpstreamError> {
        let Some(side) = game.side_of(hitter.team_id) else {
            return Ok(None);
        };
        let opponent = game.slot(side.opposite());
        let Some(pitcher) = opponent.probable_pitcher.clone() else {
            debug!("{}: opposing starter T.B.D. in game {}", hitter.player.name, game.game_id);
            return Ok(None);
        };
        let window = self.season_window(date);
        let agg = &self.aggregator;

        let pitcher_stats = complete_or_skip!(
            agg.pitching(pitcher.id, self.season, window).await?,
            pitcher.name
        );
        let Some(pitch_hand) = agg.handedness(pitcher.id).await?.map(|h| h.pitch_hand) else {
            debug!("{}: no throwing hand on record", pitcher.name);
            return Ok(None);
        };
        let Some(bat_side) = agg.handedness(hitter.player.id).await?.map(|h| h.bat_side) else {
            debug!("{}: no bat side on record", hitter.player.name);
            return Ok(None);
        };

        let season = complete_or_skip!(
            agg.hitting(hitter.player.id, self.season, window).await?,
            hitter.player.name
        );
        let splits = complete_or_skip!(
            agg.hitter_splits(hitter.player.id, self.season, window).await?,
            hitter.player.name
        );
        let pitcher_splits = complete_or_skip!(
            agg.pitcher_splits(pitcher.id, self.season, window).await?,
            pitcher.name
        );
        let recent = agg
            .recent_hitting(hitter.player.id, self.season, date)
            .await?
            .into_record();
        let career = agg
            .career_matchup(hitter.player.id, pitcher.id, window)
            .await?
            .into_record();

        let scores = score_hitter(
            &HitterInputs {
                splits: &splits.stats,
                pitcher_splits: &pitcher_splits.stats,
                bat_side,
                pitch_hand,
                recent: recent.as_ref().map(|r| &r.stats),
                career: career.as_ref().map(|c| &c.stats),
                local: &game.local,
            },
            self.gates,
            &self.weights,
        );

        Ok(Some(HitterPrediction {
            date,
            game_id: game.game_id,
            hitter: hitter.player.clone(),
            team_id: hitter.team_id,
            team_name: hitter.team_name.clone(),
            bat_side,
            pitcher,
            pitch_hand,
            opponent_name: opponent.team_name.clone(),
            season,
            splits,
            recent,
            career,
            pitcher_stats,
            pitcher_splits,
            local: game.local.clone(),
            scores,
        }))
    }
}
