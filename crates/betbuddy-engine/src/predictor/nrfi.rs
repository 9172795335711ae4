// NRFI/YRFI candidate rows, one per qualifying game.

use chrono::NaiveDate;
use tracing::{debug, warn};

use betbuddy_core::model::{Aggregate, DateWindow, GamePrediction, GameSide, ScheduledGame, TeamSlot};
use betbuddy_core::stats_api::{StatsFeed, UpstreamError};

use super::Predictor;
use crate::scoring::{nrfi_order, score_game};

impl<F: StatsFeed> Predictor<F> {
    /// Score every game on `schedule` with both starters announced and
    /// complete records on both sides, sorted best NRFI pick first. Read
    /// from the tail, the same list ranks YRFI picks.
    pub async fn build_nrfi(&self, date: NaiveDate, schedule: &[ScheduledGame]) -> Vec<GamePrediction> {
        let window = self.season_window(date);
        let mut rows = Vec::with_capacity(schedule.len());

        for game in schedule {
            if !game.both_pitchers_announced() {
                debug!("game {}: starting pitcher T.B.D., skipped", game.game_id);
                continue;
            }
            match self.nrfi_row(game, window).await {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => {}
                Err(e) => warn!("game {}: dropped after upstream failure: {e}", game.game_id),
            }
        }

        rows.sort_by(nrfi_order);
        rows
    }

    async fn nrfi_row(&self, game: &ScheduledGame, window: DateWindow) -> Result<Option<GamePrediction>, UpstreamError> {
        let Some(home) = self.game_side(game, &game.home, window).await? else {
            return Ok(None);
        };
        let Some(away) = self.game_side(game, &game.away, window).await? else {
            return Ok(None);
        };
        let scores = score_game(
            &home.pitcher.stats,
            &away.pitcher.stats,
            &home.offense.stats,
            &away.offense.stats,
            &game.local,
            &self.weights,
        );
        Ok(Some(GamePrediction {
            game_id: game.game_id,
            date: game.date,
            start_time: game.start_time.clone(),
            home,
            away,
            local: game.local.clone(),
            scores,
        }))
    }

    async fn game_side(
        &self,
        game: &ScheduledGame,
        slot: &TeamSlot,
        window: DateWindow,
    ) -> Result<Option<GameSide>, UpstreamError> {
        let Some(starter) = &slot.probable_pitcher else {
            return Ok(None);
        };
        let pitcher = match self.aggregator.pitching(starter.id, self.season, window).await? {
            Aggregate::Complete(record) => record,
            Aggregate::Empty(reason) => {
                debug!("game {}: {} excluded: {reason:?}", game.game_id, starter.name);
                return Ok(None);
            }
        };
        let offense = match self.aggregator.team_offense(slot.team_id, self.season, window).await? {
            Aggregate::Complete(record) => record,
            Aggregate::Empty(reason) => {
                debug!("game {}: {} offense excluded: {reason:?}", game.game_id, slot.team_name);
                return Ok(None);
            }
        };
        Ok(Some(GameSide {
            team_id: slot.team_id,
            team_name: slot.team_name.clone(),
            record: slot.record,
            pitcher,
            offense,
        }))
    }
}
