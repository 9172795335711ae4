// Outcome review: resolve stored prediction rows against final game data
// and write the outcomes back.

use std::collections::HashMap;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{info, warn};

use betbuddy_core::db::Database;
use betbuddy_core::model::{GameId, HittingOutcome, NrfiOutcome, PlayerId};
use betbuddy_core::stats_api::{StatsFeed, UpstreamError};

use crate::aggregator::{GameState, GameSummary, StatAggregator};

/// Counts of outcomes written during one review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSummary {
    pub nrfi_final: usize,
    pub nrfi_pending: usize,
    pub nrfi_postponed: usize,
    pub hitting_played: usize,
    pub hitting_did_not_play: usize,
    pub hitting_pending: usize,
    pub hitting_postponed: usize,
    /// Rows left untouched after an upstream failure.
    pub failed: usize,
}

/// NRFI outcome of a game from its summary.
pub fn nrfi_outcome(summary: Option<&GameSummary>) -> NrfiOutcome {
    match summary.map(|s| (s.state, s.first_inning_runs())) {
        Some((GameState::Final, runs)) => NrfiOutcome::Final {
            first_inning_runs: runs,
        },
        Some((GameState::Postponed, _)) => NrfiOutcome::Postponed,
        Some((GameState::Pending, _)) | None => NrfiOutcome::Pending,
    }
}

/// Resolves outcomes, remembering each game's summary for the duration of
/// one review so doubleheaders and shared games are fetched once.
pub struct OutcomeReviewer<'a, F> {
    aggregator: &'a StatAggregator<F>,
    season: i32,
    games: HashMap<GameId, Option<GameSummary>>,
}

impl<'a, F: StatsFeed> OutcomeReviewer<'a, F> {
    pub fn new(aggregator: &'a StatAggregator<F>, season: i32) -> Self {
        Self {
            aggregator,
            season,
            games: HashMap::new(),
        }
    }

    async fn summary(&mut self, game_id: GameId) -> Result<Option<GameSummary>, UpstreamError> {
        if let Some(summary) = self.games.get(&game_id) {
            return Ok(summary.clone());
        }
        let summary = self.aggregator.game_summary(game_id).await?;
        self.games.insert(game_id, summary.clone());
        Ok(summary)
    }

    pub async fn nrfi(&mut self, game_id: GameId) -> Result<NrfiOutcome, UpstreamError> {
        let summary = self.summary(game_id).await?;
        Ok(nrfi_outcome(summary.as_ref()))
    }

    /// A final game with no box-score line for the hitter is `DidNotPlay`.
    pub async fn hitting(
        &mut self,
        date: NaiveDate,
        hitter_id: PlayerId,
        game_id: GameId,
    ) -> Result<HittingOutcome, UpstreamError> {
        let state = self.summary(game_id).await?.map(|s| s.state);
        Ok(match state {
            Some(GameState::Final) => match self.aggregator.hitting_line(hitter_id, self.season, date, game_id).await? {
                Some(line) => HittingOutcome::Played(line),
                None => HittingOutcome::DidNotPlay,
            },
            Some(GameState::Postponed) => HittingOutcome::Postponed,
            Some(GameState::Pending) | None => HittingOutcome::Pending,
        })
    }

    /// Review every stored row for `date` and record the outcomes.
    pub async fn review_day(&mut self, db: &Database, date: NaiveDate) -> Result<ReviewSummary> {
        let mut summary = ReviewSummary::default();

        for row in db.load_nrfi_set(date)? {
            let game_id = row.prediction.game_id;
            let outcome = match self.nrfi(game_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("game {game_id}: outcome unavailable: {e}");
                    summary.failed += 1;
                    continue;
                }
            };
            match outcome {
                NrfiOutcome::Final { .. } => summary.nrfi_final += 1,
                NrfiOutcome::Pending => summary.nrfi_pending += 1,
                NrfiOutcome::Postponed => summary.nrfi_postponed += 1,
            }
            db.record_nrfi_outcome(date, game_id, &outcome)?;
        }

        for row in db.load_hitting_set(date)? {
            let hitter_id = row.prediction.hitter.id;
            let game_id = row.prediction.game_id;
            let outcome = match self.hitting(date, hitter_id, game_id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("hitter {hitter_id} in game {game_id}: outcome unavailable: {e}");
                    summary.failed += 1;
                    continue;
                }
            };
            match outcome {
                HittingOutcome::Played(_) => summary.hitting_played += 1,
                HittingOutcome::DidNotPlay => summary.hitting_did_not_play += 1,
                HittingOutcome::Pending => summary.hitting_pending += 1,
                HittingOutcome::Postponed => summary.hitting_postponed += 1,
            }
            db.record_hitting_outcome(date, hitter_id, game_id, &outcome)?;
        }

        info!("{date}: reviewed outcomes {summary:?}");
        Ok(summary)
    }
}
