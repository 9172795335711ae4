// Day schedule with team records, park factors and first-pitch weather.

use chrono::{DateTime, NaiveDate};
use tracing::{debug, warn};

use betbuddy_core::model::ScheduledGame;
use betbuddy_core::stats_api::{StatsFeed, UpstreamError};

use super::Predictor;
use crate::local_factors::city_of;

impl<F: StatsFeed> Predictor<F> {
    /// The games on `date`. Standings and weather are best effort; a failed
    /// schedule lookup is returned as an error.
    pub async fn build_schedule(&self, date: NaiveDate) -> Result<Vec<ScheduledGame>, UpstreamError> {
        let mut games = self.aggregator.schedule(date).await?;

        let records = match self.aggregator.standings(date, self.season).await {
            Ok(records) => records,
            Err(e) => {
                warn!("standings unavailable for {date}: {e}");
                Default::default()
            }
        };

        for game in &mut games {
            game.home.record = records.get(&game.home.team_id).copied();
            game.away.record = records.get(&game.away.team_id).copied();

            if game.local.roofed || !self.weather.is_active() {
                continue;
            }
            let start = game
                .start_time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.timestamp());
            match (city_of(&game.local.stadium), start) {
                (Some(city), Some(start)) => {
                    game.local.weather = self.weather.forecast_at(city, start).await;
                }
                _ => debug!("no forecast location for game {} at {}", game.game_id, game.local.stadium),
            }
        }

        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::testing::MapFeed;
    use crate::aggregator::{SampleRules, StatAggregator};
    use crate::scoring::FormGates;
    use betbuddy_core::model::TeamRecord;
    use betbuddy_core::stats_api::StatsQuery;
    use betbuddy_core::weather::WeatherClient;
    use betbuddy_core::weights::WeightVector;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn records_attached_and_standings_optional() {
        let day = date(2024, 5, 1);
        let schedule = json!({ "dates": [ { "games": [ {
            "gamePk": 1, "gameDate": "2024-05-01T23:05:00Z", "venue": { "name": "Fenway Park" },
            "teams": { "home": { "team": { "id": 111, "name": "Boston Red Sox" } },
                       "away": { "team": { "id": 147, "name": "New York Yankees" } } }
        } ] } ] });
        let standings = json!({ "records": [ { "teamRecords": [
            { "team": { "id": 147 }, "leagueRecord": { "wins": 20, "losses": 11 } }
        ] } ] });

        let feed = MapFeed::default()
            .with(StatsQuery::Schedule { date: day }, schedule.clone())
            .with(StatsQuery::Standings { date: day, season: 2024 }, standings);
        let predictor = Predictor::new(
            StatAggregator::new(feed, SampleRules::default()),
            WeatherClient::Disabled,
            WeightVector::default(),
            FormGates::default(),
            2024,
            date(2024, 3, 28),
        );
        let games = predictor.build_schedule(day).await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].away.record, Some(TeamRecord { wins: 20, losses: 11 }));
        assert_eq!(games[0].home.record, None);
        assert_eq!(games[0].local.ballpark_factor, 108.0);
        assert!(games[0].local.weather.is_none());

        let feed = MapFeed::default().with(StatsQuery::Schedule { date: day }, schedule);
        let predictor = Predictor::new(
            StatAggregator::new(feed, SampleRules::default()),
            WeatherClient::Disabled,
            WeightVector::default(),
            FormGates::default(),
            2024,
            date(2024, 3, 28),
        );
        let games = predictor.build_schedule(day).await.unwrap();
        assert_eq!(games.len(), 1);
    }
}
