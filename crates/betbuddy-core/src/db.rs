// SQLite persistence for daily prediction sets, their outcomes, and weight
// versions.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;

use crate::model::{
    DaySet, GameId, GamePrediction, HitterPrediction, HittingOutcome, HittingRow, NrfiOutcome,
    NrfiRow, PlayerId,
};
use crate::weights::WeightVector;

/// SQLite-backed store for prediction sets and weight versions.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nrfi_predictions (
                prediction_date TEXT NOT NULL,
                rank            INTEGER NOT NULL,
                game_id         INTEGER NOT NULL,
                payload         TEXT NOT NULL,
                outcome         TEXT,
                PRIMARY KEY (prediction_date, game_id)
            );

            CREATE TABLE IF NOT EXISTS hitting_predictions (
                prediction_date TEXT NOT NULL,
                rank            INTEGER NOT NULL,
                hitter_id       INTEGER NOT NULL,
                game_id         INTEGER NOT NULL,
                payload         TEXT NOT NULL,
                outcome         TEXT,
                PRIMARY KEY (prediction_date, hitter_id, game_id)
            );

            CREATE TABLE IF NOT EXISTS weight_versions (
                version    INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                source     TEXT NOT NULL,
                fitness    REAL,
                payload    TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock).
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Prediction sets
    // ------------------------------------------------------------------

    /// Replace the whole NRFI set for `date` in one transaction. Row order is
    /// preserved as `rank`. Any outcomes stored for the previous set are
    /// discarded with it.
    pub fn replace_nrfi_set(&self, date: NaiveDate, rows: &[GamePrediction]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let day = date.to_string();
        tx.execute("DELETE FROM nrfi_predictions WHERE prediction_date = ?1", params![day])
            .context("failed to clear previous NRFI set")?;
        for (rank, row) in rows.iter().enumerate() {
            let payload = serde_json::to_string(row).context("failed to serialize game prediction")?;
            tx.execute(
                "INSERT INTO nrfi_predictions (prediction_date, rank, game_id, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![day, rank as i64, row.game_id as i64, payload],
            )
            .with_context(|| format!("failed to insert NRFI row for game {}", row.game_id))?;
        }
        tx.commit().context("failed to commit NRFI set")?;
        Ok(())
    }

    /// Replace the whole hitting set for `date` in one transaction.
    pub fn replace_hitting_set(&self, date: NaiveDate, rows: &[HitterPrediction]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let day = date.to_string();
        tx.execute("DELETE FROM hitting_predictions WHERE prediction_date = ?1", params![day])
            .context("failed to clear previous hitting set")?;
        for (rank, row) in rows.iter().enumerate() {
            let payload = serde_json::to_string(row).context("failed to serialize hitter prediction")?;
            tx.execute(
                "INSERT INTO hitting_predictions (prediction_date, rank, hitter_id, game_id, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![day, rank as i64, row.hitter.id, row.game_id as i64, payload],
            )
            .with_context(|| {
                format!("failed to insert hitting row for {} in game {}", row.hitter.id, row.game_id)
            })?;
        }
        tx.commit().context("failed to commit hitting set")?;
        Ok(())
    }

    /// Stored NRFI rows for `date`, in stored order. Rows without a recorded
    /// outcome come back as `Pending`.
    pub fn load_nrfi_set(&self, date: NaiveDate) -> Result<Vec<NrfiRow>> {
        Ok(self
            .load_nrfi_corpus(date, date)?
            .into_iter()
            .next()
            .map(|day| day.rows)
            .unwrap_or_default())
    }

    /// Stored hitting rows for `date`, in stored order.
    pub fn load_hitting_set(&self, date: NaiveDate) -> Result<Vec<HittingRow>> {
        Ok(self
            .load_hitting_corpus(date, date)?
            .into_iter()
            .next()
            .map(|day| day.rows)
            .unwrap_or_default())
    }

    /// Every stored NRFI day in `[from, to]` (inclusive), oldest first.
    pub fn load_nrfi_corpus(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DaySet<NrfiRow>>> {
        let raw = self.load_raw("nrfi_predictions", from, to)?;
        group_days(raw, |payload, outcome| {
            Ok(NrfiRow {
                prediction: decode(&payload, "game prediction")?,
                outcome: match outcome {
                    Some(json) => decode(&json, "NRFI outcome")?,
                    None => NrfiOutcome::Pending,
                },
            })
        })
    }

    /// Every stored hitting day in `[from, to]` (inclusive), oldest first.
    pub fn load_hitting_corpus(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySet<HittingRow>>> {
        let raw = self.load_raw("hitting_predictions", from, to)?;
        group_days(raw, |payload, outcome| {
            Ok(HittingRow {
                prediction: decode(&payload, "hitter prediction")?,
                outcome: match outcome {
                    Some(json) => decode(&json, "hitting outcome")?,
                    None => HittingOutcome::Pending,
                },
            })
        })
    }

    fn load_raw(&self, table: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<RawRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT prediction_date, payload, outcome FROM {table}
                 WHERE prediction_date >= ?1 AND prediction_date <= ?2
                 ORDER BY prediction_date, rank"
            ))
            .with_context(|| format!("failed to prepare {table} query"))?;

        let rows = stmt
            .query_map(params![from.to_string(), to.to_string()], |row| {
                Ok(RawRow {
                    date: row.get(0)?,
                    payload: row.get(1)?,
                    outcome: row.get(2)?,
                })
            })
            .with_context(|| format!("failed to query {table}"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("failed to map {table} rows"))?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Outcomes
    // ------------------------------------------------------------------

    /// Store the outcome of one NRFI row. Returns `false` when no such row
    /// exists.
    pub fn record_nrfi_outcome(
        &self,
        date: NaiveDate,
        game_id: GameId,
        outcome: &NrfiOutcome,
    ) -> Result<bool> {
        let conn = self.conn();
        let json = serde_json::to_string(outcome).context("failed to serialize NRFI outcome")?;
        let updated = conn
            .execute(
                "UPDATE nrfi_predictions SET outcome = ?1
                 WHERE prediction_date = ?2 AND game_id = ?3",
                params![json, date.to_string(), game_id as i64],
            )
            .context("failed to record NRFI outcome")?;
        Ok(updated > 0)
    }

    /// Store the outcome of one hitting row, keyed by hitter and game so the
    /// two halves of a doubleheader stay separate.
    pub fn record_hitting_outcome(
        &self,
        date: NaiveDate,
        hitter_id: PlayerId,
        game_id: GameId,
        outcome: &HittingOutcome,
    ) -> Result<bool> {
        let conn = self.conn();
        let json = serde_json::to_string(outcome).context("failed to serialize hitting outcome")?;
        let updated = conn
            .execute(
                "UPDATE hitting_predictions SET outcome = ?1
                 WHERE prediction_date = ?2 AND hitter_id = ?3 AND game_id = ?4",
                params![json, date.to_string(), hitter_id, game_id as i64],
            )
            .context("failed to record hitting outcome")?;
        Ok(updated > 0)
    }

    /// Distinct dates with a stored NRFI or hitting set, oldest first.
    pub fn prediction_dates(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT prediction_date FROM nrfi_predictions
                 UNION
                 SELECT prediction_date FROM hitting_predictions
                 ORDER BY 1",
            )
            .context("failed to prepare prediction_dates query")?;
        let dates = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("failed to query prediction dates")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction dates")?;
        dates.iter().map(|d| parse_date(d)).collect()
    }

    // ------------------------------------------------------------------
    // Weight versions
    // ------------------------------------------------------------------

    /// Persist `weights` as a new version. Returns the assigned version.
    pub fn save_weights(&self, weights: &WeightVector, source: &str, fitness: Option<f64>) -> Result<u32> {
        let conn = self.conn();
        let payload = serde_json::to_string(weights).context("failed to serialize weights")?;
        let version: i64 = conn
            .query_row(
                "INSERT INTO weight_versions (source, fitness, payload)
                 VALUES (?1, ?2, ?3)
                 RETURNING version",
                params![source, fitness, payload],
                |row| row.get(0),
            )
            .context("failed to save weight version")?;
        u32::try_from(version).context("weight version out of range")
    }

    /// The most recently saved weight version, with its `version` field set.
    pub fn latest_weights(&self) -> Result<Option<WeightVector>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT version, payload FROM weight_versions ORDER BY version DESC LIMIT 1")
            .context("failed to prepare latest_weights query")?;

        let mut rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .context("failed to query weight versions")?;

        match rows.next() {
            Some(row_result) => {
                let (version, payload) = row_result.context("failed to read weight version row")?;
                let mut weights: WeightVector = decode(&payload, "weight vector")?;
                weights.version = u32::try_from(version).context("weight version out of range")?;
                Ok(Some(weights))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct RawRow {
    date: String,
    payload: String,
    outcome: Option<String>,
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    text.parse::<NaiveDate>()
        .with_context(|| format!("invalid stored date {text:?}"))
}

fn decode<T: DeserializeOwned>(json: &str, what: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("failed to deserialize {what}"))
}

/// Group ordered raw rows into per-day sets, keeping date order.
fn group_days<R>(
    raw: Vec<RawRow>,
    mut convert: impl FnMut(String, Option<String>) -> Result<R>,
) -> Result<Vec<DaySet<R>>> {
    let mut days: BTreeMap<NaiveDate, Vec<R>> = BTreeMap::new();
    for row in raw {
        let date = parse_date(&row.date)?;
        let converted = convert(row.payload, row.outcome)?;
        days.entry(date).or_default().push(converted);
    }
    Ok(days
        .into_iter()
        .map(|(date, rows)| DaySet { date, rows })
        .collect())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::before(NaiveDate::from_ymd_opt(2024, 3, 28).unwrap(), date(1))
    }

    fn entity(kind: EntityKind, id: u32) -> EntityRef {
        EntityRef {
            kind,
            id,
            name: format!("entity {id}"),
        }
    }

    fn pitching(id: u32) -> FeatureRecord<PitchingStats> {
        FeatureRecord {
            entity: entity(EntityKind::Pitcher, id),
            window: window(),
            stats: PitchingStats {
                games_started: 6,
                innings_pitched: 34.1,
                wins: 3,
                losses: 2,
                era: 3.41,
                whip: 1.12,
                strikeouts_per_9: 9.4,
                home_runs_per_9: 1.0,
                first_inning_run_rate: 0.167,
            },
        }
    }

    fn offense(id: u32) -> FeatureRecord<TeamOffenseStats> {
        FeatureRecord {
            entity: entity(EntityKind::Team, id),
            window: window(),
            stats: TeamOffenseStats {
                games_played: 30,
                runs_per_game: 4.6,
                batting_average: 0.251,
                ops: 0.731,
                strikeout_rate: 0.221,
                home_run_rate: 0.031,
                first_inning_scoring_rate: 0.3,
            },
        }
    }

    fn local() -> LocalFactors {
        LocalFactors {
            stadium: "Fenway Park".into(),
            ballpark_factor: 108.0,
            roofed: false,
            weather: None,
        }
    }

    fn game(game_id: GameId, overall: f64) -> GamePrediction {
        let side = |team_id: TeamId, pitcher_id: u32| GameSide {
            team_id,
            team_name: format!("team {team_id}"),
            record: Some(TeamRecord { wins: 15, losses: 14 }),
            pitcher: pitching(pitcher_id),
            offense: offense(team_id),
        };
        GamePrediction {
            game_id,
            date: date(1),
            start_time: Some("2024-05-01T23:10:00Z".into()),
            home: side(111, 1),
            away: side(147, 2),
            local: local(),
            scores: NrfiScores {
                home_pitching: 0.9,
                away_pitching: 1.1,
                home_offense: 1.0,
                away_offense: 0.95,
                top_first: 0.93,
                bottom_first: 1.04,
                weather_factor: 1.0,
                overall,
            },
        }
    }

    fn hitter(hitter_id: u32, game_id: GameId, overall: f64) -> HitterPrediction {
        let splits = FeatureRecord {
            entity: entity(EntityKind::Hitter, hitter_id),
            window: window(),
            stats: Splits {
                vs_left: SplitLine { sample: 40, average: 0.280 },
                vs_right: SplitLine { sample: 90, average: 0.300 },
            },
        };
        HitterPrediction {
            date: date(1),
            game_id,
            hitter: Player { id: hitter_id, name: "Hitter".into() },
            team_id: 147,
            team_name: "New York Yankees".into(),
            bat_side: BatSide::Left,
            pitcher: Player { id: 1, name: "Pitcher".into() },
            pitch_hand: Hand::Right,
            opponent_name: "Boston Red Sox".into(),
            season: FeatureRecord {
                entity: entity(EntityKind::Hitter, hitter_id),
                window: window(),
                stats: HittingStats {
                    games_played: 30,
                    plate_appearances: 130,
                    hits: 35,
                    batting_average: 0.294,
                    obp: 0.380,
                    ops: 0.950,
                    home_runs: 9,
                },
            },
            splits: splits.clone(),
            recent: None,
            career: None,
            pitcher_stats: pitching(1),
            pitcher_splits: splits,
            local: local(),
            scores: HittingScores {
                adjusted_ba: 0.29,
                hot_cold: FormFactor { form: Form::Average, weight: 1.0 },
                career: FormFactor { form: Form::Average, weight: 1.0 },
                weather_factor: 1.0,
                overall,
            },
        }
    }

    // -- schema --

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        for t in ["hitting_predictions", "nrfi_predictions", "weight_versions"] {
            assert!(tables.iter().any(|n| n == t), "missing table {t}");
        }
    }

    // -- prediction sets --

    #[test]
    fn nrfi_set_round_trip_keeps_order() {
        let db = test_db();
        let rows = vec![game(3, 1.5), game(1, 1.9), game(2, 2.2)];
        db.replace_nrfi_set(date(1), &rows).unwrap();

        let loaded = db.load_nrfi_set(date(1)).unwrap();
        let ids: Vec<GameId> = loaded.iter().map(|r| r.prediction.game_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(loaded.iter().all(|r| r.outcome == NrfiOutcome::Pending));
        assert_eq!(loaded[0].prediction.home.team_id, 111);
        assert_eq!(loaded[0].prediction.local.stadium, "Fenway Park");
        assert!((loaded[0].prediction.scores.overall - 1.5).abs() < 1e-12);
    }

    #[test]
    fn replace_supersedes_previous_set() {
        let db = test_db();
        db.replace_nrfi_set(date(1), &[game(1, 1.0), game(2, 2.0)]).unwrap();
        db.record_nrfi_outcome(date(1), 1, &NrfiOutcome::Final { first_inning_runs: 0 })
            .unwrap();
        db.replace_nrfi_set(date(1), &[game(9, 1.2)]).unwrap();

        let loaded = db.load_nrfi_set(date(1)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].prediction.game_id, 9);
        assert_eq!(loaded[0].outcome, NrfiOutcome::Pending);
    }

    #[test]
    fn failed_replace_leaves_previous_set_visible() {
        let db = test_db();
        db.replace_nrfi_set(date(1), &[game(1, 1.0)]).unwrap();
        // Duplicate game ids violate the primary key mid-transaction.
        let result = db.replace_nrfi_set(date(1), &[game(5, 1.0), game(5, 2.0)]);
        assert!(result.is_err());

        let loaded = db.load_nrfi_set(date(1)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].prediction.game_id, 1);
    }

    #[test]
    fn load_missing_day_is_empty() {
        let db = test_db();
        assert!(db.load_nrfi_set(date(4)).unwrap().is_empty());
        assert!(db.load_hitting_set(date(4)).unwrap().is_empty());
    }

    #[test]
    fn doubleheader_hitting_rows_are_distinct() {
        let db = test_db();
        let rows = vec![hitter(592450, 10, 0.4), hitter(592450, 11, 0.35)];
        db.replace_hitting_set(date(1), &rows).unwrap();

        let line = HittingLine {
            hits: 2,
            runs: 1,
            rbi: 0,
            summary: "2-4, R".into(),
        };
        assert!(db
            .record_hitting_outcome(date(1), 592450, 11, &HittingOutcome::Played(line.clone()))
            .unwrap());

        let loaded = db.load_hitting_set(date(1)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].outcome, HittingOutcome::Pending);
        assert_eq!(loaded[1].outcome, HittingOutcome::Played(line));
    }

    #[test]
    fn record_outcome_for_unknown_row_reports_false() {
        let db = test_db();
        assert!(!db
            .record_nrfi_outcome(date(1), 42, &NrfiOutcome::Postponed)
            .unwrap());
        assert!(!db
            .record_hitting_outcome(date(1), 1, 42, &HittingOutcome::DidNotPlay)
            .unwrap());
    }

    #[test]
    fn corpus_groups_by_day_inclusive() {
        let db = test_db();
        db.replace_nrfi_set(date(1), &[game(1, 1.0)]).unwrap();
        db.replace_nrfi_set(date(2), &[game(2, 1.0), game(3, 1.1)]).unwrap();
        db.replace_nrfi_set(date(5), &[game(4, 1.0)]).unwrap();

        let corpus = db.load_nrfi_corpus(date(1), date(2)).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[0].date, date(1));
        assert_eq!(corpus[1].rows.len(), 2);

        db.replace_hitting_set(date(3), &[hitter(7, 1, 0.3)]).unwrap();
        assert_eq!(
            db.prediction_dates().unwrap(),
            vec![date(1), date(2), date(3), date(5)]
        );
    }

    // -- weight versions --

    #[test]
    fn latest_weights_none_when_empty() {
        let db = test_db();
        assert!(db.latest_weights().unwrap().is_none());
    }

    #[test]
    fn save_weights_assigns_increasing_versions() {
        let db = test_db();
        let mut w = WeightVector::default();
        let v1 = db.save_weights(&w, "weights.toml", None).unwrap();
        w.blend.home_edge = 0.05;
        let v2 = db.save_weights(&w, "optimizer", Some(0.61)).unwrap();
        assert!(v2 > v1);

        let latest = db.latest_weights().unwrap().unwrap();
        assert_eq!(latest.version, v2);
        assert!((latest.blend.home_edge - 0.05).abs() < 1e-12);
    }
}
