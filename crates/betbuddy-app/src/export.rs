// CSV export of a stored day's prediction sets.

use std::io::Write;

use serde::Serialize;

use betbuddy_core::model::{HittingOutcome, HittingRow, NrfiOutcome, NrfiRow};

#[derive(Debug, Serialize)]
struct NrfiRecord<'a> {
    rank: usize,
    date: String,
    game_id: u64,
    away: &'a str,
    home: &'a str,
    away_pitcher: &'a str,
    home_pitcher: &'a str,
    stadium: &'a str,
    top_first: f64,
    bottom_first: f64,
    ballpark_factor: f64,
    weather_factor: f64,
    overall: f64,
    outcome: String,
}

#[derive(Debug, Serialize)]
struct HittingRecord<'a> {
    rank: usize,
    date: String,
    game_id: u64,
    hitter: &'a str,
    team: &'a str,
    opponent: &'a str,
    pitcher: &'a str,
    bat_side: String,
    pitch_hand: String,
    adjusted_ba: f64,
    hot_cold: &'static str,
    career: &'static str,
    overall: f64,
    outcome: String,
}

pub fn nrfi_outcome_label(outcome: &NrfiOutcome) -> String {
    match outcome {
        NrfiOutcome::Pending => "Pending".into(),
        NrfiOutcome::Postponed => "Postponed".into(),
        NrfiOutcome::Final { first_inning_runs: 0 } => "NRFI".into(),
        NrfiOutcome::Final { first_inning_runs } => format!("YRFI ({first_inning_runs})"),
    }
}

pub fn hitting_outcome_label(outcome: &HittingOutcome) -> String {
    match outcome {
        HittingOutcome::Pending => "Pending".into(),
        HittingOutcome::Postponed => "Postponed".into(),
        HittingOutcome::DidNotPlay => "Did not play".into(),
        HittingOutcome::Played(line) if !line.summary.is_empty() => line.summary.clone(),
        HittingOutcome::Played(line) => format!("{} H, {} R, {} RBI", line.hits, line.runs, line.rbi),
    }
}

/// Write NRFI rows in stored rank order, best NRFI pick first.
pub fn write_nrfi<W: Write>(writer: W, rows: &[NrfiRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (rank, row) in rows.iter().enumerate() {
        let p = &row.prediction;
        wtr.serialize(NrfiRecord {
            rank: rank + 1,
            date: p.date.to_string(),
            game_id: p.game_id,
            away: &p.away.team_name,
            home: &p.home.team_name,
            away_pitcher: &p.away.pitcher.entity.name,
            home_pitcher: &p.home.pitcher.entity.name,
            stadium: &p.local.stadium,
            top_first: p.scores.top_first,
            bottom_first: p.scores.bottom_first,
            ballpark_factor: p.local.ballpark_factor,
            weather_factor: p.scores.weather_factor,
            overall: p.scores.overall,
            outcome: nrfi_outcome_label(&row.outcome),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write hitting rows in stored rank order, best pick first.
pub fn write_hitting<W: Write>(writer: W, rows: &[HittingRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for (rank, row) in rows.iter().enumerate() {
        let p = &row.prediction;
        wtr.serialize(HittingRecord {
            rank: rank + 1,
            date: p.date.to_string(),
            game_id: p.game_id,
            hitter: &p.hitter.name,
            team: &p.team_name,
            opponent: &p.opponent_name,
            pitcher: &p.pitcher.name,
            bat_side: format!("{:?}", p.bat_side),
            pitch_hand: format!("{:?}", p.pitch_hand),
            adjusted_ba: p.scores.adjusted_ba,
            hot_cold: p.scores.hot_cold.form.label(),
            career: p.scores.career.form.label(),
            overall: p.scores.overall,
            outcome: hitting_outcome_label(&row.outcome),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
