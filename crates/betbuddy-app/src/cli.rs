// Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use betbuddy_core::config::OptimizerTarget;

#[derive(Debug, Parser)]
#[command(name = "betbuddy", version, about = "MLB first-inning and hitting prediction engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and store both prediction sets for a date (default: today).
    Predict {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record outcomes for a stored date (default: yesterday).
    Review {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Review yesterday, then predict today.
    Daily,
    /// Backtest stored predictions with the active weights.
    Accuracy {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        top_nrfi: Option<usize>,
        #[arg(long)]
        top_hitting: Option<usize>,
    },
    /// Tune the NRFI weights against stored outcomes and save a new version.
    Optimize {
        #[arg(long)]
        init_points: Option<usize>,
        #[arg(long)]
        iterations: Option<usize>,
        #[arg(long, value_enum)]
        target: Option<Target>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write a stored date's prediction sets as CSV files into a directory.
    Export {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Nrfi,
    Yrfi,
}

impl From<Target> for OptimizerTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::Nrfi => OptimizerTarget::Nrfi,
            Target::Yrfi => OptimizerTarget::Yrfi,
        }
    }
}
