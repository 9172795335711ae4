// BetBuddy entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Parse the command line
// 3. Load config
// 4. Open database
// 5. Dispatch the subcommand and print its result

use anyhow::Context;
use clap::Parser;
use tracing::info;

use betbuddy_app::cli::{Cli, Command};
use betbuddy_app::commands::{self, App, OptimizeOverrides};
use betbuddy_core::config;
use betbuddy_engine::review::ReviewSummary;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("BetBuddy starting up");

    // 2. Parse the command line
    let cli = Cli::parse();

    // 3. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: season {}, opening day {}",
        config.season.year, config.season.opening_day
    );

    // 4. Open database
    let app = App::open(config)?;

    // 5. Dispatch
    match cli.command {
        Command::Predict { date } => {
            let summary = app.predict(date.unwrap_or_else(commands::today)).await?;
            println!(
                "{}: stored {} NRFI rows and {} hitting rows",
                summary.date, summary.nrfi_rows, summary.hitting_rows
            );
        }
        Command::Review { date } => {
            let date = date.unwrap_or_else(|| commands::day_before(commands::today()));
            let summary = app.review(date).await?;
            print_review(date, &summary);
        }
        Command::Daily => {
            let today = commands::today();
            let (review, refresh) = app.daily(today).await?;
            match review {
                Some(summary) => print_review(commands::day_before(today), &summary),
                None => println!("review of the previous day failed; see logs/betbuddy.log"),
            }
            println!(
                "{}: stored {} NRFI rows and {} hitting rows",
                refresh.date, refresh.nrfi_rows, refresh.hitting_rows
            );
        }
        Command::Accuracy { from, to, top_nrfi, top_hitting } => {
            let report = app.accuracy(from, to, top_nrfi, top_hitting)?;
            print!("{}", commands::render_report(&report));
        }
        Command::Optimize { init_points, iterations, target, seed } => {
            let overrides = OptimizeOverrides {
                init_points,
                iterations,
                target: target.map(Into::into),
                seed,
            };
            let (outcome, version) = app.optimize(overrides)?;
            println!(
                "saved weights v{version}: fitness {:.3} after {} evaluations",
                outcome.fitness, outcome.evaluations
            );
            print!("{}", commands::render_weights(&outcome.weights));
            print!("{}", commands::render_report(&outcome.report));
        }
        Command::Export { date, out } => {
            let (nrfi, hitting) = app.export(date, &out)?;
            println!("wrote {} and {}", nrfi.display(), hitting.display());
        }
    }

    info!("BetBuddy finished");
    Ok(())
}

fn print_review(date: chrono::NaiveDate, summary: &ReviewSummary) {
    println!(
        "{date}: NRFI {} final, {} pending, {} postponed; hitting {} played, {} did not play, {} pending, {} postponed; {} failed",
        summary.nrfi_final,
        summary.nrfi_pending,
        summary.nrfi_postponed,
        summary.hitting_played,
        summary.hitting_did_not_play,
        summary.hitting_pending,
        summary.hitting_postponed,
        summary.failed
    );
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("betbuddy.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("betbuddy_app=info,betbuddy_engine=info,betbuddy_core=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
