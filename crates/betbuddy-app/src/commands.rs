// Command handlers. Each one wires config, the database and the engine for
// a single CLI invocation.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use tracing::{info, warn};

use betbuddy_core::config::{Config, OptimizerTarget};
use betbuddy_core::db::Database;
use betbuddy_core::model::HittingThreshold;
use betbuddy_core::stats_api::{CachingFeed, HttpStatsFeed};
use betbuddy_core::weights::WeightVector;
use betbuddy_engine::aggregator::{SampleRules, StatAggregator};
use betbuddy_engine::backtest::{evaluate, AccuracyReport, BacktestPolicy, Corpus};
use betbuddy_engine::optimizer::{optimize, OptimizerConfig, OptimizerOutcome};
use betbuddy_engine::predictor::Predictor;
use betbuddy_engine::review::{OutcomeReviewer, ReviewSummary};

use crate::export::{write_hitting, write_nrfi};
use crate::jobs::{PredictionRefresh, RefreshCoordinator, RefreshSummary};

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn day_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

/// The most recently saved weight version, or the configured weights when
/// none has been saved.
pub fn active_weights(db: &Database, configured: &WeightVector) -> Result<WeightVector> {
    Ok(match db.latest_weights()? {
        Some(weights) => weights,
        None => configured.clone(),
    })
}

// ---------------------------------------------------------------------------
// Accuracy and optimization (offline)
// ---------------------------------------------------------------------------

pub fn load_corpus(db: &Database, from: NaiveDate, to: NaiveDate) -> Result<Corpus> {
    Ok(Corpus {
        nrfi: db.load_nrfi_corpus(from, to)?,
        hitting: db.load_hitting_corpus(from, to)?,
    })
}

/// Resolve an accuracy range. Open ends default to the first and last stored
/// prediction dates, then to `fallback` when nothing is stored.
pub fn accuracy_range(
    db: &Database,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    fallback: (NaiveDate, NaiveDate),
) -> Result<(NaiveDate, NaiveDate)> {
    let stored = if from.is_none() || to.is_none() {
        db.prediction_dates()?
    } else {
        Vec::new()
    };
    let from = from.or_else(|| stored.first().copied()).unwrap_or(fallback.0);
    let to = to.or_else(|| stored.last().copied()).unwrap_or(fallback.1);
    Ok((from, to))
}

pub fn run_accuracy(
    db: &Database,
    weights: &WeightVector,
    policy: &BacktestPolicy,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<AccuracyReport> {
    let corpus = load_corpus(db, from, to)?;
    Ok(evaluate(&corpus, weights, policy))
}

/// Tune against every stored NRFI day in `[from, to]` and save the result
/// as a new weight version.
pub fn run_optimizer(
    db: &Database,
    base: &WeightVector,
    config: &OptimizerConfig,
    policy: BacktestPolicy,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(OptimizerOutcome, u32)> {
    let corpus = Corpus {
        nrfi: db.load_nrfi_corpus(from, to)?,
        hitting: Vec::new(),
    };
    let outcome = optimize(config, &corpus, base, policy)?;
    let version = db
        .save_weights(&outcome.weights, "optimizer", Some(outcome.fitness))
        .context("failed to save optimized weights")?;
    info!("saved optimized weights as version {version}");
    Ok((outcome, version))
}

pub fn render_report(report: &AccuracyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "NRFI days: {} included, {} excluded",
        report.nrfi_days.included, report.nrfi_days.excluded
    );
    let _ = writeln!(
        out,
        "  NRFI (top {}): {}/{} = {:.1}%",
        report.top_nrfi,
        report.nrfi.wins,
        report.nrfi.picks,
        report.nrfi.rate() * 100.0
    );
    let _ = writeln!(
        out,
        "  YRFI (bottom {}): {}/{} = {:.1}%",
        report.top_nrfi,
        report.yrfi.wins,
        report.yrfi.picks,
        report.yrfi.rate() * 100.0
    );
    let _ = writeln!(
        out,
        "Hitting days: {} included, {} excluded",
        report.hitting_days.included, report.hitting_days.excluded
    );
    for threshold in HittingThreshold::ALL {
        let tally = report.hitting(threshold);
        let _ = writeln!(
            out,
            "  {} (top {}): {}/{} = {:.1}%",
            threshold.label(),
            report.top_hitting,
            tally.wins,
            tally.picks,
            tally.rate() * 100.0
        );
    }
    out
}

/// One `name = value` line per NRFI family weight.
pub fn render_weights(weights: &WeightVector) -> String {
    let mut out = String::new();
    for (name, value) in WeightVector::family_names().into_iter().zip(weights.family_point()) {
        let _ = writeln!(out, "  {name} = {value:.4}");
    }
    out
}

/// Write `nrfi_<date>.csv` and `hitting_<date>.csv` into `dir`.
pub fn export_day(db: &Database, date: NaiveDate, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let nrfi_path = dir.join(format!("nrfi_{date}.csv"));
    let hitting_path = dir.join(format!("hitting_{date}.csv"));

    let nrfi = db.load_nrfi_set(date)?;
    let file = File::create(&nrfi_path).with_context(|| format!("failed to create {}", nrfi_path.display()))?;
    write_nrfi(file, &nrfi).context("failed to write NRFI CSV")?;

    let hitting = db.load_hitting_set(date)?;
    let file = File::create(&hitting_path).with_context(|| format!("failed to create {}", hitting_path.display()))?;
    write_hitting(file, &hitting).context("failed to write hitting CSV")?;

    info!("exported {} NRFI and {} hitting rows for {date}", nrfi.len(), hitting.len());
    Ok((nrfi_path, hitting_path))
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Optional command-line overrides for an optimizer run.
#[derive(Debug, Clone, Default)]
pub struct OptimizeOverrides {
    pub init_points: Option<usize>,
    pub iterations: Option<usize>,
    pub target: Option<OptimizerTarget>,
    pub seed: Option<u64>,
}

pub struct App {
    config: Config,
    db: Arc<Database>,
}

impl App {
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(&config.db_path).context("failed to open database")?;
        info!("Database opened at {}", config.db_path);
        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    pub fn weights(&self) -> Result<WeightVector> {
        active_weights(&self.db, &self.config.weights)
    }

    fn feed(&self) -> Result<CachingFeed<HttpStatsFeed>> {
        let http = HttpStatsFeed::from_config(&self.config.upstream).context("failed to build stats client")?;
        Ok(CachingFeed::new(http))
    }

    pub async fn predict(&self, date: NaiveDate) -> Result<RefreshSummary> {
        let weights = self.weights()?;
        info!("predicting {date} with weights v{}", weights.version);
        let predictor = Predictor::from_config(self.feed()?, &self.config, weights);
        let coordinator = RefreshCoordinator::new(PredictionRefresh::new(predictor, Arc::clone(&self.db)));
        coordinator
            .trigger(date)?
            .await
            .context("prediction task aborted")?
    }

    pub async fn review(&self, date: NaiveDate) -> Result<ReviewSummary> {
        let aggregator = StatAggregator::new(self.feed()?, SampleRules::from_config(&self.config));
        let mut reviewer = OutcomeReviewer::new(&aggregator, self.config.season.year);
        reviewer.review_day(&self.db, date).await
    }

    /// Review the previous day, then predict `date`. A failed review does not
    /// stop the prediction run.
    pub async fn daily(&self, date: NaiveDate) -> Result<(Option<ReviewSummary>, RefreshSummary)> {
        let yesterday = day_before(date);
        let review = match self.review(yesterday).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("review of {yesterday} failed: {e:#}");
                None
            }
        };
        let refresh = self.predict(date).await?;
        Ok((review, refresh))
    }

    pub fn accuracy(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        top_nrfi: Option<usize>,
        top_hitting: Option<usize>,
    ) -> Result<AccuracyReport> {
        let defaults = BacktestPolicy::from_config(&self.config);
        let policy = BacktestPolicy {
            top_nrfi: top_nrfi.unwrap_or(defaults.top_nrfi).max(1),
            top_hitting: top_hitting.unwrap_or(defaults.top_hitting).max(1),
            ..defaults
        };
        let fallback = (self.config.season.opening_day, day_before(today()));
        let (from, to) = accuracy_range(&self.db, from, to, fallback)?;
        info!("accuracy over {from}..={to}");
        run_accuracy(&self.db, &self.weights()?, &policy, from, to)
    }

    pub fn optimize(&self, overrides: OptimizeOverrides) -> Result<(OptimizerOutcome, u32)> {
        let mut config = OptimizerConfig::from_settings(&self.config.optimizer);
        config.init_points = overrides.init_points.unwrap_or(config.init_points);
        config.iterations = overrides.iterations.unwrap_or(config.iterations);
        config.target = overrides.target.unwrap_or(config.target);
        config.seed = overrides.seed.unwrap_or(config.seed);

        let base = self.weights()?;
        info!(
            "optimizing from weights v{} ({} exploration points, {} iterations, seed {})",
            base.version, config.init_points, config.iterations, config.seed
        );
        run_optimizer(
            &self.db,
            &base,
            &config,
            BacktestPolicy::from_config(&self.config),
            self.config.season.opening_day,
            day_before(today()),
        )
    }

    pub fn export(&self, date: NaiveDate, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        export_day(&self.db, date, dir)
    }
}
