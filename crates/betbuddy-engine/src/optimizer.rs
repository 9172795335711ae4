// Weight optimizer: seeded random exploration followed by a shrinking local
// search over the eleven NRFI family weights, scored by the backtest.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use betbuddy_core::config::{OptimizerSettings, OptimizerTarget};
use betbuddy_core::weights::WeightVector;

use crate::backtest::{evaluate, AccuracyReport, BacktestPolicy, Corpus};

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("invalid optimizer config: {0}")]
    InvalidConfig(String),

    #[error("no stored day has enough NRFI rows for K = {top_k}")]
    NoEligibleDays { top_k: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Bounds on every raw coordinate before renormalization.
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub init_points: usize,
    pub iterations: usize,
    pub seed: u64,
    pub target: OptimizerTarget,
    pub top_k: usize,
    /// Starting half-width of the local search, as a fraction of the bounds.
    pub initial_radius: f64,
    /// Radius multiplier after an iteration that fails to improve.
    pub shrink: f64,
}

impl OptimizerConfig {
    pub fn from_settings(settings: &OptimizerSettings) -> Self {
        Self {
            lower_bound: settings.lower_bound,
            upper_bound: settings.upper_bound,
            init_points: settings.init_points,
            iterations: settings.iterations,
            seed: settings.seed,
            target: settings.target,
            top_k: settings.top_k,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), OptimizerError> {
        let invalid = |msg: String| Err(OptimizerError::InvalidConfig(msg));
        if !(self.lower_bound >= 0.0 && self.lower_bound < self.upper_bound && self.upper_bound.is_finite()) {
            return invalid(format!(
                "bounds must satisfy 0 <= lower < upper, got [{}, {}]",
                self.lower_bound, self.upper_bound
            ));
        }
        if self.top_k == 0 {
            return invalid("top_k must be at least 1".into());
        }
        if !(self.initial_radius > 0.0 && self.initial_radius <= 1.0) {
            return invalid(format!("initial radius must be in (0, 1], got {}", self.initial_radius));
        }
        if !(self.shrink > 0.0 && self.shrink < 1.0) {
            return invalid(format!("shrink factor must be in (0, 1), got {}", self.shrink));
        }
        Ok(())
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            lower_bound: 0.0,
            upper_bound: 1.0,
            init_points: 10,
            iterations: 40,
            seed: 1,
            target: OptimizerTarget::Nrfi,
            top_k: 1,
            initial_radius: 0.25,
            shrink: 0.85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub weights: WeightVector,
    pub fitness: f64,
    pub evaluations: usize,
}

/// Maximize `fitness` over the NRFI family weights starting from `base`.
///
/// `base` is evaluated first, then `init_points` uniform samples within the
/// bounds, then `iterations` perturbations of the incumbent. A candidate
/// replaces the incumbent only on strict improvement. Every candidate is
/// renormalized before it is scored, so the returned vector always has both
/// families summing to one.
pub fn search(
    config: &OptimizerConfig,
    base: &WeightVector,
    mut fitness: impl FnMut(&WeightVector) -> f64,
) -> Result<SearchOutcome, OptimizerError> {
    config.validate()?;
    let dims = base.family_point().len();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let (lower, upper) = (config.lower_bound, config.upper_bound);

    let candidate = |point: &[f64]| -> Result<WeightVector, OptimizerError> {
        base.with_family_point(point)
            .ok_or_else(|| OptimizerError::InvalidConfig(format!("expected {dims} weights, got {}", point.len())))
    };

    let mut best = base.clone();
    best.renormalize();
    best.version = 0;
    let mut best_fitness = fitness(&best);
    let mut evaluations = 1;
    debug!("base fitness {best_fitness:.4}");

    for _ in 0..config.init_points {
        let point: Vec<f64> = (0..dims).map(|_| rng.gen_range(lower..=upper)).collect();
        let weights = candidate(&point)?;
        let value = fitness(&weights);
        evaluations += 1;
        if value > best_fitness {
            info!("exploration: fitness {best_fitness:.4} -> {value:.4}");
            best = weights;
            best_fitness = value;
        }
    }

    let mut radius = config.initial_radius * (upper - lower);
    for iteration in 0..config.iterations {
        let point: Vec<f64> = best
            .family_point()
            .iter()
            .map(|x| (x + rng.gen_range(-radius..=radius)).clamp(lower, upper))
            .collect();
        let weights = candidate(&point)?;
        let value = fitness(&weights);
        evaluations += 1;
        if value > best_fitness {
            info!("iteration {iteration}: fitness {best_fitness:.4} -> {value:.4}");
            best = weights;
            best_fitness = value;
        } else {
            radius *= config.shrink;
        }
    }

    Ok(SearchOutcome {
        weights: best,
        fitness: best_fitness,
        evaluations,
    })
}

#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    pub weights: WeightVector,
    pub fitness: f64,
    pub evaluations: usize,
    /// Full backtest of the returned weights.
    pub report: AccuracyReport,
}

/// Tune `base` against the stored corpus. Fitness is the NRFI or YRFI win
/// rate of the top/bottom `top_k` picks per eligible day.
pub fn optimize(
    config: &OptimizerConfig,
    corpus: &Corpus,
    base: &WeightVector,
    policy: BacktestPolicy,
) -> Result<OptimizerOutcome, OptimizerError> {
    config.validate()?;
    let policy = BacktestPolicy {
        top_nrfi: config.top_k,
        ..policy
    };
    if corpus.nrfi.iter().all(|day| day.rows.len() < policy.nrfi_day_minimum()) {
        return Err(OptimizerError::NoEligibleDays { top_k: config.top_k });
    }

    let target = config.target;
    let outcome = search(config, base, |weights| {
        let report = evaluate(corpus, weights, &policy);
        match target {
            OptimizerTarget::Nrfi => report.nrfi_rate(),
            OptimizerTarget::Yrfi => report.yrfi_rate(),
        }
    })?;
    let report = evaluate(corpus, &outcome.weights, &policy);
    info!(
        "optimizer finished after {} evaluations: {:?} fitness {:.4}",
        outcome.evaluations, target, outcome.fitness
    );

    Ok(OptimizerOutcome {
        weights: outcome.weights,
        fitness: outcome.fitness,
        evaluations: outcome.evaluations,
        report,
    })
}
