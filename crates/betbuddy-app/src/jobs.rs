// Background prediction refresh.
//
// A refresh builds both prediction sets for one date and swaps them into the
// database. Each trigger spawns exactly one run; a second trigger for a date
// that is still running is rejected rather than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use betbuddy_core::db::Database;
use betbuddy_core::stats_api::StatsFeed;
use betbuddy_engine::predictor::Predictor;

/// Row counts written by one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub date: NaiveDate,
    pub nrfi_rows: usize,
    pub hitting_rows: usize,
}

#[async_trait]
pub trait RefreshJob: Send + Sync + 'static {
    async fn run(&self, date: NaiveDate) -> anyhow::Result<RefreshSummary>;
}

/// Predict a day and replace its stored sets.
pub struct PredictionRefresh<F> {
    predictor: Predictor<F>,
    db: Arc<Database>,
}

impl<F> PredictionRefresh<F> {
    pub fn new(predictor: Predictor<F>, db: Arc<Database>) -> Self {
        Self { predictor, db }
    }
}

#[async_trait]
impl<F: StatsFeed + 'static> RefreshJob for PredictionRefresh<F> {
    async fn run(&self, date: NaiveDate) -> anyhow::Result<RefreshSummary> {
        let day = self
            .predictor
            .run_day(date)
            .await
            .with_context(|| format!("failed to build predictions for {date}"))?;
        self.db.replace_nrfi_set(date, &day.nrfi)?;
        self.db.replace_hitting_set(date, &day.hitting)?;
        Ok(RefreshSummary {
            date,
            nrfi_rows: day.nrfi.len(),
            hitting_rows: day.hitting.len(),
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("a refresh for {0} is already running")]
    AlreadyRunning(NaiveDate),
}

/// Removes the date from the in-flight set when the run ends, however it ends.
struct InFlight {
    dates: Arc<Mutex<HashSet<NaiveDate>>>,
    date: NaiveDate,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.dates.lock().expect("in-flight mutex poisoned").remove(&self.date);
    }
}

pub struct RefreshCoordinator<J> {
    job: Arc<J>,
    in_flight: Arc<Mutex<HashSet<NaiveDate>>>,
}

impl<J: RefreshJob> RefreshCoordinator<J> {
    pub fn new(job: J) -> Self {
        Self {
            job: Arc::new(job),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_running(&self, date: NaiveDate) -> bool {
        self.in_flight.lock().expect("in-flight mutex poisoned").contains(&date)
    }

    /// Spawn one refresh for `date` on the runtime.
    pub fn trigger(&self, date: NaiveDate) -> Result<JoinHandle<anyhow::Result<RefreshSummary>>, TriggerError> {
        if !self.in_flight.lock().expect("in-flight mutex poisoned").insert(date) {
            warn!("refresh for {date} rejected: already running");
            return Err(TriggerError::AlreadyRunning(date));
        }
        let guard = InFlight {
            dates: Arc::clone(&self.in_flight),
            date,
        };
        let job = Arc::clone(&self.job);
        Ok(tokio::spawn(async move {
            let _guard = guard;
            info!("refresh for {date} started");
            let result = job.run(date).await;
            match &result {
                Ok(summary) => info!(
                    "refresh for {date} finished: {} NRFI rows, {} hitting rows",
                    summary.nrfi_rows, summary.hitting_rows
                ),
                Err(e) => warn!("refresh for {date} failed: {e:#}"),
            }
            result
        }))
    }
}
