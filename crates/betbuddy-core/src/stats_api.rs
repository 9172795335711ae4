// Upstream statistics client: query catalogue, bounded retry, HTTP transport
// and a per-run memoizing wrapper.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::model::{GameId, PlayerId, TeamId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("upstream does not recognise {url}")]
    NotFound { url: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Whether another attempt at the same query could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Transport { .. } | UpstreamError::Decode { .. } => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::NotFound { .. } | UpstreamError::RetriesExhausted { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Query catalogue
// ---------------------------------------------------------------------------

/// Every upstream lookup the engine performs. Each query maps to exactly one
/// URL, so identical queries can be memoized safely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatsQuery {
    /// The day's schedule with probable pitchers.
    Schedule { date: NaiveDate },
    /// Live feed (line score, plays, box score) of one game.
    GameFeed { game_id: GameId },
    /// Biographical record, including bat side and pitch hand.
    PersonInfo { player_id: PlayerId },
    PitchingByDateRange {
        player_id: PlayerId,
        season: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
    HittingByDateRange {
        player_id: PlayerId,
        season: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
    TeamHittingByDateRange {
        team_id: TeamId,
        season: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
    PitchingSplits { player_id: PlayerId, season: i32 },
    HittingSplits { player_id: PlayerId, season: i32 },
    CareerVsPitcher { hitter_id: PlayerId, pitcher_id: PlayerId },
    PitchingGameLog {
        player_id: PlayerId,
        season: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
    HittingGameLog {
        player_id: PlayerId,
        season: i32,
        start: NaiveDate,
    },
    /// A team's games in a date range.
    TeamSchedule {
        team_id: TeamId,
        season: i32,
        start: NaiveDate,
        end: NaiveDate,
    },
    Standings { date: NaiveDate, season: i32 },
    /// One page of the season's qualified hitters.
    QualifiedHitters { season: i32, offset: u32, limit: u32 },
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

impl StatsQuery {
    /// Path and query string relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            StatsQuery::Schedule { date } => format!(
                "v1/schedule?sportId=1&hydrate=probablePitcher&startDate={d}&endDate={d}",
                d = fmt_date(*date)
            ),
            StatsQuery::GameFeed { game_id } => format!("v1.1/game/{game_id}/feed/live"),
            StatsQuery::PersonInfo { player_id } => format!("v1/people/{player_id}"),
            StatsQuery::PitchingByDateRange { player_id, season, start, end } => format!(
                "v1/people/{player_id}?sportId=1&hydrate=stats(group=[pitching],type=[byDateRange],startDate={},endDate={},season={season})",
                fmt_date(*start),
                fmt_date(*end)
            ),
            StatsQuery::HittingByDateRange { player_id, season, start, end } => format!(
                "v1/people/{player_id}?sportId=1&hydrate=stats(group=[hitting],type=[byDateRange],startDate={},endDate={},season={season})",
                fmt_date(*start),
                fmt_date(*end)
            ),
            StatsQuery::TeamHittingByDateRange { team_id, season, start, end } => format!(
                "v1/teams/{team_id}/stats?group=hitting&season={season}&sportIds=1&stats=byDateRange&startDate={}&endDate={}",
                fmt_date(*start),
                fmt_date(*end)
            ),
            StatsQuery::PitchingSplits { player_id, season } => format!(
                "v1/people/{player_id}?hydrate=stats(group=[pitching],type=[statSplits],sitCodes=[vr,vl],season={season})"
            ),
            StatsQuery::HittingSplits { player_id, season } => format!(
                "v1/people/{player_id}?hydrate=stats(group=[hitting],type=[statSplits],sitCodes=[vr,vl],season={season})"
            ),
            StatsQuery::CareerVsPitcher { hitter_id, pitcher_id } => format!(
                "v1/people?personIds={hitter_id}&hydrate=stats(group=[hitting],type=[vsPlayerTotal],opposingPlayerId={pitcher_id},sportId=1)"
            ),
            StatsQuery::PitchingGameLog { player_id, season, start, end } => format!(
                "v1/people/{player_id}/stats?stats=gameLog&group=pitching&season={season}&startDate={}&endDate={}",
                fmt_date(*start),
                fmt_date(*end)
            ),
            StatsQuery::HittingGameLog { player_id, season, start } => format!(
                "v1/people/{player_id}/stats?stats=gameLog&group=hitting&season={season}&startDate={}",
                fmt_date(*start)
            ),
            StatsQuery::TeamSchedule { team_id, season, start, end } => format!(
                "v1/schedule?sportId=1&teamId={team_id}&startDate={}&endDate={}&season={season}",
                fmt_date(*start),
                fmt_date(*end)
            ),
            StatsQuery::Standings { date, season } => format!(
                "v1/standings?standingsTypes=regularSeason&leagueId=103,104&date={}&season={season}",
                fmt_date(*date)
            ),
            StatsQuery::QualifiedHitters { season, offset, limit } => format!(
                "v1/stats?stats=season&group=hitting&season={season}&playerPool=QUALIFIED&limit={limit}&offset={offset}"
            ),
        }
    }

    /// Absolute URL under `base` (e.g. `https://statsapi.mlb.com/api`).
    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.path())
    }
}

// ---------------------------------------------------------------------------
// Feed trait
// ---------------------------------------------------------------------------

/// Read-only access to the upstream statistics provider.
#[async_trait]
pub trait StatsFeed: Send + Sync {
    async fn fetch_json(&self, query: &StatsQuery) -> Result<Value, UpstreamError>;
}

#[async_trait]
impl<F: StatsFeed + ?Sized> StatsFeed for Arc<F> {
    async fn fetch_json(&self, query: &StatsQuery) -> Result<Value, UpstreamError> {
        (**self).fetch_json(query).await
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. Transient failures sleep for the policy's backoff between attempts.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpstreamError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= max_attempts => {
                return Err(UpstreamError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!("upstream attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {e}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// `StatsFeed` backed by the public stats API over HTTP.
pub struct HttpStatsFeed {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl HttpStatsFeed {
    pub fn new(http: reqwest::Client, base_url: String, policy: RetryPolicy) -> Self {
        Self {
            http,
            base_url,
            policy,
        }
    }

    /// Build a client with the configured timeout and retry policy.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Transport {
                url: config.stats_base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self::new(
            http,
            config.stats_base_url.clone(),
            RetryPolicy::from_config(config),
        ))
    }

    async fn fetch_once(&self, url: &str) -> Result<Value, UpstreamError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| UpstreamError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl StatsFeed for HttpStatsFeed {
    async fn fetch_json(&self, query: &StatsQuery) -> Result<Value, UpstreamError> {
        let url = query.url(&self.base_url);
        debug!("GET {url}");
        retry_with_backoff(&self.policy, || self.fetch_once(&url)).await
    }
}

// ---------------------------------------------------------------------------
// Memoization
// ---------------------------------------------------------------------------

/// Wraps a feed and remembers every successful response for the lifetime of
/// the wrapper. Failures are not cached.
pub struct CachingFeed<F> {
    inner: F,
    cache: Mutex<HashMap<StatsQuery, Value>>,
}

impl<F: StatsFeed> CachingFeed<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct queries held.
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<F: StatsFeed> StatsFeed for CachingFeed<F> {
    async fn fetch_json(&self, query: &StatsQuery) -> Result<Value, UpstreamError> {
        if let Some(hit) = self.cache.lock().ok().and_then(|c| c.get(query).cloned()) {
            return Ok(hit);
        }
        let value = self.inner.fetch_json(query).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(query.clone(), value.clone());
        }
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
