// Configuration loading and parsing (settings.toml, weights.toml, credentials.toml).

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::model::DateWindow;
use crate::weights::{WeightError, WeightVector};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub season: SeasonConfig,
    pub thresholds: ThresholdConfig,
    pub rolling_window: RollingWindowConfig,
    pub backtest: BacktestConfig,
    pub optimizer: OptimizerSettings,
    pub upstream: UpstreamConfig,
    pub weights: WeightVector,
    pub credentials: CredentialsConfig,
    pub db_path: String,
}

impl Config {
    /// `[opening_day, date)`: the season-to-date window used for every
    /// cumulative lookup.
    pub fn season_to_date(&self, date: NaiveDate) -> DateWindow {
        DateWindow::before(self.season.opening_day, date)
    }
}

// ---------------------------------------------------------------------------
// settings.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire settings.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    season: SeasonConfig,
    thresholds: ThresholdConfig,
    rolling_window: RollingWindowConfig,
    backtest: BacktestConfig,
    optimizer: OptimizerSettings,
    upstream: UpstreamConfig,
    database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    pub year: i32,
    pub opening_day: NaiveDate,
}

/// Minimum-sample gates.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    pub min_games_started: u32,
    pub min_pa_hot_cold: u32,
    pub min_pa_career: u32,
    pub qualified_pa_per_game: f64,
    #[serde(default)]
    pub min_games_played: Option<u32>,
}

/// Bounded expanding-window search for the "last N games" line.
#[derive(Debug, Clone, Deserialize)]
pub struct RollingWindowConfig {
    pub games: u32,
    pub initial_lag_days: u32,
    pub max_lookback_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    pub top_nrfi: usize,
    pub top_hitting: usize,
    pub min_nrfi_bets: usize,
    pub min_hitting_bets: usize,
}

/// Which win rate the optimizer maximizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerTarget {
    Nrfi,
    Yrfi,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSettings {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub init_points: usize,
    pub iterations: usize,
    pub seed: u64,
    pub target: OptimizerTarget,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub stats_base_url: String,
    pub weather_base_url: String,
    pub page_size: u32,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub weather_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/settings.toml`,
/// `config/weights.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults; prefer `load_config()`.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- settings.toml (required) ---
    let settings_path = config_dir.join("settings.toml");
    let settings: SettingsFile = parse_file(&settings_path)?;

    // --- weights.toml (required) ---
    let weights_path = config_dir.join("weights.toml");
    let mut weights: WeightVector = parse_file(&weights_path)?;
    if let Err(WeightError::ConstraintViolation { family, sum }) = weights.validate(f64::MIN, f64::MAX) {
        warn!("weights.toml family `{family}` sums to {sum}; renormalizing");
    }
    weights.renormalize();

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        parse_file(&credentials_path)?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        season: settings.season,
        thresholds: settings.thresholds,
        rolling_window: settings.rolling_window,
        backtest: settings.backtest,
        optimizer: settings.optimizer,
        upstream: settings.upstream,
        weights,
        credentials,
        db_path: settings.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying
/// defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = read_file(path)?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.season.opening_day.year() != config.season.year {
        return Err(invalid(
            "season.opening_day",
            format!(
                "{} is not in season {}",
                config.season.opening_day, config.season.year
            ),
        ));
    }

    let t = &config.thresholds;
    let counts: &[(&str, u32)] = &[
        ("thresholds.min_games_started", t.min_games_started),
        ("thresholds.min_pa_hot_cold", t.min_pa_hot_cold),
        ("thresholds.min_pa_career", t.min_pa_career),
        ("rolling_window.games", config.rolling_window.games),
        ("upstream.page_size", config.upstream.page_size),
        ("upstream.max_attempts", config.upstream.max_attempts),
    ];
    for (name, val) in counts {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    if t.qualified_pa_per_game <= 0.0 {
        return Err(invalid(
            "thresholds.qualified_pa_per_game",
            format!("must be > 0, got {}", t.qualified_pa_per_game),
        ));
    }

    let w = &config.rolling_window;
    if w.initial_lag_days >= w.max_lookback_days {
        return Err(invalid(
            "rolling_window.initial_lag_days",
            format!(
                "must be less than max_lookback_days ({}), got {}",
                w.max_lookback_days, w.initial_lag_days
            ),
        ));
    }

    let b = &config.backtest;
    let sizes: &[(&str, usize)] = &[
        ("backtest.top_nrfi", b.top_nrfi),
        ("backtest.top_hitting", b.top_hitting),
        ("optimizer.top_k", config.optimizer.top_k),
    ];
    for (name, val) in sizes {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    let o = &config.optimizer;
    if !(o.lower_bound >= 0.0 && o.lower_bound < o.upper_bound) {
        return Err(invalid(
            "optimizer.lower_bound",
            format!(
                "must satisfy 0 <= lower_bound < upper_bound, got [{}, {}]",
                o.lower_bound, o.upper_bound
            ),
        ));
    }
    if o.init_points == 0 {
        return Err(invalid("optimizer.init_points", "must be > 0"));
    }

    if config.upstream.initial_backoff_ms > config.upstream.max_backoff_ms {
        return Err(invalid(
            "upstream.initial_backoff_ms",
            "must not exceed max_backoff_ms",
        ));
    }

    config
        .weights
        .validate(o.lower_bound, o.upper_bound)
        .map_err(|e| invalid("weights", e.to_string()))?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::FAMILY_TOLERANCE;
    use std::fs;

    /// The workspace root holding `defaults/`.
    fn project_root() -> PathBuf {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..");
        assert!(root.join("defaults").exists(), "cannot locate defaults/ from {root:?}");
        root
    }

    /// A scratch directory with `config/` populated from `defaults/`.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        let config_dir = tmp.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        let root = project_root();
        for file in ["settings.toml", "weights.toml"] {
            fs::copy(root.join("defaults").join(file), config_dir.join(file)).unwrap();
        }
        tmp
    }

    fn rewrite(tmp: &Path, file: &str, from: &str, to: &str) {
        let path = tmp.join("config").join(file);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "{file} does not contain {from:?}");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    fn expect_field(err: ConfigError, expected: &str) {
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_valid_config_from_default_files() {
        let tmp = scratch("betbuddy_config_defaults");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.season.year, 2024);
        assert_eq!(
            config.season.opening_day,
            NaiveDate::from_ymd_opt(2024, 3, 28).unwrap()
        );
        assert_eq!(config.thresholds.min_games_started, 3);
        assert_eq!(config.thresholds.min_pa_hot_cold, 20);
        assert_eq!(config.thresholds.min_pa_career, 7);
        assert!((config.thresholds.qualified_pa_per_game - 3.1).abs() < f64::EPSILON);
        assert!(config.thresholds.min_games_played.is_none());
        assert_eq!(config.rolling_window.games, 10);
        assert_eq!(config.rolling_window.initial_lag_days, 7);
        assert_eq!(config.rolling_window.max_lookback_days, 21);
        assert_eq!(config.backtest.min_nrfi_bets, 7);
        assert_eq!(config.backtest.min_hitting_bets, 40);
        assert_eq!(config.optimizer.target, OptimizerTarget::Nrfi);
        assert_eq!(config.optimizer.seed, 1);
        assert_eq!(config.upstream.page_size, 50);
        assert_eq!(config.db_path, "betbuddy.db");
        assert!(config.credentials.weather_api_key.is_none());
        assert_eq!(config.weights, WeightVector::default());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_once_and_skips_examples() {
        let tmp = std::env::temp_dir().join("betbuddy_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        let defaults = tmp.join("defaults");
        fs::create_dir_all(&defaults).unwrap();
        fs::write(defaults.join("settings.toml"), "a = 1\n").unwrap();
        fs::write(defaults.join("credentials.toml.example"), "x = 1\n").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config").join("settings.toml")]);
        assert!(!tmp.join("config").join("credentials.toml.example").exists());

        fs::write(tmp.join("config").join("settings.toml"), "a = 2\n").unwrap();
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(tmp.join("config").join("settings.toml")).unwrap(),
            "a = 2\n"
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_weather_key() {
        let tmp = scratch("betbuddy_config_creds");
        fs::write(
            tmp.join("config").join("credentials.toml"),
            "weather_api_key = \"wx-test-key\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).expect("should load with credentials.toml");
        assert_eq!(config.credentials.weather_api_key.as_deref(), Some("wx-test-key"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unnormalized_weights_are_renormalized_on_load() {
        let tmp = scratch("betbuddy_config_renorm");
        rewrite(&tmp, "weights.toml", "era = 0.25", "era = 0.75");

        let config = load_config_from(&tmp).expect("should renormalize");
        let sum: f64 = config.weights.pitching.to_array().iter().sum();
        assert!((sum - 1.0).abs() <= FAMILY_TOLERANCE);
        assert!((config.weights.pitching.era - 0.5).abs() < 1e-12);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_weights_file_is_reported() {
        let tmp = scratch("betbuddy_config_no_weights");
        fs::remove_file(tmp.join("config").join("weights.toml")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("weights.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_opening_day_outside_season() {
        let tmp = scratch("betbuddy_config_opening_day");
        rewrite(&tmp, "settings.toml", "opening_day = \"2024-03-28\"", "opening_day = \"2023-03-30\"");
        expect_field(load_config_from(&tmp).unwrap_err(), "season.opening_day");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_min_games_started() {
        let tmp = scratch("betbuddy_config_min_gs");
        rewrite(&tmp, "settings.toml", "min_games_started = 3", "min_games_started = 0");
        expect_field(load_config_from(&tmp).unwrap_err(), "thresholds.min_games_started");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_lag_beyond_lookback() {
        let tmp = scratch("betbuddy_config_lag");
        rewrite(&tmp, "settings.toml", "initial_lag_days = 7", "initial_lag_days = 30");
        expect_field(load_config_from(&tmp).unwrap_err(), "rolling_window.initial_lag_days");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_inverted_optimizer_bounds() {
        let tmp = scratch("betbuddy_config_bounds");
        rewrite(&tmp, "settings.toml", "lower_bound = 0.0", "lower_bound = 2.0");
        expect_field(load_config_from(&tmp).unwrap_err(), "optimizer.lower_bound");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_optimizer_target() {
        let tmp = scratch("betbuddy_config_target");
        rewrite(&tmp, "settings.toml", "target = \"nrfi\"", "target = \"both\"");
        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn season_to_date_window_excludes_game_day() {
        let tmp = scratch("betbuddy_config_window");
        let config = load_config_from(&tmp).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let window = config.season_to_date(day);
        assert_eq!(window.start, config.season.opening_day);
        assert!(!window.contains(day));
        let _ = fs::remove_dir_all(&tmp);
    }
}
