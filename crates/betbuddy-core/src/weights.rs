// Versioned scoring weight vector with group-sum-to-one normalization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Form;

/// Maximum drift of a normalized family sum from 1.0.
pub const FAMILY_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("weight family `{family}` sums to {sum}, expected 1.0")]
    ConstraintViolation { family: &'static str, sum: f64 },

    #[error("weight `{name}` = {value} is outside [{lower}, {upper}]")]
    OutOfBounds {
        name: String,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("weight `{name}` is not a finite non-negative number: {value}")]
    Invalid { name: String, value: f64 },
}

// ---------------------------------------------------------------------------
// Families
// ---------------------------------------------------------------------------

/// Pitching-related NRFI weights. Normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchingWeights {
    pub era: f64,
    pub whip: f64,
    pub strikeouts_per_9: f64,
    pub home_runs_per_9: f64,
    pub first_inning_run_rate: f64,
}

impl PitchingWeights {
    pub const NAMES: [&'static str; 5] = [
        "pitching.era",
        "pitching.whip",
        "pitching.strikeouts_per_9",
        "pitching.home_runs_per_9",
        "pitching.first_inning_run_rate",
    ];

    pub fn to_array(&self) -> [f64; 5] {
        [
            self.era,
            self.whip,
            self.strikeouts_per_9,
            self.home_runs_per_9,
            self.first_inning_run_rate,
        ]
    }

    pub fn from_array(a: [f64; 5]) -> Self {
        Self {
            era: a[0],
            whip: a[1],
            strikeouts_per_9: a[2],
            home_runs_per_9: a[3],
            first_inning_run_rate: a[4],
        }
    }
}

/// Team-offense NRFI weights. Normalized to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamOffenseWeights {
    pub batting_average: f64,
    pub ops: f64,
    pub runs_per_game: f64,
    pub strikeout_rate: f64,
    pub home_run_rate: f64,
    pub first_inning_scoring_rate: f64,
}

impl TeamOffenseWeights {
    pub const NAMES: [&'static str; 6] = [
        "team_offense.batting_average",
        "team_offense.ops",
        "team_offense.runs_per_game",
        "team_offense.strikeout_rate",
        "team_offense.home_run_rate",
        "team_offense.first_inning_scoring_rate",
    ];

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.batting_average,
            self.ops,
            self.runs_per_game,
            self.strikeout_rate,
            self.home_run_rate,
            self.first_inning_scoring_rate,
        ]
    }

    pub fn from_array(a: [f64; 6]) -> Self {
        Self {
            batting_average: a[0],
            ops: a[1],
            runs_per_game: a[2],
            strikeout_rate: a[3],
            home_run_rate: a[4],
            first_inning_scoring_rate: a[5],
        }
    }
}

/// How a half-inning score blends the pitcher and the opposing lineup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NrfiBlend {
    /// Share of the half-inning score taken from the pitcher; the rest comes
    /// from the opposing offense.
    pub pitcher_share: f64,
    /// Relative advantage of playing at home. Scores are scaled by
    /// `1 - home_edge` for the home side and `1 + home_edge` for the away side.
    pub home_edge: f64,
}

/// Lower bound and weight of one hot/cold bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormBin {
    pub min_average: f64,
    pub weight: f64,
}

/// Five ordered bins from hottest to coldest. Each bin's lower bound is
/// inclusive; everything below `cool.min_average` lands in Ice Cold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormTable {
    pub on_fire: FormBin,
    pub hot: FormBin,
    pub average: FormBin,
    pub cool: FormBin,
    pub ice_cold_weight: f64,
}

impl FormTable {
    /// Classify `value` top-down. NaN fails every comparison and therefore
    /// lands in the bottom bin.
    pub fn classify(&self, value: f64) -> (Form, f64) {
        if value >= self.on_fire.min_average {
            (Form::OnFire, self.on_fire.weight)
        } else if value >= self.hot.min_average {
            (Form::Hot, self.hot.weight)
        } else if value >= self.average.min_average {
            (Form::Average, self.average.weight)
        } else if value >= self.cool.min_average {
            (Form::Cool, self.cool.weight)
        } else {
            (Form::IceCold, self.ice_cold_weight)
        }
    }

    pub fn weight_of(&self, form: Form) -> f64 {
        match form {
            Form::OnFire => self.on_fire.weight,
            Form::Hot => self.hot.weight,
            Form::Average => self.average.weight,
            Form::Cool => self.cool.weight,
            Form::IceCold => self.ice_cold_weight,
        }
    }

    fn is_descending(&self) -> bool {
        self.on_fire.min_average >= self.hot.min_average
            && self.hot.min_average >= self.average.min_average
            && self.average.min_average >= self.cool.min_average
    }
}

/// Hitting-factor weights, independent of the NRFI families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HittingWeights {
    /// Share of the adjusted batting average taken from the hitter's split;
    /// the rest comes from the pitcher's batting-average-against split.
    pub batter_share: f64,
    pub hot_cold: FormTable,
    pub career: FormTable,
}

// ---------------------------------------------------------------------------
// WeightVector
// ---------------------------------------------------------------------------

/// The full set of scoring weights. Passed explicitly to every scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    /// Version tag. `0` marks weights that were never persisted.
    #[serde(default)]
    pub version: u32,
    pub pitching: PitchingWeights,
    pub team_offense: TeamOffenseWeights,
    pub blend: NrfiBlend,
    pub hitting: HittingWeights,
}

impl WeightVector {
    /// Build a vector and renormalize both NRFI families.
    pub fn new(
        pitching: PitchingWeights,
        team_offense: TeamOffenseWeights,
        blend: NrfiBlend,
        hitting: HittingWeights,
    ) -> Self {
        let mut w = Self {
            version: 0,
            pitching,
            team_offense,
            blend,
            hitting,
        };
        w.renormalize();
        w
    }

    /// Scale each NRFI family so it sums to 1. Negative or non-finite entries
    /// are clamped to 0; a family with no positive mass becomes uniform.
    pub fn renormalize(&mut self) {
        self.pitching = PitchingWeights::from_array(normalize(self.pitching.to_array()));
        self.team_offense = TeamOffenseWeights::from_array(normalize(self.team_offense.to_array()));
    }

    /// Replace the pitching family and renormalize.
    pub fn set_pitching(&mut self, pitching: PitchingWeights) {
        self.pitching = pitching;
        self.renormalize();
    }

    /// Replace the team-offense family and renormalize.
    pub fn set_team_offense(&mut self, team_offense: TeamOffenseWeights) {
        self.team_offense = team_offense;
        self.renormalize();
    }

    /// Check family sums and per-weight bounds.
    pub fn validate(&self, lower: f64, upper: f64) -> Result<(), WeightError> {
        check_family("pitching", &self.pitching.to_array())?;
        check_family("team_offense", &self.team_offense.to_array())?;

        let named = PitchingWeights::NAMES
            .iter()
            .zip(self.pitching.to_array())
            .chain(TeamOffenseWeights::NAMES.iter().zip(self.team_offense.to_array()));
        for (name, value) in named {
            if value < lower || value > upper {
                return Err(WeightError::OutOfBounds {
                    name: name.to_string(),
                    value,
                    lower,
                    upper,
                });
            }
        }

        for (name, value) in [
            ("blend.pitcher_share", self.blend.pitcher_share),
            ("hitting.batter_share", self.hitting.batter_share),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(WeightError::Invalid {
                    name: name.into(),
                    value,
                });
            }
        }
        if !self.blend.home_edge.is_finite() || self.blend.home_edge.abs() >= 1.0 {
            return Err(WeightError::Invalid {
                name: "blend.home_edge".into(),
                value: self.blend.home_edge,
            });
        }

        for (family, table) in [("hot_cold", &self.hitting.hot_cold), ("career", &self.hitting.career)] {
            if !table.is_descending() {
                return Err(WeightError::Invalid {
                    name: format!("hitting.{family}.min_average"),
                    value: table.hot.min_average,
                });
            }
            for form in Form::ALL {
                let weight = table.weight_of(form);
                if !weight.is_finite() || weight < 0.0 {
                    return Err(WeightError::Invalid {
                        name: format!("hitting.{family}.{}", form.label()),
                        value: weight,
                    });
                }
            }
        }

        Ok(())
    }

    /// The eleven NRFI family weights as a flat point for the optimizer.
    pub fn family_point(&self) -> Vec<f64> {
        let mut point = self.pitching.to_array().to_vec();
        point.extend_from_slice(&self.team_offense.to_array());
        point
    }

    /// Copy of this vector with the NRFI families replaced by `point`
    /// (laid out as in [`family_point`](Self::family_point)) and renormalized.
    /// Returns `None` when `point` has the wrong length.
    pub fn with_family_point(&self, point: &[f64]) -> Option<WeightVector> {
        let pitching: [f64; 5] = point.get(..5)?.try_into().ok()?;
        let offense: [f64; 6] = point.get(5..)?.try_into().ok()?;
        let mut next = self.clone();
        next.version = 0;
        next.pitching = PitchingWeights::from_array(pitching);
        next.team_offense = TeamOffenseWeights::from_array(offense);
        next.renormalize();
        Some(next)
    }

    /// Names matching [`family_point`](Self::family_point), in order.
    pub fn family_names() -> Vec<&'static str> {
        PitchingWeights::NAMES
            .iter()
            .chain(TeamOffenseWeights::NAMES.iter())
            .copied()
            .collect()
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        let table = |on_fire: f64, hot: f64, average: f64, cool: f64| FormTable {
            on_fire: FormBin { min_average: on_fire, weight: 1.10 },
            hot: FormBin { min_average: hot, weight: 1.05 },
            average: FormBin { min_average: average, weight: 1.00 },
            cool: FormBin { min_average: cool, weight: 0.95 },
            ice_cold_weight: 0.90,
        };
        WeightVector::new(
            PitchingWeights {
                era: 0.25,
                whip: 0.25,
                strikeouts_per_9: 0.15,
                home_runs_per_9: 0.10,
                first_inning_run_rate: 0.25,
            },
            TeamOffenseWeights {
                batting_average: 0.15,
                ops: 0.25,
                runs_per_game: 0.20,
                strikeout_rate: 0.10,
                home_run_rate: 0.10,
                first_inning_scoring_rate: 0.20,
            },
            NrfiBlend {
                pitcher_share: 0.55,
                home_edge: 0.02,
            },
            HittingWeights {
                batter_share: 0.6,
                hot_cold: table(0.350, 0.300, 0.240, 0.200),
                career: table(0.350, 0.300, 0.240, 0.200),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize<const N: usize>(values: [f64; N]) -> [f64; N] {
    let clamped = values.map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 });
    let sum: f64 = clamped.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return [1.0 / N as f64; N];
    }
    clamped.map(|v| v / sum)
}

fn check_family(family: &'static str, values: &[f64]) -> Result<(), WeightError> {
    let sum: f64 = values.iter().sum();
    if !sum.is_finite() || (sum - 1.0).abs() > FAMILY_TOLERANCE {
        return Err(WeightError::ConstraintViolation { family, sum });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_float_eq::*;

    fn family_sums(w: &WeightVector) -> (f64, f64) {
        (
            w.pitching.to_array().iter().sum(),
            w.team_offense.to_array().iter().sum(),
        )
    }

    #[test]
    fn default_vector_is_valid() {
        let w = WeightVector::default();
        w.validate(0.0, 1.0).expect("default weights should validate");
        let (p, t) = family_sums(&w);
        assert!((p - 1.0).abs() <= FAMILY_TOLERANCE);
        assert!((t - 1.0).abs() <= FAMILY_TOLERANCE);
    }

    #[test]
    fn new_renormalizes_unscaled_families() {
        let mut base = WeightVector::default();
        base.set_pitching(PitchingWeights::from_array([2.0, 2.0, 2.0, 2.0, 2.0]));
        assert_float_absolute_eq!(base.pitching.era, 0.2, 1e-12);
        let (p, _) = family_sums(&base);
        assert!((p - 1.0).abs() <= FAMILY_TOLERANCE);
    }

    #[test]
    fn negative_and_nan_entries_clamp_to_zero() {
        let mut w = WeightVector::default();
        w.set_team_offense(TeamOffenseWeights::from_array([-1.0, f64::NAN, 1.0, 1.0, 0.0, 2.0]));
        assert_eq!(w.team_offense.batting_average, 0.0);
        assert_eq!(w.team_offense.ops, 0.0);
        assert_float_absolute_eq!(w.team_offense.first_inning_scoring_rate, 0.5, 1e-12);
    }

    #[test]
    fn all_zero_family_becomes_uniform() {
        let mut w = WeightVector::default();
        w.set_pitching(PitchingWeights::from_array([0.0; 5]));
        for v in w.pitching.to_array() {
            assert_float_absolute_eq!(v, 0.2, 1e-12);
        }
    }

    #[test]
    fn validate_reports_drift() {
        let mut w = WeightVector::default();
        w.pitching.era += 0.01;
        match w.validate(0.0, 1.0) {
            Err(WeightError::ConstraintViolation { family, .. }) => assert_eq!(family, "pitching"),
            other => panic!("expected ConstraintViolation, got {other:?}"),
        }
        w.renormalize();
        assert!(w.validate(0.0, 1.0).is_ok());
    }

    #[test]
    fn validate_enforces_bounds() {
        let w = WeightVector::default();
        match w.validate(0.12, 1.0) {
            Err(WeightError::OutOfBounds { name, .. }) => {
                assert_eq!(name, "pitching.home_runs_per_9")
            }
            other => panic!("expected OutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn family_point_round_trips_through_with_family_point() {
        let w = WeightVector::default();
        let point = w.family_point();
        assert_eq!(point.len(), 11);
        assert_eq!(WeightVector::family_names().len(), 11);
        let rebuilt = w.with_family_point(&point).unwrap();
        for (a, b) in rebuilt.family_point().iter().zip(point.iter()) {
            assert_float_absolute_eq!(*a, *b, 1e-12);
        }
        assert!(w.with_family_point(&point[..10]).is_none());
    }

    #[test]
    fn classify_is_lower_bound_inclusive() {
        let table = WeightVector::default().hitting.hot_cold;
        assert_eq!(table.classify(0.350).0, Form::OnFire);
        assert_eq!(table.classify(0.3499).0, Form::Hot);
        assert_eq!(table.classify(0.300).0, Form::Hot);
        assert_eq!(table.classify(0.240).0, Form::Average);
        assert_eq!(table.classify(0.200).0, Form::Cool);
        assert_eq!(table.classify(0.1999).0, Form::IceCold);
    }

    #[test]
    fn classify_is_total() {
        let table = WeightVector::default().hitting.career;
        for value in [f64::NEG_INFINITY, -1.0, 0.0, 1.0, 5.0, f64::INFINITY, f64::NAN] {
            let (form, weight) = table.classify(value);
            assert_eq!(weight, table.weight_of(form));
        }
        assert_eq!(table.classify(f64::NAN).0, Form::IceCold);
    }
}
