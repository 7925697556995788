//! Parameter search spaces: exhaustive grids and sampled distributions.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use stratlab_core::domain::{ParamValue, ParameterSet};

use super::OptimizeError;

/// Ordered axes of candidate values. The last axis varies fastest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis. A repeated name replaces the earlier axis in place.
    pub fn axis<V: Into<ParamValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let name = name.into();
        let values: Vec<ParamValue> = values.into_iter().map(Into::into).collect();
        match self.axes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = values,
            None => self.axes.push((name, values)),
        }
        self
    }

    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    /// Number of combinations. A grid without axes has one (empty) point.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|(_, v)| v.len()).product()
    }

    /// Cartesian product in enumeration order.
    pub fn points(&self) -> Vec<ParameterSet> {
        let mut points = vec![ParameterSet::new()];
        for (name, values) in &self.axes {
            points = points
                .iter()
                .flat_map(|p| values.iter().map(move |v| p.clone().with(name.clone(), v.clone())))
                .collect();
        }
        points
    }
}

/// Distribution a single parameter is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamDistribution {
    Choice { values: Vec<ParamValue> },
    /// Inclusive on both ends.
    IntRange { min: i64, max: i64 },
    Uniform { min: f64, max: f64 },
    LogUniform { min: f64, max: f64 },
}

impl ParamDistribution {
    pub fn validate(&self, name: &str) -> Result<(), OptimizeError> {
        let bad = |reason: &str| {
            Err(OptimizeError::InvalidSpace(format!("{name}: {reason}")))
        };
        match self {
            ParamDistribution::Choice { values } if values.is_empty() => bad("empty choice"),
            ParamDistribution::IntRange { min, max } if min > max => bad("min > max"),
            ParamDistribution::Uniform { min, max } if !(min.is_finite() && max.is_finite() && min < max) => {
                bad("requires finite min < max")
            }
            ParamDistribution::LogUniform { min, max } if !(*min > 0.0 && max.is_finite() && min < max) => {
                bad("requires 0 < min < max")
            }
            _ => Ok(()),
        }
    }

    /// Draw one value. Call [`validate`](Self::validate) first.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParamDistribution::Choice { values } => values[rng.gen_range(0..values.len())].clone(),
            ParamDistribution::IntRange { min, max } => ParamValue::Int(rng.gen_range(*min..=*max)),
            ParamDistribution::Uniform { min, max } => ParamValue::Float(rng.gen_range(*min..*max)),
            ParamDistribution::LogUniform { min, max } => {
                ParamValue::Float(rng.gen_range(min.ln()..max.ln()).exp())
            }
        }
    }
}

/// Random search: `samples` independent draws over named distributions.
///
/// Sample `i` is seeded from `(seed, i)` alone, so any single point can be
/// regenerated without replaying the ones before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSpace {
    pub params: Vec<(String, ParamDistribution)>,
    pub samples: usize,
    pub seed: u64,
}

impl RandomSpace {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self {
            params: Vec::new(),
            samples,
            seed,
        }
    }

    pub fn param(mut self, name: impl Into<String>, dist: ParamDistribution) -> Self {
        self.params.push((name.into(), dist));
        self
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        self.params.iter().try_for_each(|(n, d)| d.validate(n))
    }

    pub fn sample_at(&self, index: usize) -> ParameterSet {
        let mut rng = StdRng::seed_from_u64(sample_seed(self.seed, index));
        self.params
            .iter()
            .map(|(name, dist)| (name.clone(), dist.sample(&mut rng)))
            .collect()
    }

    pub fn points(&self) -> Vec<ParameterSet> {
        (0..self.samples).map(|i| self.sample_at(i)).collect()
    }
}

fn sample_seed(master: u64, index: usize) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master.to_le_bytes());
    hasher.update(&(index as u64).to_le_bytes());
    let bytes = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&bytes.as_bytes()[..8]);
    u64::from_le_bytes(out)
}

/// What an optimization enumerates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SearchSpace {
    Grid(ParamGrid),
    Random(RandomSpace),
}

impl SearchSpace {
    /// Candidate points in enumeration order, validated for shape only;
    /// strategy-level validation happens per point in the optimizer.
    pub fn points(&self) -> Result<Vec<ParameterSet>, OptimizeError> {
        let points = match self {
            SearchSpace::Grid(grid) => grid.points(),
            SearchSpace::Random(space) => {
                space.validate()?;
                space.points()
            }
        };
        if points.is_empty() {
            return Err(OptimizeError::EmptySearchSpace);
        }
        Ok(points)
    }

    /// The two axes of a two-dimensional grid, if this is one.
    pub fn grid_2d(&self) -> Option<(&(String, Vec<ParamValue>), &(String, Vec<ParamValue>))> {
        match self {
            SearchSpace::Grid(grid) if grid.axes().len() == 2 => {
                Some((&grid.axes()[0], &grid.axes()[1]))
            }
            _ => None,
        }
    }
}
