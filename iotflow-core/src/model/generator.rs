//! Single-value stochastic samplers
//!
//! Three strategies behind one closed variant set:
//! - **BoundedNoise**: uniform perturbation around a mean, clamped. This is
//!   deliberately not a Gaussian; historical experiments depend on its shape.
//! - **EmpiricalDiscrete**: weighted draw from an explicit value list.
//! - **TruncatedNormal**: true Gaussian draw, clamped.
//!
//! Generators are immutable after construction and shared read-only across
//! traffic classes; entropy comes from the caller's RNG.

use rand::distr::weighted::WeightedIndex;
use rand::rngs::SmallRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One `(value, weight)` point of an empirical discrete distribution.
///
/// Historical configuration files misspell the weight key as `prabability`;
/// both that and the corrected `probability` are accepted on load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedValue {
    pub value: f64,
    #[serde(alias = "probability", alias = "prabability")]
    pub weight: f64,
}

/// Serializable parameter mirror of a generator. Loading a spec and dumping
/// it back is the identity, which is what makes profiles reloadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneratorSpec {
    #[serde(rename = "rv")]
    BoundedNoise {
        min: f64,
        max: f64,
        mean: f64,
        #[serde(rename = "std-dev")]
        std_dev: f64,
    },
    #[serde(rename = "normal")]
    TruncatedNormal {
        min: f64,
        max: f64,
        mean: f64,
        #[serde(rename = "std-dev")]
        std_dev: f64,
    },
    #[serde(rename = "dist")]
    Empirical { values: Vec<WeightedValue> },
}

/// A single-value sampler. `sample` never fails and has no side effect
/// beyond consuming entropy from the caller's RNG.
#[derive(Debug, Clone)]
pub enum RandomGenerator {
    BoundedNoise {
        min: f64,
        max: f64,
        mean: f64,
        std_dev: f64,
    },
    EmpiricalDiscrete {
        values: Vec<f64>,
        weights: Vec<f64>,
        index: WeightedIndex<f64>,
    },
    TruncatedNormal {
        min: f64,
        max: f64,
        mean: f64,
        std_dev: f64,
        dist: Normal<f64>,
    },
}

fn check_range(min: f64, max: f64, mean: f64, std_dev: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite() && mean.is_finite() && std_dev.is_finite()) {
        return Err(Error::Config("generator parameters must be finite".to_string()));
    }
    if min > max {
        return Err(Error::Config(format!("generator min {min} exceeds max {max}")));
    }
    if std_dev < 0.0 {
        return Err(Error::Config(format!("generator std-dev {std_dev} is negative")));
    }
    Ok(())
}

impl RandomGenerator {
    /// Bounded noise: `mean + U(-1,1) * std_dev`, clamped to `[min, max]`.
    pub fn bounded_noise(min: f64, max: f64, mean: f64, std_dev: f64) -> Result<Self> {
        check_range(min, max, mean, std_dev)?;
        Ok(RandomGenerator::BoundedNoise { min, max, mean, std_dev })
    }

    /// Empirical discrete distribution over `(value, weight)` pairs. Weights
    /// need not be normalized; an empty list, a negative weight, or all-zero
    /// weights are configuration errors.
    pub fn empirical(pairs: &[(f64, f64)]) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::Config("empirical distribution is empty".to_string()));
        }
        if let Some((value, weight)) = pairs.iter().find(|(_, w)| *w < 0.0 || !w.is_finite()) {
            return Err(Error::Config(format!(
                "invalid weight {weight} for value {value} in empirical distribution"
            )));
        }
        let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
        let weights: Vec<f64> = pairs.iter().map(|(_, w)| *w).collect();
        let index = WeightedIndex::new(weights.iter().copied()).map_err(|e| {
            Error::Config(format!("unusable empirical distribution: {e}"))
        })?;
        Ok(RandomGenerator::EmpiricalDiscrete { values, weights, index })
    }

    /// Truncated normal: Gaussian draw clamped to `[min, max]`.
    pub fn truncated_normal(min: f64, max: f64, mean: f64, std_dev: f64) -> Result<Self> {
        check_range(min, max, mean, std_dev)?;
        let dist = Normal::new(mean, std_dev)
            .map_err(|e| Error::Config(format!("invalid normal parameters: {e}")))?;
        Ok(RandomGenerator::TruncatedNormal { min, max, mean, std_dev, dist })
    }

    pub fn from_spec(spec: &GeneratorSpec) -> Result<Self> {
        match spec {
            GeneratorSpec::BoundedNoise { min, max, mean, std_dev } => {
                Self::bounded_noise(*min, *max, *mean, *std_dev)
            }
            GeneratorSpec::TruncatedNormal { min, max, mean, std_dev } => {
                Self::truncated_normal(*min, *max, *mean, *std_dev)
            }
            GeneratorSpec::Empirical { values } => {
                let pairs: Vec<(f64, f64)> =
                    values.iter().map(|wv| (wv.value, wv.weight)).collect();
                Self::empirical(&pairs)
            }
        }
    }

    /// The serializable parameters this generator was built from.
    pub fn spec(&self) -> GeneratorSpec {
        match self {
            RandomGenerator::BoundedNoise { min, max, mean, std_dev } => {
                GeneratorSpec::BoundedNoise {
                    min: *min,
                    max: *max,
                    mean: *mean,
                    std_dev: *std_dev,
                }
            }
            RandomGenerator::EmpiricalDiscrete { values, weights, .. } => {
                GeneratorSpec::Empirical {
                    values: values
                        .iter()
                        .zip(weights)
                        .map(|(v, w)| WeightedValue { value: *v, weight: *w })
                        .collect(),
                }
            }
            RandomGenerator::TruncatedNormal { min, max, mean, std_dev, .. } => {
                GeneratorSpec::TruncatedNormal {
                    min: *min,
                    max: *max,
                    mean: *mean,
                    std_dev: *std_dev,
                }
            }
        }
    }

    /// Draw one value.
    pub fn sample(&self, rng: &mut SmallRng) -> f64 {
        match self {
            RandomGenerator::BoundedNoise { min, max, mean, std_dev } => {
                if *std_dev == 0.0 {
                    return mean.clamp(*min, *max);
                }
                let noise: f64 = rng.random_range(-1.0..=1.0);
                (mean + noise * std_dev).clamp(*min, *max)
            }
            RandomGenerator::EmpiricalDiscrete { values, index, .. } => {
                values[index.sample(rng)]
            }
            RandomGenerator::TruncatedNormal { min, max, mean, std_dev, dist } => {
                if *std_dev == 0.0 {
                    return mean.clamp(*min, *max);
                }
                dist.sample(rng).clamp(*min, *max)
            }
        }
    }
}
