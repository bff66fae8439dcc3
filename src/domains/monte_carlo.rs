//! Sampleable distributions for Monte Carlo batches.
//!
//! Every uncertain model input is a [`Param`]: either a fixed number or a
//! [`Distribution`] that draws `n` samples from a [`SimRng`]. Sampling all
//! inputs with the same `n` yields array-valued models whose outputs are
//! distributions over scenarios.
//!
//! # Convergence
//!
//! Batch means converge at O(n^{-1/2}); see
//! [`SampleSummary`](crate::engine::value::SampleSummary) for the standard
//! error and confidence interval of a batch output.

use rand_distr::{Distribution as _, LogNormal, Normal};
use serde::{Deserialize, Serialize};

use crate::engine::rng::SimRng;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// A distribution that can be sampled into a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    /// Gaussian with the given mean and standard deviation.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std_dev: f64,
    },
    /// Log-normal; `mu` and `sigma` describe the underlying normal.
    LogNormal {
        /// Mean of `ln X`.
        mu: f64,
        /// Standard deviation of `ln X`.
        sigma: f64,
    },
    /// Uniform on `[low, high)`.
    Uniform {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
    },
    /// Gaussian kernel density estimate of observed data.
    EmpiricalKernel {
        /// Observations.
        data: Vec<f64>,
        /// Kernel bandwidth; Scott's rule when absent.
        #[serde(default)]
        bandwidth: Option<f64>,
    },
    /// Piecewise-linear density given at increasing `values`.
    CustomInterpolated {
        /// Abscissae, strictly increasing.
        values: Vec<f64>,
        /// Unnormalized density at each abscissa.
        pdf: Vec<f64>,
    },
}

impl Distribution {
    /// Draw `n` samples.
    ///
    /// # Errors
    ///
    /// Returns `Distribution` if the parameters are invalid.
    pub fn sample(&self, n: usize, rng: &mut SimRng) -> SimResult<Value> {
        let samples: Vec<f64> = match self {
            Self::Normal { mean, std_dev } => {
                let normal = Normal::new(*mean, *std_dev)
                    .map_err(|e| SimError::distribution(format!("normal: {e}")))?;
                (0..n).map(|_| normal.sample(rng)).collect()
            }
            Self::LogNormal { mu, sigma } => {
                let lognormal = LogNormal::new(*mu, *sigma)
                    .map_err(|e| SimError::distribution(format!("log-normal: {e}")))?;
                (0..n).map(|_| lognormal.sample(rng)).collect()
            }
            Self::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return Err(SimError::distribution(format!(
                        "uniform: invalid range [{low}, {high})"
                    )));
                }
                (0..n).map(|_| rng.gen_range_f64(*low, *high)).collect()
            }
            Self::EmpiricalKernel { data, bandwidth } => {
                let bandwidth = match bandwidth {
                    Some(b) => *b,
                    None => scott_bandwidth(data)?,
                };
                if data.is_empty() {
                    return Err(SimError::distribution("kernel: no data"));
                }
                let kernel = Normal::new(0.0, bandwidth)
                    .map_err(|e| SimError::distribution(format!("kernel: {e}")))?;
                (0..n)
                    .map(|_| data[rng.gen_index(data.len())] + kernel.sample(rng))
                    .collect()
            }
            Self::CustomInterpolated { values, pdf } => {
                let cdf = cumulative(values, pdf)?;
                rng.sample_n(n)
                    .into_iter()
                    .map(|u| inverse_cdf(values, &cdf, u))
                    .collect()
            }
        };
        Ok(Value::array(samples))
    }

    /// Mean of the distribution.
    ///
    /// # Errors
    ///
    /// Returns `Distribution` if the parameters are invalid.
    pub fn mean(&self) -> SimResult<f64> {
        match self {
            Self::Normal { mean, .. } => Ok(*mean),
            Self::LogNormal { mu, sigma } => Ok((mu + sigma * sigma / 2.0).exp()),
            Self::Uniform { low, high } => Ok((low + high) / 2.0),
            Self::EmpiricalKernel { data, .. } => {
                if data.is_empty() {
                    return Err(SimError::distribution("kernel: no data"));
                }
                Ok(data.iter().sum::<f64>() / data.len() as f64)
            }
            Self::CustomInterpolated { values, pdf } => {
                let cdf = cumulative(values, pdf)?;
                let mut first_moment = 0.0;
                for i in 1..values.len() {
                    let (x0, x1) = (values[i - 1], values[i]);
                    let (p0, p1) = (pdf[i - 1], pdf[i]);
                    // exact integral of x·p(x) for linear p on [x0, x1]
                    first_moment += (x1 - x0) * (p0 * (2.0 * x0 + x1) + p1 * (x0 + 2.0 * x1)) / 6.0;
                }
                Ok(first_moment / cdf[cdf.len() - 1])
            }
        }
    }
}

/// Scott's rule bandwidth `σ·n^(-1/5)` (sample standard deviation).
fn scott_bandwidth(data: &[f64]) -> SimResult<f64> {
    if data.len() < 2 {
        return Err(SimError::distribution(
            "kernel: at least two observations are needed to estimate a bandwidth",
        ));
    }
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Ok(variance.sqrt() * n.powf(-0.2))
}

/// Unnormalized cumulative mass at each abscissa (trapezoid rule).
fn cumulative(values: &[f64], pdf: &[f64]) -> SimResult<Vec<f64>> {
    if values.len() != pdf.len() || values.len() < 2 {
        return Err(SimError::distribution(format!(
            "custom: {} values for {} densities (need at least two of each)",
            values.len(),
            pdf.len()
        )));
    }
    if values.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SimError::distribution("custom: values must be strictly increasing"));
    }
    if pdf.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(SimError::distribution("custom: densities must be finite and non-negative"));
    }
    let mut cdf = Vec::with_capacity(values.len());
    cdf.push(0.0);
    for i in 1..values.len() {
        let mass = (values[i] - values[i - 1]) * (pdf[i] + pdf[i - 1]) / 2.0;
        cdf.push(cdf[i - 1] + mass);
    }
    if cdf[cdf.len() - 1] <= 0.0 {
        return Err(SimError::distribution("custom: density has zero mass"));
    }
    Ok(cdf)
}

/// Invert the piecewise-linear density's CDF at `u ∈ [0, 1)`.
fn inverse_cdf(values: &[f64], cdf: &[f64], u: f64) -> f64 {
    let target = u * cdf[cdf.len() - 1];
    let i = cdf
        .partition_point(|&c| c <= target)
        .clamp(1, values.len() - 1);
    let (c0, c1) = (cdf[i - 1], cdf[i]);
    let (x0, x1) = (values[i - 1], values[i]);
    if c1 <= c0 {
        x0
    } else {
        (x0 + (target - c0) / (c1 - c0) * (x1 - x0)).clamp(x0, x1)
    }
}

/// A model input: fixed or sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// The same value in every scenario.
    Fixed(f64),
    /// Drawn independently per scenario.
    Sampled(Distribution),
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Self::Fixed(value)
    }
}

impl From<Distribution> for Param {
    fn from(distribution: Distribution) -> Self {
        Self::Sampled(distribution)
    }
}

impl Param {
    /// `n` realizations; a fixed value stays scalar and broadcasts.
    ///
    /// # Errors
    ///
    /// Returns `Distribution` if a sampled parameter is invalid.
    pub fn sample(&self, n: usize, rng: &mut SimRng) -> SimResult<Value> {
        match self {
            Self::Fixed(value) => Ok(Value::from(*value)),
            Self::Sampled(distribution) => distribution.sample(n, rng),
        }
    }

    /// True if the parameter is sampled.
    #[must_use]
    pub const fn is_sampled(&self) -> bool {
        matches!(self, Self::Sampled(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 20_000;

    fn mean_of(value: &Value) -> f64 {
        value.mean()
    }

    #[test]
    fn test_normal_moments() {
        let mut rng = SimRng::new(42);
        let samples = Distribution::Normal {
            mean: 2.0,
            std_dev: 0.5,
        }
        .sample(N, &mut rng)
        .unwrap();
        assert_eq!(samples.len(), Some(N));
        // 5 standard errors
        assert!((mean_of(&samples) - 2.0).abs() < 5.0 * 0.5 / (N as f64).sqrt());
    }

    #[test]
    fn test_lognormal_positive() {
        let mut rng = SimRng::new(7);
        let dist = Distribution::LogNormal { mu: 0.0, sigma: 0.5 };
        let samples = dist.sample(N, &mut rng).unwrap();
        assert!(samples.all(|x| x > 0.0));
        let expected = dist.mean().unwrap();
        assert!((mean_of(&samples) - expected).abs() / expected < 0.02);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = SimRng::new(1);
        let samples = Distribution::Uniform { low: 0.6, high: 0.9 }
            .sample(1000, &mut rng)
            .unwrap();
        assert!(samples.all(|x| (0.6..0.9).contains(&x)));
    }

    #[test]
    fn test_invalid_parameters() {
        let mut rng = SimRng::new(1);
        assert!(Distribution::Normal { mean: 0.0, std_dev: -1.0 }
            .sample(10, &mut rng)
            .is_err());
        assert!(Distribution::Uniform { low: 1.0, high: 1.0 }
            .sample(10, &mut rng)
            .is_err());
        assert!(Distribution::EmpiricalKernel { data: vec![], bandwidth: Some(1.0) }
            .sample(10, &mut rng)
            .is_err());
        assert!(Distribution::EmpiricalKernel { data: vec![1.0], bandwidth: None }
            .sample(10, &mut rng)
            .is_err());
        assert!(Distribution::CustomInterpolated { values: vec![0.0, 1.0], pdf: vec![0.0, 0.0] }
            .sample(10, &mut rng)
            .is_err());
        assert!(Distribution::CustomInterpolated { values: vec![1.0, 0.0], pdf: vec![1.0, 1.0] }
            .sample(10, &mut rng)
            .is_err());
    }

    #[test]
    fn test_scott_bandwidth() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        let std = 2.5_f64.sqrt();
        let expected = std * 5.0_f64.powf(-0.2);
        assert!((scott_bandwidth(&data).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_kernel_centered_on_data() {
        let mut rng = SimRng::new(3);
        let dist = Distribution::EmpiricalKernel {
            data: vec![10.0, 10.5, 11.0, 11.5, 12.0],
            bandwidth: None,
        };
        let samples = dist.sample(N, &mut rng).unwrap();
        assert!((mean_of(&samples) - 11.0).abs() < 0.05);
    }

    #[test]
    fn test_custom_uniform_density() {
        let mut rng = SimRng::new(5);
        let dist = Distribution::CustomInterpolated {
            values: vec![2.0, 3.0, 4.0],
            pdf: vec![1.0, 1.0, 1.0],
        };
        let samples = dist.sample(N, &mut rng).unwrap();
        assert!(samples.all(|x| (2.0..=4.0).contains(&x)));
        assert!((mean_of(&samples) - 3.0).abs() < 0.03);
        assert!((dist.mean().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_custom_triangle_mean() {
        // p(x) = x on [0, 1] has mean 2/3
        let dist = Distribution::CustomInterpolated {
            values: vec![0.0, 1.0],
            pdf: vec![0.0, 2.0],
        };
        assert!((dist.mean().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_param_is_scalar() {
        let mut rng = SimRng::new(0);
        let value = Param::from(0.51).sample(100, &mut rng).unwrap();
        assert_eq!(value, Value::from(0.51));
        assert!(!Param::Fixed(1.0).is_sampled());
    }

    #[test]
    fn test_reproducible() {
        let dist = Distribution::Normal { mean: 0.0, std_dev: 1.0 };
        let a = dist.sample(64, &mut SimRng::new(9)).unwrap();
        let b = dist.sample(64, &mut SimRng::new(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_param_yaml() {
        let fixed: Param = serde_yaml::from_str("0.5").unwrap();
        assert_eq!(fixed, Param::Fixed(0.5));
        let sampled: Param =
            serde_yaml::from_str("kind: uniform\nlow: 0.1\nhigh: 0.2\n").unwrap();
        assert_eq!(
            sampled,
            Param::Sampled(Distribution::Uniform { low: 0.1, high: 0.2 })
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: inverse-CDF samples never leave the support.
        #[test]
        fn prop_custom_within_support(
            a in 0.0f64..10.0,
            width in 0.1f64..10.0,
            p0 in 0.0f64..5.0,
            p1 in 0.1f64..5.0,
            seed in 0u64..1000,
        ) {
            let dist = Distribution::CustomInterpolated {
                values: vec![a, a + width / 2.0, a + width],
                pdf: vec![p0, p1, p0],
            };
            let samples = dist.sample(200, &mut SimRng::new(seed)).unwrap();
            prop_assert!(samples.all(|x| x >= a && x <= a + width));
        }

        /// Falsification: batch size is honored.
        #[test]
        fn prop_sample_count(n in 1usize..500, seed in 0u64..1000) {
            let samples = Distribution::Uniform { low: 0.0, high: 1.0 }
                .sample(n, &mut SimRng::new(seed))
                .unwrap();
            prop_assert_eq!(samples.len(), Some(n));
        }
    }
}
