//! Scalar-or-array numeric values.
//!
//! Every model parameter is a [`Value`]: either a single number or a batch of
//! Monte Carlo samples. Arithmetic broadcasts scalars against arrays, so the
//! closed-form integrator is written once and evaluated for one scenario or
//! for a whole batch of sampled scenarios.
//!
//! # Broadcasting
//!
//! - scalar ⊕ scalar → scalar
//! - scalar ⊕ array(n) → array(n)
//! - array(n) ⊕ array(n) → array(n)
//!
//! Combining arrays of different lengths is a programming error: all samples
//! of one batch are drawn with the same size.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub};
use std::sync::Arc;

/// A scalar or a batch of samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Single deterministic value.
    Scalar(f64),
    /// One value per sampled scenario.
    Array(Arc<[f64]>),
}

impl Default for Value {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Self::Array(Arc::from(values))
    }
}

impl Value {
    /// Scalar zero.
    pub const ZERO: Self = Self::Scalar(0.0);

    /// Scalar one.
    pub const ONE: Self = Self::Scalar(1.0);

    /// Create an array value.
    #[must_use]
    pub fn array(values: impl Into<Vec<f64>>) -> Self {
        Self::Array(Arc::from(values.into()))
    }

    /// Number of samples, or `None` for a scalar.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Array(values) => Some(values.len()),
        }
    }

    /// True for an array holding no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// True for a scalar.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// The scalar value, if this is a scalar.
    #[must_use]
    pub const fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(x) => Some(*x),
            Self::Array(_) => None,
        }
    }

    /// Sample `index`, broadcasting scalars.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds for an array.
    #[must_use]
    pub fn get(&self, index: usize) -> f64 {
        match self {
            Self::Scalar(x) => *x,
            Self::Array(values) => values[index],
        }
    }

    /// The samples as a slice (a scalar is a one-element slice).
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Scalar(x) => std::slice::from_ref(x),
            Self::Array(values) => &values[..],
        }
    }

    /// Common broadcast length of `values`, `None` if all are scalars.
    ///
    /// # Panics
    ///
    /// Panics if two arrays have different lengths.
    #[must_use]
    pub fn broadcast_len(values: &[&Self]) -> Option<usize> {
        let mut len = None;
        for value in values {
            if let Some(n) = value.len() {
                if let Some(m) = len {
                    assert_eq!(m, n, "cannot broadcast arrays of different sample sizes");
                }
                len = Some(n);
            }
        }
        len
    }

    /// Apply `f` to each sample.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Self::Scalar(x) => Self::Scalar(f(*x)),
            Self::Array(values) => Self::Array(values.iter().map(|&x| f(x)).collect()),
        }
    }

    /// Combine two values elementwise with broadcasting.
    ///
    /// # Panics
    ///
    /// Panics if both are arrays of different lengths.
    #[must_use]
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(f(*a, *b)),
            (Self::Scalar(a), Self::Array(b)) => Self::Array(b.iter().map(|&y| f(*a, y)).collect()),
            (Self::Array(a), Self::Scalar(b)) => Self::Array(a.iter().map(|&x| f(x, *b)).collect()),
            (Self::Array(a), Self::Array(b)) => {
                assert_eq!(a.len(), b.len(), "cannot broadcast arrays of different sample sizes");
                Self::Array(a.iter().zip(b.iter()).map(|(&x, &y)| f(x, y)).collect())
            }
        }
    }

    /// Combine any number of values elementwise with broadcasting.
    ///
    /// `f` receives one sample of every input, in order.
    ///
    /// # Panics
    ///
    /// Panics if two inputs are arrays of different lengths.
    #[must_use]
    pub fn zip_all(values: &[&Self], f: impl Fn(&[f64]) -> f64) -> Self {
        let mut row = vec![0.0; values.len()];
        match Self::broadcast_len(values) {
            None => {
                for (slot, value) in row.iter_mut().zip(values) {
                    *slot = value.get(0);
                }
                Self::Scalar(f(&row))
            }
            Some(n) => {
                let mut out = Vec::with_capacity(n);
                for i in 0..n {
                    for (slot, value) in row.iter_mut().zip(values) {
                        *slot = value.get(i);
                    }
                    out.push(f(&row));
                }
                Self::from(out)
            }
        }
    }

    /// Elementwise exponential.
    #[must_use]
    pub fn exp(&self) -> Self {
        self.map(f64::exp)
    }

    /// Elementwise natural logarithm.
    #[must_use]
    pub fn ln(&self) -> Self {
        self.map(f64::ln)
    }

    /// Elementwise square root.
    #[must_use]
    pub fn sqrt(&self) -> Self {
        self.map(f64::sqrt)
    }

    /// Elementwise floating power.
    #[must_use]
    pub fn powf(&self, exponent: f64) -> Self {
        self.map(|x| x.powf(exponent))
    }

    /// Elementwise integer power.
    #[must_use]
    pub fn powi(&self, exponent: i32) -> Self {
        self.map(|x| x.powi(exponent))
    }

    /// Elementwise maximum.
    #[must_use]
    pub fn max(&self, other: &Self) -> Self {
        self.zip_with(other, f64::max)
    }

    /// Elementwise minimum.
    #[must_use]
    pub fn min(&self, other: &Self) -> Self {
        self.zip_with(other, f64::min)
    }

    /// True if `pred` holds for every sample.
    pub fn all(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.as_slice().iter().all(|&x| pred(x))
    }

    /// True if `pred` holds for at least one sample.
    pub fn any(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.as_slice().iter().any(|&x| pred(x))
    }

    /// True if every sample is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.all(f64::is_finite)
    }

    /// Sum over samples.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.as_slice().iter().sum()
    }

    /// Mean over samples (the value itself for a scalar).
    #[must_use]
    pub fn mean(&self) -> f64 {
        match self {
            Self::Scalar(x) => *x,
            Self::Array(values) => values.iter().sum::<f64>() / values.len() as f64,
        }
    }

    /// Mean over samples, as a scalar value.
    #[must_use]
    pub fn mean_value(&self) -> Self {
        Self::Scalar(self.mean())
    }

    /// Empirical percentile `q` in [0, 100] with linear interpolation.
    #[must_use]
    pub fn percentile(&self, q: f64) -> f64 {
        let mut sorted = self.as_slice().to_vec();
        sorted.sort_by(f64::total_cmp);
        if sorted.len() == 1 {
            return sorted[0];
        }
        let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }

    /// Summary statistics over samples.
    #[must_use]
    pub fn summary(&self) -> SampleSummary {
        let samples = self.as_slice();
        let n = samples.len() as f64;
        let mean = self.mean();
        let std_error = if samples.len() > 1 {
            let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            (variance / n).sqrt()
        } else {
            0.0
        };
        SampleSummary::new(mean, std_error, samples.len())
    }
}

/// Summary of a batch of sampled outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSummary {
    /// Point estimate (sample mean).
    pub estimate: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
    /// Number of samples.
    pub samples: usize,
    /// 95% confidence interval (estimate ± 1.96 * `std_error`).
    pub confidence_interval: (f64, f64),
}

impl SampleSummary {
    /// Create a new summary.
    #[must_use]
    pub fn new(estimate: f64, std_error: f64, samples: usize) -> Self {
        let ci_half = 1.96 * std_error;
        Self {
            estimate,
            std_error,
            samples,
            confidence_interval: (estimate - ci_half, estimate + ci_half),
        }
    }

    /// Check if value is within confidence interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.confidence_interval.0 && value <= self.confidence_interval.1
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<&Value> for &Value {
            type Output = Value;

            fn $method(self, rhs: &Value) -> Value {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }

        impl $trait<Value> for Value {
            type Output = Value;

            fn $method(self, rhs: Value) -> Value {
                self.zip_with(&rhs, |a, b| a $op b)
            }
        }

        impl $trait<&Value> for Value {
            type Output = Value;

            fn $method(self, rhs: &Value) -> Value {
                self.zip_with(rhs, |a, b| a $op b)
            }
        }

        impl $trait<Value> for &Value {
            type Output = Value;

            fn $method(self, rhs: Value) -> Value {
                self.zip_with(&rhs, |a, b| a $op b)
            }
        }

        impl $trait<f64> for Value {
            type Output = Value;

            fn $method(self, rhs: f64) -> Value {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<f64> for &Value {
            type Output = Value;

            fn $method(self, rhs: f64) -> Value {
                self.map(|a| a $op rhs)
            }
        }

        impl $trait<Value> for f64 {
            type Output = Value;

            fn $method(self, rhs: Value) -> Value {
                rhs.map(|b| self $op b)
            }
        }

        impl $trait<&Value> for f64 {
            type Output = Value;

            fn $method(self, rhs: &Value) -> Value {
                rhs.map(|b| self $op b)
            }
        }
    };
}

impl_binary_op!(Add, add, +);
impl_binary_op!(Sub, sub, -);
impl_binary_op!(Mul, mul, *);
impl_binary_op!(Div, div, /);

impl Neg for Value {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|x| -x)
    }
}

impl Neg for &Value {
    type Output = Value;

    fn neg(self) -> Value {
        self.map(|x| -x)
    }
}

impl AddAssign<&Value> for Value {
    fn add_assign(&mut self, rhs: &Value) {
        *self = self.zip_with(rhs, |a, b| a + b);
    }
}

impl AddAssign<Value> for Value {
    fn add_assign(&mut self, rhs: Value) {
        *self += &rhs;
    }
}

impl MulAssign<&Value> for Value {
    fn mul_assign(&mut self, rhs: &Value) {
        *self = self.zip_with(rhs, |a, b| a * b);
    }
}

impl MulAssign<Value> for Value {
    fn mul_assign(&mut self, rhs: Value) {
        *self *= &rhs;
    }
}

impl std::iter::Sum for Value {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

impl std::iter::Product for Value {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ONE, |acc, x| acc * x)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Falsification: broadcasting a scalar matches mapping it.
        #[test]
        fn prop_broadcast_matches_map(
            x in -1e6f64..1e6,
            ys in proptest::collection::vec(-1e6f64..1e6, 1..32),
        ) {
            let scalar = Value::from(x);
            let array = Value::array(ys.clone());
            let sum = &scalar + &array;
            for (i, y) in ys.iter().enumerate() {
                prop_assert!((sum.get(i) - (x + y)).abs() < 1e-9 * (x + y).abs().max(1.0));
            }
        }

        /// Falsification: the mean of an array lies within its range.
        #[test]
        fn prop_mean_bounded(ys in proptest::collection::vec(-1e6f64..1e6, 1..64)) {
            let v = Value::array(ys.clone());
            let lo = ys.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(v.mean() >= lo - 1e-6 && v.mean() <= hi + 1e-6);
        }
    }
}
