//! Derivative-free optimization with Powell's conjugate direction method.
//!
//! Each iteration performs a bounded line search along every direction of
//! the current set, then replaces the direction of largest decrease by the
//! overall displacement when that is expected to help (Numerical Recipes
//! test). Line searches bracket the minimum by golden-ratio expansion and
//! refine it by golden-section search; they never return a point worse
//! than where they started.
//!
//! # Example
//!
//! ```rust
//! use airsim::domains::optimization::{OptimizerConfig, PowellOptimizer};
//!
//! let optimizer = PowellOptimizer::new(OptimizerConfig {
//!     bounds: vec![(0.0, f64::INFINITY), (0.0, f64::INFINITY)],
//!     ..Default::default()
//! });
//! let result = optimizer
//!     .minimize(|x| (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2), &[5.0, 5.0])
//!     .unwrap();
//! assert!((result.x[0] - 1.0).abs() < 1e-3);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// Growth factor of the bracketing expansion.
const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;
/// Reduction factor of the golden-section search.
const INV_GOLDEN_RATIO: f64 = 0.618_033_988_749_895;
/// Maximum number of bracket expansions per line search.
const MAX_EXPANSIONS: usize = 60;
/// Maximum number of golden-section reductions per line search.
const MAX_SECTIONS: usize = 200;

/// Configuration for the Powell optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// `(min, max)` per dimension; empty for an unbounded problem.
    #[serde(default)]
    pub bounds: Vec<(f64, f64)>,
    /// Tolerance on line-search step lengths.
    pub xtol: f64,
    /// Relative tolerance on the objective between iterations.
    pub ftol: f64,
    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            bounds: Vec::new(),
            xtol: 1e-4,
            ftol: 1e-10,
            max_iterations: 200,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective at `x`.
    pub fun: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the objective tolerance was met.
    pub converged: bool,
}

/// Powell's method over a box.
#[derive(Debug, Clone, PartialEq)]
pub struct PowellOptimizer {
    config: OptimizerConfig,
}

impl PowellOptimizer {
    /// Create a new optimizer.
    #[must_use]
    pub const fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn bound(&self, i: usize) -> (f64, f64) {
        self.config
            .bounds
            .get(i)
            .copied()
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
    }

    fn clip(&self, x: &mut [f64]) {
        for (i, xi) in x.iter_mut().enumerate() {
            let (lo, hi) = self.bound(i);
            *xi = xi.clamp(lo, hi);
        }
    }

    /// Range of `alpha` keeping `x + alpha·d` inside the bounds.
    fn feasible_steps(&self, x: &[f64], d: &[f64]) -> (f64, f64) {
        let mut lo = f64::NEG_INFINITY;
        let mut hi = f64::INFINITY;
        for (i, (&xi, &di)) in x.iter().zip(d).enumerate() {
            let (lb, ub) = self.bound(i);
            if di > 0.0 {
                lo = lo.max((lb - xi) / di);
                hi = hi.min((ub - xi) / di);
            } else if di < 0.0 {
                lo = lo.max((ub - xi) / di);
                hi = hi.min((lb - xi) / di);
            }
        }
        (lo.min(0.0), hi.max(0.0))
    }

    fn point(&self, x: &[f64], d: &[f64], alpha: f64) -> Vec<f64> {
        let mut p: Vec<f64> = x.iter().zip(d).map(|(xi, di)| xi + alpha * di).collect();
        self.clip(&mut p);
        p
    }

    /// Minimize along `d` from `x`; returns the new point and objective.
    fn line_search<F>(&self, f: &F, x: &[f64], d: &[f64], fx: f64) -> (Vec<f64>, f64)
    where
        F: Fn(&[f64]) -> f64,
    {
        let (lo, hi) = self.feasible_steps(x, d);
        if d.iter().all(|&di| di == 0.0) || hi - lo <= 0.0 {
            return (x.to_vec(), fx);
        }
        let phi = |alpha: f64| sanitize(f(&self.point(x, d, alpha)));

        let (a, c) = bracket(&phi, lo, hi, fx);
        let (alpha, f_alpha) = golden_section(&phi, a, c, self.config.xtol);
        if f_alpha < fx {
            (self.point(x, d, alpha), f_alpha)
        } else {
            (x.to_vec(), fx)
        }
    }

    /// Minimize `f` starting from `x0`.
    ///
    /// Non-finite objective values are treated as `+∞`.
    ///
    /// # Errors
    ///
    /// Returns `Optimization` if `x0` is empty, if the bounds do not match
    /// its dimension, or if the objective is not finite at `x0`.
    pub fn minimize<F>(&self, f: F, x0: &[f64]) -> SimResult<OptimizationResult>
    where
        F: Fn(&[f64]) -> f64,
    {
        let n = x0.len();
        if n == 0 {
            return Err(SimError::optimization("cannot minimize over zero dimensions"));
        }
        if !self.config.bounds.is_empty() && self.config.bounds.len() != n {
            return Err(SimError::optimization(format!(
                "{} bounds given for {n} dimensions",
                self.config.bounds.len()
            )));
        }

        let mut x = x0.to_vec();
        self.clip(&mut x);
        let mut fx = sanitize(f(&x));
        if !fx.is_finite() {
            return Err(SimError::optimization("objective is not finite at the starting point"));
        }

        let mut directions: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();

        for iteration in 1..=self.config.max_iterations {
            let x_start = x.clone();
            let f_start = fx;
            let mut biggest_drop = 0.0;
            let mut biggest_index = 0;

            for (i, direction) in directions.iter().enumerate() {
                let before = fx;
                (x, fx) = self.line_search(&f, &x, direction, fx);
                if before - fx > biggest_drop {
                    biggest_drop = before - fx;
                    biggest_index = i;
                }
            }
            debug!(iteration, fun = fx, "powell iteration");

            if 2.0 * (f_start - fx) <= self.config.ftol * (f_start.abs() + fx.abs()) + 1e-20 {
                return Ok(OptimizationResult {
                    x,
                    fun: fx,
                    iterations: iteration,
                    converged: true,
                });
            }

            let displacement: Vec<f64> = x.iter().zip(&x_start).map(|(a, b)| a - b).collect();
            let mut extrapolated: Vec<f64> = x.iter().zip(&displacement).map(|(a, d)| a + d).collect();
            self.clip(&mut extrapolated);
            let f_extrapolated = sanitize(f(&extrapolated));
            if f_extrapolated < f_start {
                let t = 2.0 * (f_start - 2.0 * fx + f_extrapolated)
                    * (f_start - fx - biggest_drop).powi(2)
                    - biggest_drop * (f_start - f_extrapolated).powi(2);
                if t < 0.0 {
                    (x, fx) = self.line_search(&f, &x, &displacement, fx);
                    directions.remove(biggest_index);
                    directions.push(displacement);
                }
            }
        }

        Ok(OptimizationResult {
            x,
            fun: fx,
            iterations: self.config.max_iterations,
            converged: false,
        })
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_nan() {
        f64::INFINITY
    } else {
        value
    }
}

/// Interval of step lengths within `[lo, hi]` containing a local minimum of
/// `phi` no worse than `phi(0) = f0`.
fn bracket(phi: &impl Fn(f64) -> f64, lo: f64, hi: f64, f0: f64) -> (f64, f64) {
    let forward = hi.min(1.0);
    let backward = lo.max(-1.0);
    if forward > 0.0 {
        let f_forward = phi(forward);
        if f_forward < f0 {
            return expand(phi, 0.0, forward, f_forward, hi);
        }
    }
    if backward < 0.0 {
        let f_backward = phi(backward);
        if f_backward < f0 {
            let (a, c) = expand(&|alpha: f64| phi(-alpha), 0.0, -backward, f_backward, -lo);
            return (-c, -a);
        }
    }
    (backward, forward)
}

/// Grow `[a, b]` by the golden ratio until the objective increases or the
/// limit is reached.
fn expand(phi: &impl Fn(f64) -> f64, mut a: f64, mut b: f64, mut fb: f64, limit: f64) -> (f64, f64) {
    for _ in 0..MAX_EXPANSIONS {
        if b >= limit {
            return (a, limit);
        }
        let c = (b + GOLDEN_RATIO * (b - a)).min(limit);
        let fc = phi(c);
        if fc >= fb {
            return (a, c);
        }
        a = b;
        b = c;
        fb = fc;
    }
    (a, b)
}

/// Golden-section search of `phi` on `[a, c]`.
fn golden_section(phi: &impl Fn(f64) -> f64, mut a: f64, mut c: f64, xtol: f64) -> (f64, f64) {
    let mut x1 = c - INV_GOLDEN_RATIO * (c - a);
    let mut x2 = a + INV_GOLDEN_RATIO * (c - a);
    let mut f1 = phi(x1);
    let mut f2 = phi(x2);
    for _ in 0..MAX_SECTIONS {
        if (c - a).abs() <= xtol * (1.0 + x1.abs().max(x2.abs())) {
            break;
        }
        if f1 < f2 {
            c = x2;
            x2 = x1;
            f2 = f1;
            x1 = c - INV_GOLDEN_RATIO * (c - a);
            f1 = phi(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = a + INV_GOLDEN_RATIO * (c - a);
            f2 = phi(x2);
        }
    }
    if f1 < f2 {
        (x1, f1)
    } else {
        (x2, f2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rosenbrock(x: &[f64]) -> f64 {
        (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2)
    }

    #[test]
    fn test_quadratic() {
        let optimizer = PowellOptimizer::new(OptimizerConfig::default());
        let result = optimizer
            .minimize(|x| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2), &[0.0, 0.0])
            .unwrap();
        assert!(result.converged);
        assert!((result.x[0] - 3.0).abs() < 1e-3, "{:?}", result.x);
        assert!((result.x[1] + 1.0).abs() < 1e-3, "{:?}", result.x);
    }

    #[test]
    fn test_rosenbrock() {
        let optimizer = PowellOptimizer::new(OptimizerConfig {
            xtol: 1e-8,
            ftol: 1e-14,
            max_iterations: 1000,
            ..Default::default()
        });
        let result = optimizer.minimize(rosenbrock, &[-1.2, 1.0]).unwrap();
        assert!(result.fun < 1e-6, "fun = {}", result.fun);
    }

    #[test]
    fn test_respects_lower_bound() {
        let optimizer = PowellOptimizer::new(OptimizerConfig {
            bounds: vec![(0.0, f64::INFINITY)],
            ..Default::default()
        });
        let result = optimizer.minimize(|x| (x[0] + 2.0).powi(2), &[1.0]).unwrap();
        assert!(result.x[0].abs() < 1e-12);
        assert!((result.fun - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_infinite_region_avoided() {
        let optimizer = PowellOptimizer::new(OptimizerConfig::default());
        let result = optimizer
            .minimize(
                |x| if x[0] < 0.5 { f64::NAN } else { (x[0] - 2.0).powi(2) },
                &[1.0],
            )
            .unwrap();
        assert!((result.x[0] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_errors() {
        let optimizer = PowellOptimizer::new(OptimizerConfig {
            bounds: vec![(0.0, 1.0)],
            ..Default::default()
        });
        assert!(optimizer.minimize(|_| 0.0, &[]).is_err());
        assert!(optimizer.minimize(|_| 0.0, &[0.5, 0.5]).is_err());
        assert!(optimizer.minimize(|_| f64::INFINITY, &[0.5]).is_err());
    }

    #[test]
    fn test_starting_point_clipped() {
        let optimizer = PowellOptimizer::new(OptimizerConfig {
            bounds: vec![(0.0, 1.0)],
            ..Default::default()
        });
        let result = optimizer.minimize(|x| (x[0] - 0.25).powi(2), &[7.0]).unwrap();
        assert!((result.x[0] - 0.25).abs() < 1e-3);
    }
}
