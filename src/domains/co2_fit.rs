//! Ventilation inference from measured CO2 traces.
//!
//! A room's CO2 trace is driven by known occupancy and unknown ventilation.
//! Fitting the exhalation rate and one air exchange rate per ventilation
//! segment to the trace recovers the ventilation that produced it.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::ModelDefaults;
use crate::domains::aerosol::Mask;
use crate::domains::concentration::Co2ConcentrationModel;
use crate::domains::optimization::{OptimizerConfig, PowellOptimizer};
use crate::domains::population::{Activity, Occupancy, Population};
use crate::domains::room::Room;
use crate::domains::ventilation::{CustomVentilation, Ventilation};
use crate::engine::integrator::ConcentrationModelBase;
use crate::engine::piecewise::{IntPiecewiseConstant, PiecewiseConstant};
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Inhalation rate assumed for the occupants of a fitted room (m³/h).
const FIT_INHALATION_RATE: f64 = 0.51;

/// A measured CO2 trace together with what is known about the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2DataModel {
    room: Room,
    occupancy: IntPiecewiseConstant,
    ventilation_transition_times: Vec<f64>,
    times: Vec<f64>,
    co2_concentrations: Vec<f64>,
}

/// Fitted parameters and the trace they predict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Co2FitResult {
    /// Fitted exhalation rate (m³/h).
    pub exhalation_rate: f64,
    /// Fitted air exchange rate (h⁻¹) per ventilation segment.
    pub ventilation_values: Vec<f64>,
    /// Ventilation per person (L/s) per segment, when the room capacity is
    /// known.
    pub ventilation_per_person: Option<Vec<f64>>,
    /// CO2 (ppm) predicted at each measurement time.
    pub predictive_co2: Vec<f64>,
    /// Root of the residual sum of squares (ppm).
    pub residual: f64,
    /// Optimizer iterations.
    pub iterations: usize,
}

impl Co2DataModel {
    /// Create a data model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `times` and `co2_concentrations` differ
    /// in length, hold fewer than two samples, or if fewer than two
    /// ventilation transition times are given.
    pub fn new(
        room: Room,
        occupancy: IntPiecewiseConstant,
        ventilation_transition_times: Vec<f64>,
        times: Vec<f64>,
        co2_concentrations: Vec<f64>,
    ) -> SimResult<Self> {
        if times.len() != co2_concentrations.len() {
            return Err(SimError::invalid_argument(format!(
                "{} measurement times for {} CO2 samples",
                times.len(),
                co2_concentrations.len()
            )));
        }
        if times.len() < 2 {
            return Err(SimError::invalid_argument(
                "at least two CO2 samples are required",
            ));
        }
        if ventilation_transition_times.len() < 2 {
            return Err(SimError::invalid_argument(
                "at least two ventilation transition times are required",
            ));
        }
        Ok(Self {
            room,
            occupancy,
            ventilation_transition_times,
            times,
            co2_concentrations,
        })
    }

    /// The room.
    #[must_use]
    pub const fn room(&self) -> &Room {
        &self.room
    }

    /// Measurement times (h).
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Measured CO2 (ppm).
    #[must_use]
    pub fn co2_concentrations(&self) -> &[f64] {
        &self.co2_concentrations
    }

    /// Number of fitted ventilation segments.
    #[must_use]
    pub fn segments(&self) -> usize {
        self.ventilation_transition_times.len() - 1
    }

    /// CO2 model for a given exhalation rate and per-segment air exchange.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `ventilation_values` does not have one
    /// entry per ventilation segment.
    pub fn co2_model(
        &self,
        exhalation_rate: f64,
        ventilation_values: &[f64],
    ) -> SimResult<Co2ConcentrationModel> {
        let ventilation = PiecewiseConstant::new(
            self.ventilation_transition_times.clone(),
            ventilation_values.iter().copied().map(Value::from).collect(),
        )?;
        Ok(Co2ConcentrationModel::new(
            self.room.clone(),
            Ventilation::Custom(CustomVentilation::new(ventilation)),
            Population::new(
                Occupancy::Dynamic(self.occupancy.clone()),
                Activity::new(FIT_INHALATION_RATE, exhalation_rate),
                Mask::no_mask(),
            ),
        ))
    }

    /// CO2 predicted at every measurement time.
    ///
    /// # Errors
    ///
    /// See [`Self::co2_model`]; integration errors are propagated.
    pub fn concentrations_from_params(
        &self,
        exhalation_rate: f64,
        ventilation_values: &[f64],
    ) -> SimResult<Vec<f64>> {
        let model = self.co2_model(exhalation_rate, ventilation_values)?;
        self.times
            .iter()
            .map(|&t| model.concentration(t).map(|c| c.mean()))
            .collect()
    }

    /// Root of the residual sum of squares of a parameter vector
    /// `[exhalation_rate, ventilation...]`; `+∞` where the model fails.
    fn objective(&self, params: &[f64]) -> f64 {
        let Some((&exhalation_rate, ventilation)) = params.split_first() else {
            return f64::INFINITY;
        };
        match self.concentrations_from_params(exhalation_rate, ventilation) {
            Ok(predicted) => {
                let rss: f64 = predicted
                    .iter()
                    .zip(&self.co2_concentrations)
                    .map(|(p, m)| (p - m).powi(2))
                    .sum();
                if rss.is_finite() {
                    rss.sqrt()
                } else {
                    f64::INFINITY
                }
            }
            Err(_) => f64::INFINITY,
        }
    }

    /// Fit with the default optimizer settings.
    ///
    /// # Errors
    ///
    /// See [`Self::fit_with`].
    pub fn fit(&self) -> SimResult<Co2FitResult> {
        self.fit_with(&OptimizerConfig::default())
    }

    /// Fit with the tolerances of a registry's `engine.co2_fit` settings.
    ///
    /// # Errors
    ///
    /// See [`Self::fit_with`].
    pub fn fit_with_defaults(&self, defaults: &ModelDefaults) -> SimResult<Co2FitResult> {
        self.fit_with(&defaults.engine.co2_fit.optimizer_config())
    }

    /// Fit the exhalation rate and the per-segment air exchange rates.
    ///
    /// Every parameter starts at 1 and is bounded below by 0. Bounds in
    /// `config` are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the trace has fewer samples than there
    /// are parameters, `Optimization` if the optimizer cannot start, and
    /// propagates errors from evaluating the fitted model.
    #[instrument(skip(self))]
    pub fn fit_with(&self, config: &OptimizerConfig) -> SimResult<Co2FitResult> {
        let n = self.segments() + 1;
        if self.times.len() < n {
            return Err(SimError::invalid_argument(format!(
                "{} CO2 samples cannot determine {n} parameters",
                self.times.len()
            )));
        }
        let optimizer = PowellOptimizer::new(OptimizerConfig {
            bounds: vec![(0.0, f64::INFINITY); n],
            ..config.clone()
        });
        let result = optimizer.minimize(|x| self.objective(x), &vec![1.0; n])?;

        let exhalation_rate = result.x[0];
        let ventilation_values = result.x[1..].to_vec();
        let predictive_co2 = self.concentrations_from_params(exhalation_rate, &ventilation_values)?;
        let ventilation_per_person = self.room.capacity.filter(|&c| c > 0).map(|capacity| {
            let volume = self.room.volume.mean();
            ventilation_values
                .iter()
                .map(|ach| ach * volume * 1000.0 / 3600.0 / f64::from(capacity))
                .collect()
        });
        info!(
            exhalation_rate,
            residual = result.fun,
            iterations = result.iterations,
            converged = result.converged,
            "fitted ventilation to CO2 trace"
        );

        Ok(Co2FitResult {
            exhalation_rate,
            ventilation_values,
            ventilation_per_person,
            predictive_co2,
            residual: result.fun,
            iterations: result.iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupancy() -> IntPiecewiseConstant {
        IntPiecewiseConstant::new(vec![8.0, 12.0, 13.0, 17.0], vec![2, 1, 2]).unwrap()
    }

    fn times() -> Vec<f64> {
        (0..=90).map(|i| 8.0 + f64::from(i) * 0.1).collect()
    }

    fn data(co2: Vec<f64>) -> Co2DataModel {
        Co2DataModel::new(
            Room::new(75.0).with_capacity(2),
            occupancy(),
            vec![8.0, 12.0, 13.0, 17.0],
            times(),
            co2,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let err = Co2DataModel::new(
            Room::new(75.0),
            occupancy(),
            vec![8.0, 17.0],
            vec![8.0, 9.0, 10.0],
            vec![440.0, 450.0],
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_too_few_samples() {
        let err = Co2DataModel::new(Room::new(75.0), occupancy(), vec![8.0, 17.0], vec![8.0], vec![440.0])
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_fit_rejects_underdetermined_trace() {
        let model = Co2DataModel::new(
            Room::new(75.0),
            occupancy(),
            vec![8.0, 12.0, 13.0, 17.0],
            vec![8.0, 10.0, 12.0],
            vec![440.44, 600.0, 700.0],
        )
        .unwrap();
        let err = model.fit().unwrap_err();
        assert!(matches!(err, SimError::InvalidArgument { .. }));
    }

    #[test]
    fn test_wrong_parameter_count() {
        let model = data(vec![440.44; 91]);
        assert!(model.concentrations_from_params(0.5, &[1.0, 1.0]).is_err());
        assert!(model.objective(&[0.5, 1.0]).is_infinite());
    }

    #[test]
    fn test_prediction_starts_at_background() {
        let model = data(vec![440.44; 91]);
        let predicted = model.concentrations_from_params(0.51, &[0.25, 2.45, 0.25]).unwrap();
        assert_eq!(predicted.len(), 91);
        assert!((predicted[0] - 440.44).abs() < 1e-9);
        assert!(predicted[40] > predicted[0]);
    }

    #[test]
    fn test_exact_data_has_zero_residual() {
        let model = data(vec![440.44; 91]);
        let predicted = model.concentrations_from_params(0.51, &[0.25, 2.45, 0.25]).unwrap();
        let model = data(predicted);
        assert!(model.objective(&[0.51, 0.25, 2.45, 0.25]) < 1e-9);
        assert!(model.objective(&[0.6, 0.25, 2.45, 0.25]) > 1.0);
    }
}
