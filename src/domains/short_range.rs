//! Short-range exposure: the exhaled jet of an infected person in close
//! conversation, on top of the well-mixed room concentration.
//!
//! The jet is modelled in two stages (Jia et al. 2022). Up to a transition
//! distance `x*` it behaves as a jet whose dilution grows linearly with
//! distance; beyond `x*` it becomes a puff with a cubic dilution correction.

use std::f64::consts::PI;

use crate::domains::aerosol::Expiration;
use crate::domains::concentration::ConcentrationModel;
use crate::domains::population::Activity;
use crate::engine::integrator::ConcentrationModelBase;
use crate::engine::interval::SpecificInterval;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Mouth opening diameter (m).
const MOUTH_DIAMETER: f64 = 0.02;
/// Ratio of breathing cycle to exhalation duration.
const EXHALATION_COEFFICIENT: f64 = 2.0;
/// Duration of one breathing cycle (s).
const BREATHING_CYCLE: f64 = 2.0;
/// Radial penetration coefficient in the jet stage.
const BETA_R1: f64 = 0.18;
/// Radial penetration coefficient in the puff stage.
const BETA_R2: f64 = 0.2;
/// Streamwise penetration coefficient.
const BETA_X1: f64 = 2.4;

/// A close-range interaction with an infected person.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortRangeModel {
    expiration: Expiration,
    activity: Activity,
    presence: (f64, f64),
    distance: Value,
}

impl ShortRangeModel {
    /// Interaction during the single interval `presence`, at `distance`
    /// metres.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `presence` holds exactly one
    /// interval.
    pub fn new(
        expiration: Expiration,
        activity: Activity,
        presence: &SpecificInterval,
        distance: impl Into<Value>,
    ) -> SimResult<Self> {
        let [interval] = presence.present_times.as_slice() else {
            return Err(SimError::invalid_argument(format!(
                "short-range presence must be a single interval, got {}",
                presence.present_times.len()
            )));
        };
        Ok(Self {
            expiration,
            activity,
            presence: *interval,
            distance: distance.into(),
        })
    }

    /// The expiratory activity of the infected person.
    #[must_use]
    pub const fn expiration(&self) -> &Expiration {
        &self.expiration
    }

    /// The physical activity of the infected person.
    #[must_use]
    pub const fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Interaction start and end (hours).
    #[must_use]
    pub const fn presence(&self) -> (f64, f64) {
        self.presence
    }

    /// Interpersonal distance (m).
    #[must_use]
    pub const fn distance(&self) -> &Value {
        &self.distance
    }

    /// Dilution of the exhaled jet at the interaction distance.
    #[must_use]
    pub fn dilution_factor(&self) -> Value {
        Value::zip_all(&[&self.activity.exhalation_rate, &self.distance], |row| {
            dilution(row[0], row[1])
        })
    }

    /// Intersection of the interaction with `[time1, time2]`; `(0, 0)` when
    /// they do not overlap.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `time1 > time2`.
    pub fn extract_between_bounds(&self, time1: f64, time2: f64) -> SimResult<(f64, f64)> {
        if time1 > time2 {
            return Err(SimError::invalid_argument(format!(
                "time1 ({time1}) must be less than or equal to time2 ({time2})"
            )));
        }
        let (start, stop) = self.presence;
        if stop < time1 || start > time2 {
            return Ok((0.0, 0.0));
        }
        Ok((start.max(time1), stop.min(time2)))
    }

    /// Long-range quantity sampled at this interaction's particle sizes.
    fn interpolate_long_range(&self, model: &ConcentrationModel, long_range: &Value) -> Value {
        interpolate(
            &self.expiration.diameter,
            model.infected().particle().diameter.as_ref(),
            long_range,
        )
    }

    /// Short-range concentration at `time`, normalized by the viral load.
    ///
    /// # Errors
    ///
    /// Propagates errors from the long-range model.
    pub fn normed_concentration(&self, model: &ConcentrationModel, time: f64) -> SimResult<Value> {
        let (start, stop) = self.presence;
        if !(start <= time && time <= stop) {
            return Ok(Value::ZERO);
        }
        let viral_load = &model.infected().virus.viral_load_in_sputum;
        let long_range = model.concentration(time)? / viral_load;
        let interpolated = self.interpolate_long_range(model, &long_range);
        Ok((self.expiration.jet_origin_concentration() - interpolated) / self.dilution_factor())
    }

    /// Short-range concentration (virions/m³) at `time`, excluding the
    /// long-range background.
    ///
    /// # Errors
    ///
    /// Propagates errors from the long-range model.
    pub fn short_range_concentration(
        &self,
        model: &ConcentrationModel,
        time: f64,
    ) -> SimResult<Value> {
        Ok(self.normed_concentration(model, time)? * &model.infected().virus.viral_load_in_sputum)
    }

    /// Integrated jet-origin concentration over the interaction clipped to
    /// `[time1, time2]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `time1 > time2`.
    pub fn normed_jet_exposure_between_bounds(&self, time1: f64, time2: f64) -> SimResult<Value> {
        let (start, stop) = self.extract_between_bounds(time1, time2)?;
        Ok(self.expiration.jet_origin_concentration() * (stop - start))
    }

    /// Integrated long-range concentration, normalized by the viral load and
    /// sampled at this interaction's particle sizes, over the interaction
    /// clipped to `[time1, time2]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `time1 > time2` and propagates errors
    /// from the long-range model.
    pub fn normed_interpolated_long_range_exposure_between_bounds(
        &self,
        model: &ConcentrationModel,
        time1: f64,
        time2: f64,
    ) -> SimResult<Value> {
        let (start, stop) = self.extract_between_bounds(time1, time2)?;
        if stop <= start {
            return Ok(Value::ZERO);
        }
        let integrated = model.integrated_concentration(start, stop)?
            / &model.infected().virus.viral_load_in_sputum;
        Ok(self.interpolate_long_range(model, &integrated))
    }
}

/// Two-stage jet dilution at `distance` metres for an exhalation rate in m³/h.
fn dilution(exhalation_rate: f64, distance: f64) -> f64 {
    let breathing_rate = exhalation_rate / 3600.0;
    let q_exh = EXHALATION_COEFFICIENT * breathing_rate;
    let mouth_area = PI * MOUTH_DIAMETER.powi(2) / 4.0;
    let u0 = q_exh / mouth_area;
    let x0 = MOUTH_DIAMETER / 2.0 / BETA_R1;
    let t0 = PI.sqrt() * MOUTH_DIAMETER.powi(3) / (8.0 * BETA_R1.powi(2) * BETA_X1.powi(2) * q_exh);
    let xstar = BETA_X1 * (q_exh * u0).powf(0.25) * (BREATHING_CYCLE + t0).sqrt() - x0;
    let s_xstar = 2.0 * BETA_R1 * (xstar + x0) / MOUTH_DIAMETER;
    if distance < xstar {
        2.0 * BETA_R1 * (distance + x0) / MOUTH_DIAMETER
    } else {
        s_xstar * (1.0 + BETA_R2 * (distance - xstar) / BETA_R1 / (xstar + x0)).powi(3)
    }
}

/// Piecewise-linear interpolation of `(known_x, known_y)` at `query`,
/// clamped to the end values.
///
/// Without known abscissae (or with a single one) the known values apply
/// to every query point.
fn interpolate(query: &Value, known_x: Option<&Value>, known_y: &Value) -> Value {
    let Some(xs @ Value::Array(_)) = known_x else {
        return known_y.clone();
    };
    let mut points: Vec<(f64, f64)> = match Value::broadcast_len(&[xs, known_y]) {
        Some(n) => (0..n).map(|i| (xs.get(i), known_y.get(i))).collect(),
        None => return known_y.clone(),
    };
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    query.map(|q| interpolate_sorted(&points, q))
}

fn interpolate_sorted(points: &[(f64, f64)], q: f64) -> f64 {
    let (first, last) = (points[0], points[points.len() - 1]);
    if q <= first.0 {
        return first.1;
    }
    if q >= last.0 {
        return last.1;
    }
    let upper = points.partition_point(|&(x, _)| x <= q);
    let (x0, y0) = points[upper - 1];
    let (x1, y1) = points[upper];
    if x1 == x0 {
        y0
    } else {
        y0 + (y1 - y0) * (q - x0) / (x1 - x0)
    }
}
