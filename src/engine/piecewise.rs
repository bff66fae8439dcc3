//! Piecewise-constant functions of time.
//!
//! A function with `n` values is described by `n + 1` strictly increasing
//! transition times; value `i` holds on `(t[i], t[i + 1]]`. Temperatures,
//! custom ventilation schedules and measured occupancy are all expressed
//! this way.

use serde::{Deserialize, Serialize};

use crate::engine::interval::SpecificInterval;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

fn validate_transition_times(transition_times: &[f64], n_values: usize) -> SimResult<()> {
    if n_values == 0 {
        return Err(SimError::invalid_argument("at least one value is required"));
    }
    if transition_times.len() != n_values + 1 {
        return Err(SimError::invalid_argument(format!(
            "transition_times should contain one more element than values (got {} times for {} values)",
            transition_times.len(),
            n_values
        )));
    }
    if transition_times.iter().any(|t| !t.is_finite()) {
        return Err(SimError::invalid_argument("transition_times must be finite"));
    }
    if transition_times.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SimError::invalid_argument(
            "transition_times should not contain duplicated elements and should be sorted",
        ));
    }
    Ok(())
}

/// Index of the segment `(t[i], t[i + 1]]` containing `time`, clamped to the
/// first/last segment outside the range.
fn segment_index(transition_times: &[f64], time: f64) -> usize {
    let n_segments = transition_times.len() - 1;
    transition_times
        .partition_point(|&t| t < time)
        .saturating_sub(1)
        .min(n_segments - 1)
}

fn nonzero_segments(
    transition_times: &[f64],
    nonzero: impl Iterator<Item = bool>,
) -> SpecificInterval {
    let present_times = transition_times
        .windows(2)
        .zip(nonzero)
        .filter(|(_, present)| *present)
        .map(|(w, _)| (w[0], w[1]))
        .collect();
    SpecificInterval::new(present_times)
}

#[derive(Deserialize)]
struct RawPiecewise<V> {
    transition_times: Vec<f64>,
    values: Vec<V>,
}

/// Piecewise-constant, possibly vectorised, function of time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPiecewise<Value>")]
pub struct PiecewiseConstant {
    transition_times: Vec<f64>,
    values: Vec<Value>,
}

impl TryFrom<RawPiecewise<Value>> for PiecewiseConstant {
    type Error = SimError;

    fn try_from(raw: RawPiecewise<Value>) -> SimResult<Self> {
        Self::new(raw.transition_times, raw.values)
    }
}

impl PiecewiseConstant {
    /// Create a piecewise-constant function.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the number of times is not one more than
    /// the number of values, if times are not strictly increasing, or if the
    /// values do not all have the same shape.
    pub fn new(transition_times: Vec<f64>, values: Vec<Value>) -> SimResult<Self> {
        validate_transition_times(&transition_times, values.len())?;
        if let Some(first) = values.first() {
            if values.iter().any(|v| v.len() != first.len()) {
                return Err(SimError::invalid_argument("All values must have the same shape"));
            }
        }
        Ok(Self {
            transition_times,
            values,
        })
    }

    /// A single value held over the whole day.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self {
            transition_times: vec![0.0, 24.0],
            values: vec![value.into()],
        }
    }

    /// Transition times.
    #[must_use]
    pub fn transition_times(&self) -> &[f64] {
        &self.transition_times
    }

    /// Values, one per segment.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at `time`, clamped to the first/last value outside the range.
    #[must_use]
    pub fn value(&self, time: f64) -> &Value {
        &self.values[segment_index(&self.transition_times, time)]
    }

    /// Interval covering every segment with a non-zero value.
    #[must_use]
    pub fn interval(&self) -> SpecificInterval {
        nonzero_segments(
            &self.transition_times,
            self.values.iter().map(|v| v.any(|x| x != 0.0)),
        )
    }

    /// Resample onto an evenly spaced mesh `factor` times finer, linearly
    /// interpolating between the original transition times.
    ///
    /// The original transition times are kept in the mesh so that interval
    /// ends are preserved exactly.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `factor` is zero.
    pub fn refine(&self, factor: usize) -> SimResult<Self> {
        if factor == 0 {
            return Err(SimError::invalid_argument("refine factor must be at least 1"));
        }
        let t0 = self.transition_times[0];
        let tn = self.transition_times[self.transition_times.len() - 1];
        let n_steps = self.values.len() * factor;

        let mut candidates: Vec<(f64, bool)> = (0..=n_steps)
            .map(|k| (t0 + (tn - t0) * k as f64 / n_steps as f64, false))
            .chain(self.transition_times.iter().map(|&t| (t, true)))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Mesh points that coincide with an original time (up to rounding) are
        // replaced by the original.
        let mut times: Vec<f64> = Vec::with_capacity(candidates.len());
        let mut last_is_original = false;
        for (t, original) in candidates {
            match times.last_mut() {
                Some(last) if (t - *last).abs() <= 1e-9 * (1.0 + t.abs()) => {
                    if original && !last_is_original {
                        *last = t;
                        last_is_original = true;
                    }
                }
                _ => {
                    times.push(t);
                    last_is_original = original;
                }
            }
        }

        let last_value = &self.values[self.values.len() - 1];
        let values = times[..times.len() - 1]
            .iter()
            .map(|&t| {
                let i = self
                    .transition_times
                    .partition_point(|&x| x <= t)
                    .saturating_sub(1)
                    .min(self.values.len() - 1);
                let (start, end) = (self.transition_times[i], self.transition_times[i + 1]);
                let here = &self.values[i];
                let next = self.values.get(i + 1).unwrap_or(last_value);
                let frac = (t - start) / (end - start);
                here + &((next - here) * frac)
            })
            .collect();

        Self::new(times, values)
    }
}

/// Piecewise-constant integer function of time, used for occupancy.
///
/// Unlike [`PiecewiseConstant`], the value is 0 outside the transition range:
/// nobody is in the room before the first or after the last transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPiecewise<u32>")]
pub struct IntPiecewiseConstant {
    transition_times: Vec<f64>,
    values: Vec<u32>,
}

impl TryFrom<RawPiecewise<u32>> for IntPiecewiseConstant {
    type Error = SimError;

    fn try_from(raw: RawPiecewise<u32>) -> SimResult<Self> {
        Self::new(raw.transition_times, raw.values)
    }
}

impl IntPiecewiseConstant {
    /// Create an integer piecewise-constant function.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the number of times is not one more than
    /// the number of values or if times are not strictly increasing.
    pub fn new(transition_times: Vec<f64>, values: Vec<u32>) -> SimResult<Self> {
        validate_transition_times(&transition_times, values.len())?;
        Ok(Self {
            transition_times,
            values,
        })
    }

    /// Transition times.
    #[must_use]
    pub fn transition_times(&self) -> &[f64] {
        &self.transition_times
    }

    /// Values, one per segment.
    #[must_use]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// Value at `time`; 0 outside the transition range.
    #[must_use]
    pub fn value(&self, time: f64) -> u32 {
        let first = self.transition_times[0];
        let last = self.transition_times[self.transition_times.len() - 1];
        if time <= first || time > last {
            return 0;
        }
        self.values[segment_index(&self.transition_times, time)]
    }

    /// Interval covering every segment with a non-zero value.
    #[must_use]
    pub fn interval(&self) -> SpecificInterval {
        nonzero_segments(&self.transition_times, self.values.iter().map(|&v| v != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperatures() -> PiecewiseConstant {
        PiecewiseConstant::new(
            vec![0.0, 8.0, 16.0, 24.0],
            vec![Value::from(283.0), Value::from(288.0), Value::from(280.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = PiecewiseConstant::new(vec![0.0, 1.0], vec![Value::from(1.0), Value::from(2.0)])
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_unsorted_rejected() {
        let err = PiecewiseConstant::new(
            vec![0.0, 2.0, 1.0],
            vec![Value::from(1.0), Value::from(2.0)],
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
        assert!(IntPiecewiseConstant::new(vec![0.0, 0.0], vec![1]).is_err());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = PiecewiseConstant::new(
            vec![0.0, 1.0, 2.0],
            vec![Value::from(1.0), Value::array(vec![1.0, 2.0])],
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_value_lookup() {
        let f = temperatures();
        assert_eq!(f.value(4.0), &Value::from(283.0));
        assert_eq!(f.value(8.0), &Value::from(283.0));
        assert_eq!(f.value(8.5), &Value::from(288.0));
        assert_eq!(f.value(16.0), &Value::from(288.0));
        assert_eq!(f.value(20.0), &Value::from(280.0));
    }

    #[test]
    fn test_value_clamped_outside_range() {
        let f = temperatures();
        assert_eq!(f.value(-5.0), &Value::from(283.0));
        assert_eq!(f.value(30.0), &Value::from(280.0));
    }

    #[test]
    fn test_interval_collapses_nonzero_segments() {
        let f = PiecewiseConstant::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![Value::from(0.0), Value::from(5.0), Value::from(1.0)],
        )
        .unwrap();
        assert_eq!(f.interval().present_times, vec![(1.0, 2.0), (2.0, 3.0)]);
    }

    #[test]
    fn test_refine_preserves_ends_and_interpolates() {
        let f = PiecewiseConstant::new(
            vec![0.0, 1.0, 2.0],
            vec![Value::from(0.0), Value::from(10.0)],
        )
        .unwrap();
        let refined = f.refine(4).unwrap();
        assert_eq!(refined.transition_times().len(), 9);
        assert!(refined.transition_times().contains(&1.0));
        assert_eq!(refined.values().len(), 8);
        assert_eq!(refined.values()[0], Value::from(0.0));
        assert!((refined.values()[2].mean() - 5.0).abs() < 1e-12);
        // Last segment is held flat at the last value.
        assert!((refined.values()[7].mean() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_refine_keeps_uneven_transitions() {
        let f = PiecewiseConstant::new(
            vec![0.0, 0.3, 1.0],
            vec![Value::from(1.0), Value::from(2.0)],
        )
        .unwrap();
        let refined = f.refine(2).unwrap();
        assert!(refined.transition_times().contains(&0.3));
        assert_eq!(
            refined.transition_times().len(),
            refined.values().len() + 1
        );
    }

    #[test]
    fn test_int_piecewise_zero_outside() {
        let occupancy = IntPiecewiseConstant::new(vec![8.0, 12.0, 13.0, 17.0], vec![2, 0, 3]).unwrap();
        assert_eq!(occupancy.value(7.0), 0);
        assert_eq!(occupancy.value(8.0), 0);
        assert_eq!(occupancy.value(9.0), 2);
        assert_eq!(occupancy.value(12.5), 0);
        assert_eq!(occupancy.value(17.0), 3);
        assert_eq!(occupancy.value(18.0), 0);
        assert_eq!(
            occupancy.interval().present_times,
            vec![(8.0, 12.0), (13.0, 17.0)]
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: PiecewiseConstant =
            serde_json::from_str(r#"{"transition_times": [0.0, 24.0], "values": [293.0]}"#).unwrap();
        assert_eq!(ok.value(1.0), &Value::from(293.0));
        let bad: Result<PiecewiseConstant, _> =
            serde_json::from_str(r#"{"transition_times": [0.0], "values": [293.0]}"#);
        assert!(bad.is_err());
    }
}
