//! Jidoka (自働化) - stop the line on numerical breakdown.
//!
//! The integrator and the optimizer inspect every intermediate state they
//! produce. A NaN or an infinity never propagates into a dose or a risk
//! figure: the computation stops and reports where it happened.

use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Anomaly detected by a Jidoka inspection.
#[derive(Debug, Clone, PartialEq)]
pub enum JidokaViolation {
    /// NaN or infinity in a computed quantity.
    NonFiniteValue {
        /// Where the value was produced.
        location: String,
        /// Index of the first offending sample (0 for a scalar).
        sample: usize,
        /// The offending value.
        value: f64,
    },
}

impl From<JidokaViolation> for SimError {
    fn from(v: JidokaViolation) -> Self {
        match v {
            JidokaViolation::NonFiniteValue {
                location,
                sample,
                value,
            } => Self::NonFiniteValue {
                location: format!("{location} (sample {sample} = {value})"),
            },
        }
    }
}

/// First non-finite sample of `value`, if any.
#[must_use]
pub fn inspect(value: &Value) -> Option<(usize, f64)> {
    value
        .as_slice()
        .iter()
        .copied()
        .enumerate()
        .find(|(_, x)| !x.is_finite())
}

/// Check that every sample of `value` is finite.
///
/// `location` is only evaluated when the check fails.
///
/// # Errors
///
/// Returns `NonFiniteValue` naming `location` and the offending sample.
pub fn check_finite(value: &Value, location: impl FnOnce() -> String) -> SimResult<()> {
    match inspect(value) {
        None => Ok(()),
        Some((sample, value)) => Err(JidokaViolation::NonFiniteValue {
            location: location(),
            sample,
            value,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_passes() {
        assert!(check_finite(&Value::from(1.0), || unreachable!()).is_ok());
        assert!(check_finite(&Value::array(vec![0.0, 2.0]), || unreachable!()).is_ok());
    }

    #[test]
    fn test_nan_stops_the_line() {
        let err = check_finite(&Value::array(vec![1.0, f64::NAN]), || "state".to_string())
            .unwrap_err();
        match err {
            SimError::NonFiniteValue { location } => {
                assert!(location.starts_with("state (sample 1"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_inspect_reports_first_offender() {
        let value = Value::array(vec![1.0, f64::INFINITY, f64::NAN]);
        let (sample, x) = inspect(&value).unwrap();
        assert_eq!(sample, 1);
        assert!(x.is_infinite());
    }
}
