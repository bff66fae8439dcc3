//! Closed-form concentration integrator.
//!
//! A well-mixed room obeys `dC/dt = E(t) - R(t)·C(t)` where the emission
//! `E` and the removal rate `R` only change at state-change times. Between
//! two such times the solution is exact:
//!
//! ```text
//! C(t) = C_lim + (C(t0) - C_lim)·exp(-R·(t - t0)),   C_lim = E/R + C_bg
//! ```
//!
//! and degenerates to the linear ramp `C(t0) + E·(t - t0)` when `R == 0`.
//!
//! Everything is computed in normalized units (divided by
//! [`ConcentrationModelBase::normalization_factor`]) so that batches of
//! sampled scenarios share the same arithmetic. The normalized concentration
//! at every state-change time is computed once per model instance and
//! cached; any other query is a binary search plus one closed-form step.

use tracing::debug;

use crate::engine::interval::sorted_unique;
use crate::engine::jidoka;
use crate::engine::memo::Memo;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Per-instance cache of the integrator state table.
///
/// Clones start cold and the cache never takes part in equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegratorCache {
    state_change_times: Memo<Vec<f64>>,
    normed_states: Memo<Vec<Value>>,
}

impl IntegratorCache {
    /// Empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state_change_times: Memo::new(),
            normed_states: Memo::new(),
        }
    }
}

/// Exact solution over `dt` hours starting from `c0`.
fn step(c0: &Value, removal_rate: &Value, emission: &Value, background: &Value, dt: f64) -> Value {
    Value::zip_all(&[c0, removal_rate, emission, background], |row| {
        let (c0, rr, emission, background) = (row[0], row[1], row[2], row[3]);
        if rr == 0.0 {
            c0 + emission * dt
        } else {
            let limit = emission / rr + background;
            limit + (c0 - limit) * (-rr * dt).exp()
        }
    })
}

/// Exact integral over `dt` hours of the solution starting from `c0`.
fn step_integral(
    c0: &Value,
    removal_rate: &Value,
    emission: &Value,
    background: &Value,
    dt: f64,
) -> Value {
    Value::zip_all(&[c0, removal_rate, emission, background], |row| {
        let (c0, rr, emission, background) = (row[0], row[1], row[2], row[3]);
        if rr == 0.0 {
            c0 * dt + emission * dt * dt / 2.0
        } else {
            let limit = emission / rr + background;
            limit * dt + (limit - c0) * ((-rr * dt).exp() - 1.0) / rr
        }
    })
}

/// A well-mixed room model solvable in closed form.
///
/// Implementors describe the inputs; the provided methods do the
/// integration.
pub trait ConcentrationModelBase {
    /// Room volume (m³).
    fn volume(&self) -> &Value;

    /// Total removal rate (h⁻¹) at `time`.
    fn removal_rate(&self, time: f64) -> Value;

    /// Number of emitters present at `time`.
    fn people_present(&self, time: f64) -> u32;

    /// Start of the first presence of the emitters, `None` if they never
    /// come.
    fn first_presence_time(&self) -> Option<f64>;

    /// Every time at which removal or emission may change, in any order.
    fn transition_times(&self) -> Vec<f64>;

    /// Scale of the emission per person present.
    fn normalization_factor(&self) -> Value;

    /// Concentration the room relaxes to in the absence of emitters.
    fn min_background_concentration(&self) -> Value {
        Value::ZERO
    }

    /// The instance cache.
    fn cache(&self) -> &IntegratorCache;

    /// Sorted state-change times, always starting at 0.
    fn state_change_times(&self) -> &[f64] {
        self.cache().state_change_times.get_or_init(|| {
            let mut times = self.transition_times();
            times.push(0.0);
            sorted_unique(&mut times);
            times
        })
    }

    /// Largest state-change time strictly before `time` (the first one if
    /// none is).
    fn last_state_change(&self, time: f64) -> f64 {
        let times = self.state_change_times();
        times[times.partition_point(|&t| t < time).saturating_sub(1)]
    }

    /// Smallest state-change time at or after `time`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `time` is beyond the last state change.
    fn next_state_change(&self, time: f64) -> SimResult<f64> {
        let times = self.state_change_times();
        let last = times[times.len() - 1];
        times
            .get(times.partition_point(|&t| t < time))
            .copied()
            .ok_or(SimError::OutOfRange { time, last })
    }

    /// Background concentration in normalized units.
    fn normed_background(&self) -> Value {
        self.min_background_concentration()
            .zip_with(&self.normalization_factor(), |bg, norm| {
                if bg == 0.0 {
                    0.0
                } else {
                    bg / norm
                }
            })
    }

    /// Normalized emission rate per unit volume at `time`.
    fn normed_emission(&self, time: f64) -> Value {
        f64::from(self.people_present(time)) / self.volume()
    }

    /// Normalized concentration at every state-change time.
    ///
    /// # Errors
    ///
    /// Returns `NonFiniteValue` if the table contains NaN or infinities.
    fn normed_state_table(&self) -> SimResult<&[Value]> {
        let table = self.cache().normed_states.get_or_try_init(|| {
            let times = self.state_change_times();
            let background = self.normed_background();
            let first_presence = self.first_presence_time();
            let mut states: Vec<Value> = Vec::with_capacity(times.len());
            for (i, &time) in times.iter().enumerate() {
                let state = match (first_presence, states.last()) {
                    (Some(first), Some(previous)) if time > first => step(
                        previous,
                        &self.removal_rate(time),
                        &self.normed_emission(time),
                        &background,
                        time - times[i - 1],
                    ),
                    _ => background.clone(),
                };
                jidoka::check_finite(&state, || format!("normed concentration at t={time}"))?;
                states.push(state);
            }
            debug!(states = states.len(), "computed concentration state table");
            Ok(states)
        })?;
        Ok(table)
    }

    /// Normalized concentration at `time`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` past the last state change and `NonFiniteValue`
    /// on numerical breakdown.
    fn normed_concentration(&self, time: f64) -> SimResult<Value> {
        let Some(first) = self.first_presence_time() else {
            return Ok(self.normed_background());
        };
        if time <= first {
            return Ok(self.normed_background());
        }
        let times = self.state_change_times();
        let index = times.partition_point(|&t| t < time).saturating_sub(1);
        let next = self.next_state_change(time)?;
        let c0 = &self.normed_state_table()?[index];
        Ok(step(
            c0,
            &self.removal_rate(next),
            &self.normed_emission(next),
            &self.normed_background(),
            time - times[index],
        ))
    }

    /// Concentration at `time`.
    ///
    /// # Errors
    ///
    /// See [`Self::normed_concentration`].
    fn concentration(&self, time: f64) -> SimResult<Value> {
        Ok(self.normed_concentration(time)? * self.normalization_factor())
    }

    /// Integral of the normalized concentration over `[start, stop]`.
    ///
    /// # Errors
    ///
    /// See [`Self::normed_concentration`].
    fn normed_integrated_concentration(&self, start: f64, stop: f64) -> SimResult<Value> {
        let background = self.normed_background();
        let presence_start = self.first_presence_time();
        if presence_start.map_or(true, |first| stop <= first) {
            return Ok(&background * (stop - start));
        }
        let times = self.state_change_times();
        let mut total = Value::ZERO;
        for window in times.windows(2) {
            let (a, b) = (window[0], window[1]);
            if start > b || stop < a {
                continue;
            }
            let segment_start = start.max(a);
            let segment_stop = stop.min(b);
            let c0 = self.normed_concentration(segment_start)?;
            let next = self.next_state_change(segment_stop)?;
            total += step_integral(
                &c0,
                &self.removal_rate(next),
                &self.normed_emission(next),
                &background,
                segment_stop - segment_start,
            );
        }
        Ok(total)
    }

    /// Integral of the concentration over `[start, stop]`.
    ///
    /// # Errors
    ///
    /// See [`Self::normed_concentration`].
    fn integrated_concentration(&self, start: f64, stop: f64) -> SimResult<Value> {
        Ok(self.normed_integrated_concentration(start, stop)? * self.normalization_factor())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct Schedule {
        volume: Value,
        removal: Vec<f64>,
        cache: IntegratorCache,
    }

    impl ConcentrationModelBase for Schedule {
        fn volume(&self) -> &Value {
            &self.volume
        }

        fn removal_rate(&self, time: f64) -> Value {
            // one removal rate per 4-hour block
            let block = ((time / 4.0).ceil() as usize).saturating_sub(1);
            Value::from(self.removal[block.min(self.removal.len() - 1)])
        }

        fn people_present(&self, time: f64) -> u32 {
            if (1.0 < time && time <= 6.0) || (9.0 < time && time <= 14.0) {
                2
            } else {
                0
            }
        }

        fn first_presence_time(&self) -> Option<f64> {
            Some(1.0)
        }

        fn transition_times(&self) -> Vec<f64> {
            vec![1.0, 4.0, 6.0, 8.0, 9.0, 12.0, 14.0, 16.0]
        }

        fn normalization_factor(&self) -> Value {
            Value::from(3.0)
        }

        fn cache(&self) -> &IntegratorCache {
            &self.cache
        }
    }

    proptest! {
        /// Falsification: integrals over adjacent windows add up.
        #[test]
        fn prop_integral_additivity(
            removal in prop::collection::vec(0.0f64..5.0, 4),
            a in 0.0f64..5.0,
            ab in 0.0f64..5.0,
            bc in 0.0f64..5.0,
        ) {
            let model = Schedule { volume: Value::from(50.0), removal, cache: IntegratorCache::new() };
            let (b, c) = (a + ab, a + ab + bc);
            let whole = model.integrated_concentration(a, c).unwrap().get(0);
            let parts = model.integrated_concentration(a, b).unwrap().get(0)
                + model.integrated_concentration(b, c).unwrap().get(0);
            prop_assert!((whole - parts).abs() <= 1e-9 * (1.0 + whole.abs()));
        }

        /// Falsification: concentration is never negative.
        #[test]
        fn prop_non_negative(
            removal in prop::collection::vec(0.0f64..5.0, 4),
            t in 0.0f64..16.0,
        ) {
            let model = Schedule { volume: Value::from(50.0), removal, cache: IntegratorCache::new() };
            prop_assert!(model.concentration(t).unwrap().get(0) >= 0.0);
        }

        /// Falsification: repeated queries at a state change are stable.
        #[test]
        fn prop_last_state_change_idempotent(
            removal in prop::collection::vec(0.0f64..5.0, 4),
            t in 0.0f64..16.0,
        ) {
            let model = Schedule { volume: Value::from(50.0), removal, cache: IntegratorCache::new() };
            let last = model.last_state_change(t);
            let first = model.concentration(last).unwrap();
            let second = model.concentration(last).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
