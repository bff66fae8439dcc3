//! Presence intervals over a simulated day.
//!
//! An [`Interval`] answers "when is something happening": a population in the
//! room, a window open, an air purifier running. Times are hours from the
//! start of the day. Boundaries are open at the start and closed at the end,
//! so a feature active on `(8, 12)` is triggered at 12 but not at 8.

use serde::{Deserialize, Serialize};

/// Explicit list of `(start, end)` presence boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificInterval {
    /// Ordered `(start, end)` pairs, in hours.
    pub present_times: Vec<(f64, f64)>,
}

impl SpecificInterval {
    /// Create an interval from `(start, end)` pairs.
    #[must_use]
    pub fn new(present_times: Vec<(f64, f64)>) -> Self {
        Self { present_times }
    }
}

/// Repeating presence: `duration` minutes every `period` minutes, starting at
/// `start` hours and repeating until the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicInterval {
    /// Minutes between two consecutive starts.
    pub period: f64,
    /// Minutes each occurrence lasts.
    pub duration: f64,
    /// Hour of the first occurrence.
    #[serde(default)]
    pub start: f64,
}

impl PeriodicInterval {
    /// Create a periodic interval.
    #[must_use]
    pub const fn new(period: f64, duration: f64, start: f64) -> Self {
        Self {
            period,
            duration,
            start,
        }
    }

    /// Occurrences within the day; empty unless both `period` and
    /// `duration` are positive and finite.
    fn boundaries(&self) -> Vec<(f64, f64)> {
        let positive = |minutes: f64| minutes.is_finite() && minutes > 0.0;
        if !positive(self.period) || !positive(self.duration) {
            return Vec::new();
        }
        let step = self.period / 60.0;
        let duration = self.duration / 60.0;
        (0_u32..)
            .map(|k| self.start + f64::from(k) * step)
            .take_while(|&begin| begin < 24.0)
            .map(|begin| (begin, begin + duration))
            .collect()
    }
}

/// When a feature is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// Explicit boundaries.
    Specific(SpecificInterval),
    /// Repeating boundaries.
    Periodic(PeriodicInterval),
}

impl From<SpecificInterval> for Interval {
    fn from(interval: SpecificInterval) -> Self {
        Self::Specific(interval)
    }
}

impl From<PeriodicInterval> for Interval {
    fn from(interval: PeriodicInterval) -> Self {
        Self::Periodic(interval)
    }
}

impl Interval {
    /// Interval made of explicit `(start, end)` pairs.
    #[must_use]
    pub fn specific(present_times: Vec<(f64, f64)>) -> Self {
        Self::Specific(SpecificInterval::new(present_times))
    }

    /// Interval repeating `duration` minutes every `period` minutes.
    #[must_use]
    pub const fn periodic(period: f64, duration: f64, start: f64) -> Self {
        Self::Periodic(PeriodicInterval::new(period, duration, start))
    }

    /// Ordered `(start, end)` boundaries.
    #[must_use]
    pub fn boundaries(&self) -> Vec<(f64, f64)> {
        match self {
            Self::Specific(interval) => interval.present_times.clone(),
            Self::Periodic(interval) => interval.boundaries(),
        }
    }

    /// Sorted, de-duplicated set of all boundary endpoints.
    #[must_use]
    pub fn transition_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .boundaries()
            .into_iter()
            .flat_map(|(start, end)| [start, end])
            .collect();
        sorted_unique(&mut times);
        times
    }

    /// True if `time` falls in some `(start, end]`.
    #[must_use]
    pub fn triggered(&self, time: f64) -> bool {
        self.boundaries()
            .iter()
            .any(|&(start, end)| start < time && time <= end)
    }
}

/// Sort `times` ascending and drop exact duplicates.
pub fn sorted_unique(times: &mut Vec<f64>) {
    times.sort_by(f64::total_cmp);
    times.dedup();
}

/// Sorted union of several transition-time sets.
#[must_use]
pub fn union_times<I>(sets: I) -> Vec<f64>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = f64>,
{
    let mut times: Vec<f64> = sets.into_iter().flatten().collect();
    sorted_unique(&mut times);
    times
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_boundaries_and_transitions() {
        let interval = Interval::specific(vec![(8.0, 12.0), (13.0, 17.0)]);
        assert_eq!(interval.boundaries(), vec![(8.0, 12.0), (13.0, 17.0)]);
        assert_eq!(interval.transition_times(), vec![8.0, 12.0, 13.0, 17.0]);
    }

    #[test]
    fn test_triggered_open_start_closed_end() {
        let interval = Interval::specific(vec![(8.0, 12.0)]);
        assert!(!interval.triggered(8.0));
        assert!(interval.triggered(8.5));
        assert!(interval.triggered(12.0));
        assert!(!interval.triggered(12.1));
    }

    #[test]
    fn test_periodic_boundaries() {
        // 10 minutes every 2 hours from 8h
        let interval = Interval::periodic(120.0, 10.0, 8.0);
        let boundaries = interval.boundaries();
        assert_eq!(boundaries.len(), 8);
        assert!((boundaries[0].0 - 8.0).abs() < 1e-12);
        assert!((boundaries[0].1 - (8.0 + 10.0 / 60.0)).abs() < 1e-12);
        assert!((boundaries[7].0 - 22.0).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_degenerate_is_empty() {
        assert!(Interval::periodic(0.0, 10.0, 0.0).boundaries().is_empty());
        assert!(Interval::periodic(60.0, 0.0, 0.0).boundaries().is_empty());
        assert!(Interval::periodic(0.0, 0.0, 0.0).transition_times().is_empty());
        assert!(!Interval::periodic(0.0, 10.0, 0.0).triggered(1.0));
    }

    #[test]
    fn test_periodic_non_positive_period_is_empty() {
        assert!(Interval::periodic(-60.0, 10.0, 8.0).boundaries().is_empty());
        assert!(Interval::periodic(60.0, -10.0, 8.0).boundaries().is_empty());
        assert!(Interval::periodic(f64::NAN, 10.0, 8.0).boundaries().is_empty());
        assert!(!Interval::periodic(-60.0, 10.0, 8.0).triggered(8.05));
    }

    #[test]
    fn test_shared_endpoints_deduplicated() {
        let interval = Interval::specific(vec![(8.0, 12.0), (12.0, 17.0)]);
        assert_eq!(interval.transition_times(), vec![8.0, 12.0, 17.0]);
    }

    #[test]
    fn test_union_times() {
        let times = union_times([vec![3.0, 1.0], vec![2.0, 1.0], vec![0.0]]);
        assert_eq!(times, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
