//! Long-range concentration models: virus and CO2.

use crate::domains::population::{InfectedPopulation, Population};
use crate::domains::room::Room;
use crate::domains::ventilation::{AirExchange, Ventilation};
use crate::engine::integrator::{ConcentrationModelBase, IntegratorCache};
use crate::engine::interval::union_times;
use crate::engine::value::Value;

/// Fraction of the emitted diameter left after evaporation.
pub const DEFAULT_EVAPORATION_FACTOR: f64 = 0.3;

/// Height (m) over which settling particles are removed from the
/// breathing zone.
const SETTLING_HEIGHT: f64 = 1.5;

/// Atmospheric CO2 (ppm).
pub const ATMOSPHERIC_CO2: f64 = 440.44;

/// Volume fraction of CO2 in exhaled air.
pub const EXHALED_CO2_FRACTION: f64 = 0.042;

fn first_presence(population: &Population) -> Option<f64> {
    population
        .presence_interval()
        .boundaries()
        .first()
        .map(|&(start, _)| start)
}

/// Airborne virus concentration (virions/m³) emitted by an infected
/// population.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationModel {
    room: Room,
    ventilation: Ventilation,
    infected: InfectedPopulation,
    evaporation_factor: f64,
    cache: IntegratorCache,
}

impl ConcentrationModel {
    /// Concentration model with the default evaporation factor.
    #[must_use]
    pub fn new(room: Room, ventilation: Ventilation, infected: InfectedPopulation) -> Self {
        Self {
            room,
            ventilation,
            infected,
            evaporation_factor: DEFAULT_EVAPORATION_FACTOR,
            cache: IntegratorCache::new(),
        }
    }

    /// Copy with a different evaporation factor.
    #[must_use]
    pub fn with_evaporation_factor(&self, evaporation_factor: f64) -> Self {
        Self {
            evaporation_factor,
            ..self.clone()
        }
    }

    /// Copy with a different infected population.
    #[must_use]
    pub fn with_infected(&self, infected: InfectedPopulation) -> Self {
        Self::new(self.room.clone(), self.ventilation.clone(), infected)
            .with_evaporation_factor(self.evaporation_factor)
    }

    /// Copy with a different ventilation.
    #[must_use]
    pub fn with_ventilation(&self, ventilation: Ventilation) -> Self {
        Self::new(self.room.clone(), ventilation, self.infected.clone())
            .with_evaporation_factor(self.evaporation_factor)
    }

    /// The room.
    #[must_use]
    pub const fn room(&self) -> &Room {
        &self.room
    }

    /// The ventilation.
    #[must_use]
    pub const fn ventilation(&self) -> &Ventilation {
        &self.ventilation
    }

    /// The emitters.
    #[must_use]
    pub const fn infected(&self) -> &InfectedPopulation {
        &self.infected
    }

    /// Evaporation factor applied to emitted particle diameters.
    #[must_use]
    pub const fn evaporation_factor(&self) -> f64 {
        self.evaporation_factor
    }

    /// Gravitational deposition rate (h⁻¹).
    #[must_use]
    pub fn deposition_rate(&self) -> Value {
        self.infected
            .particle()
            .settling_velocity(self.evaporation_factor)
            * 3600.0
            / SETTLING_HEIGHT
    }

    /// Biological decay rate (h⁻¹) at `time`.
    #[must_use]
    pub fn decay_rate(&self, time: f64) -> Value {
        self.infected
            .virus
            .decay_constant(&self.room.humidity, self.room.inside_temp.value(time))
    }

    /// Air exchange rate (h⁻¹) at `time`.
    #[must_use]
    pub fn air_exchange(&self, time: f64) -> Value {
        self.ventilation.air_exchange(&self.room, time)
    }
}

impl ConcentrationModelBase for ConcentrationModel {
    fn volume(&self) -> &Value {
        &self.room.volume
    }

    fn removal_rate(&self, time: f64) -> Value {
        self.deposition_rate() + self.decay_rate(time) + self.air_exchange(time)
    }

    fn people_present(&self, time: f64) -> u32 {
        self.infected.population.people_present(time)
    }

    fn first_presence_time(&self) -> Option<f64> {
        first_presence(&self.infected.population)
    }

    fn transition_times(&self) -> Vec<f64> {
        union_times([
            self.infected.population.occupancy.transition_times(),
            self.ventilation.transition_times(&self.room),
            self.room.inside_temp.transition_times().to_vec(),
        ])
    }

    fn normalization_factor(&self) -> Value {
        self.infected.emission_rate_per_person_when_present()
    }

    fn cache(&self) -> &IntegratorCache {
        &self.cache
    }
}

/// CO2 concentration (ppm) produced by the breathing of a population.
#[derive(Debug, Clone, PartialEq)]
pub struct Co2ConcentrationModel {
    room: Room,
    ventilation: Ventilation,
    emitters: Population,
    cache: IntegratorCache,
}

impl Co2ConcentrationModel {
    /// CO2 model of `emitters` breathing in `room`.
    #[must_use]
    pub fn new(room: Room, ventilation: Ventilation, emitters: Population) -> Self {
        Self {
            room,
            ventilation,
            emitters,
            cache: IntegratorCache::new(),
        }
    }

    /// The room.
    #[must_use]
    pub const fn room(&self) -> &Room {
        &self.room
    }

    /// The ventilation.
    #[must_use]
    pub const fn ventilation(&self) -> &Ventilation {
        &self.ventilation
    }

    /// The people breathing out CO2.
    #[must_use]
    pub const fn emitters(&self) -> &Population {
        &self.emitters
    }
}

impl ConcentrationModelBase for Co2ConcentrationModel {
    fn volume(&self) -> &Value {
        &self.room.volume
    }

    fn removal_rate(&self, time: f64) -> Value {
        self.ventilation.air_exchange(&self.room, time)
    }

    fn people_present(&self, time: f64) -> u32 {
        self.emitters.people_present(time)
    }

    fn first_presence_time(&self) -> Option<f64> {
        first_presence(&self.emitters)
    }

    fn transition_times(&self) -> Vec<f64> {
        union_times([
            self.emitters.occupancy.transition_times(),
            self.ventilation.transition_times(&self.room),
        ])
    }

    fn normalization_factor(&self) -> Value {
        &self.emitters.activity.exhalation_rate * (1e6 * EXHALED_CO2_FRACTION)
    }

    fn min_background_concentration(&self) -> Value {
        Value::from(ATMOSPHERIC_CO2)
    }

    fn cache(&self) -> &IntegratorCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::aerosol::{Expiration, Mask};
    use crate::domains::population::{Activity, Occupancy};
    use crate::domains::ventilation::AirChange;
    use crate::domains::virus::Virus;
    use crate::engine::interval::Interval;
    use crate::engine::piecewise::PiecewiseConstant;

    fn office_hours() -> Interval {
        Interval::specific(vec![(8.0, 12.0), (13.0, 17.0)])
    }

    fn model(ach: f64) -> ConcentrationModel {
        ConcentrationModel::new(
            Room::new(75.0),
            AirChange::new(Interval::specific(vec![(0.0, 24.0)]), ach).into(),
            InfectedPopulation::new(
                Population::new(
                    Occupancy::fixed(1, office_hours()),
                    Activity::seated(),
                    Mask::no_mask(),
                ),
                Virus::sars_cov_2(),
                Expiration::speaking(),
            ),
        )
    }

    #[test]
    fn test_state_change_times() {
        let model = model(1.0);
        assert_eq!(
            model.state_change_times(),
            &[0.0, 8.0, 12.0, 13.0, 17.0, 24.0]
        );
    }

    #[test]
    fn test_removal_rate_components() {
        let model = model(2.0);
        let rr = model.removal_rate(10.0).get(0);
        let expected = model.deposition_rate().get(0) + model.decay_rate(10.0).get(0) + 2.0;
        assert!((rr - expected).abs() < 1e-12);
        assert!(model.deposition_rate().get(0) > 0.0);
    }

    #[test]
    fn test_zero_before_presence() {
        let model = model(1.0);
        assert_eq!(model.concentration(7.0).unwrap(), Value::ZERO);
    }

    #[test]
    fn test_more_ventilation_lowers_concentration() {
        let low = model(0.5).concentration(11.0).unwrap().get(0);
        let high = model(5.0).concentration(11.0).unwrap().get(0);
        assert!(high < low);
        assert!(high > 0.0);
    }

    #[test]
    fn test_concentration_scales_with_emission() {
        let single = model(1.0);
        let double = single.with_infected(single.infected().with_number(2).unwrap());
        let c1 = single.concentration(10.0).unwrap().get(0);
        let c2 = double.concentration(10.0).unwrap().get(0);
        assert!((c2 / c1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_temperature_transitions_included() {
        let room = Room::new(75.0).with_inside_temp(
            PiecewiseConstant::new(
                vec![0.0, 10.5, 24.0],
                vec![Value::from(293.0), Value::from(298.0)],
            )
            .unwrap(),
        );
        let model = ConcentrationModel::new(
            room,
            model(1.0).ventilation().clone(),
            model(1.0).infected().clone(),
        );
        assert!(model.state_change_times().contains(&10.5));
    }

    #[test]
    fn test_co2_background_and_rise() {
        let co2 = Co2ConcentrationModel::new(
            Room::new(75.0),
            AirChange::new(Interval::specific(vec![(0.0, 24.0)]), 0.5).into(),
            Population::new(
                Occupancy::fixed(4, office_hours()),
                Activity::seated(),
                Mask::no_mask(),
            ),
        );
        let before = co2.concentration(7.0).unwrap().get(0);
        assert!((before - ATMOSPHERIC_CO2).abs() < 1e-9);
        let during = co2.concentration(11.0).unwrap().get(0);
        assert!(during > ATMOSPHERIC_CO2);
        // steady state: background + N·exh·fraction·1e6 / (ACH·V)
        let limit = ATMOSPHERIC_CO2 + 4.0 * 0.51 * EXHALED_CO2_FRACTION * 1e6 / (0.5 * 75.0);
        assert!(during < limit);
    }

    #[test]
    fn test_clone_is_equal() {
        let a = model(1.0);
        let _ = a.concentration(10.0).unwrap();
        assert_eq!(a.clone(), a);
    }
}
