//! Occupants of a room: who is there, when, and what they emit.

use serde::{Deserialize, Serialize};

use crate::domains::aerosol::{Expiration, Mask, Particle};
use crate::domains::virus::Virus;
use crate::engine::interval::Interval;
use crate::engine::piecewise::IntPiecewiseConstant;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Breathing rates for a physical activity level (m³/h).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Inhalation rate (m³/h).
    pub inhalation_rate: Value,
    /// Exhalation rate (m³/h).
    pub exhalation_rate: Value,
}

impl Activity {
    /// Activity with the given rates.
    #[must_use]
    pub fn new(inhalation_rate: impl Into<Value>, exhalation_rate: impl Into<Value>) -> Self {
        Self {
            inhalation_rate: inhalation_rate.into(),
            exhalation_rate: exhalation_rate.into(),
        }
    }

    /// Seated.
    #[must_use]
    pub fn seated() -> Self {
        Self::new(0.51, 0.51)
    }

    /// Standing.
    #[must_use]
    pub fn standing() -> Self {
        Self::new(0.57, 0.57)
    }

    /// Light activity.
    #[must_use]
    pub fn light_activity() -> Self {
        Self::new(1.25, 1.25)
    }

    /// Moderate activity.
    #[must_use]
    pub fn moderate_activity() -> Self {
        Self::new(1.78, 1.78)
    }

    /// Heavy exercise.
    #[must_use]
    pub fn heavy_exercise() -> Self {
        Self::new(3.30, 3.30)
    }
}

/// How many people are present over the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// A fixed headcount present during `presence`.
    Fixed {
        /// Headcount.
        number: u32,
        /// When they are present.
        presence: Interval,
    },
    /// Headcount varying over time; presence is read off the profile.
    Dynamic(IntPiecewiseConstant),
}

impl Occupancy {
    /// Fixed headcount present during `presence`.
    #[must_use]
    pub const fn fixed(number: u32, presence: Interval) -> Self {
        Self::Fixed { number, presence }
    }

    /// True for a time-varying headcount.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    /// Headcount of a fixed occupancy.
    #[must_use]
    pub const fn number(&self) -> Option<u32> {
        match self {
            Self::Fixed { number, .. } => Some(*number),
            Self::Dynamic(_) => None,
        }
    }

    /// When anyone is present.
    #[must_use]
    pub fn presence_interval(&self) -> Interval {
        match self {
            Self::Fixed { presence, .. } => presence.clone(),
            Self::Dynamic(profile) => Interval::Specific(profile.interval()),
        }
    }

    /// Times at which the headcount changes.
    #[must_use]
    pub fn transition_times(&self) -> Vec<f64> {
        match self {
            Self::Fixed { presence, .. } => presence.transition_times(),
            Self::Dynamic(profile) => profile.transition_times().to_vec(),
        }
    }

    /// Headcount at `time`.
    #[must_use]
    pub fn people_present(&self, time: f64) -> u32 {
        match self {
            Self::Fixed { number, presence } => {
                if presence.triggered(time) {
                    *number
                } else {
                    0
                }
            }
            Self::Dynamic(profile) => profile.value(time),
        }
    }
}

/// A group of people sharing activity, mask and immunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    /// Headcount over the day.
    pub occupancy: Occupancy,
    /// Physical activity.
    pub activity: Activity,
    /// Face covering.
    pub mask: Mask,
    /// Fraction of the population protected by prior immunity.
    #[serde(default)]
    pub host_immunity: Value,
}

impl Population {
    /// Population with no prior immunity.
    #[must_use]
    pub fn new(occupancy: Occupancy, activity: Activity, mask: Mask) -> Self {
        Self {
            occupancy,
            activity,
            mask,
            host_immunity: Value::ZERO,
        }
    }

    /// Replace the host immunity.
    #[must_use]
    pub fn with_host_immunity(mut self, host_immunity: impl Into<Value>) -> Self {
        self.host_immunity = host_immunity.into();
        self
    }

    /// Copy with a different fixed headcount.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` for a dynamic occupancy.
    pub fn with_number(&self, number: u32) -> SimResult<Self> {
        match &self.occupancy {
            Occupancy::Fixed { presence, .. } => Ok(Self {
                occupancy: Occupancy::fixed(number, presence.clone()),
                ..self.clone()
            }),
            Occupancy::Dynamic(_) => Err(SimError::not_computable(
                "population with a fixed headcount",
                "occupancy is dynamic",
            )),
        }
    }

    /// Headcount at `time`.
    #[must_use]
    pub fn people_present(&self, time: f64) -> u32 {
        self.occupancy.people_present(time)
    }

    /// When anyone is present.
    #[must_use]
    pub fn presence_interval(&self) -> Interval {
        self.occupancy.presence_interval()
    }
}

/// What an infected population emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionSource {
    /// Virus carried by exhaled aerosols of a given expiratory activity.
    Expiration(Expiration),
    /// A directly known emission rate (virions per hour per person).
    KnownRate(Value),
}

/// Infected occupants emitting virus into the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfectedPopulation {
    /// The people.
    pub population: Population,
    /// What they carry.
    pub virus: Virus,
    /// What they emit.
    pub source: EmissionSource,
}

impl InfectedPopulation {
    /// Infected population emitting through `expiration`.
    #[must_use]
    pub const fn new(population: Population, virus: Virus, expiration: Expiration) -> Self {
        Self {
            population,
            virus,
            source: EmissionSource::Expiration(expiration),
        }
    }

    /// Infected population with a directly known emission rate per person.
    #[must_use]
    pub fn emitting(population: Population, virus: Virus, known_rate: impl Into<Value>) -> Self {
        Self {
            population,
            virus,
            source: EmissionSource::KnownRate(known_rate.into()),
        }
    }

    /// Copy with a different fixed headcount.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` for a dynamic occupancy.
    pub fn with_number(&self, number: u32) -> SimResult<Self> {
        Ok(Self {
            population: self.population.with_number(number)?,
            ..self.clone()
        })
    }

    /// The expiratory activity, if emission goes through aerosols.
    #[must_use]
    pub const fn expiration(&self) -> Option<&Expiration> {
        match &self.source {
            EmissionSource::Expiration(expiration) => Some(expiration),
            EmissionSource::KnownRate(_) => None,
        }
    }

    /// The emitted particle; of unknown size for a known-rate source.
    #[must_use]
    pub fn particle(&self) -> Particle {
        self.expiration()
            .map_or_else(Particle::default, Expiration::particle)
    }

    /// Emitted aerosol volume per exhaled volume (mL/cm³).
    #[must_use]
    pub fn aerosols(&self) -> Value {
        match &self.source {
            EmissionSource::Expiration(expiration) => expiration.aerosols(&self.population.mask),
            EmissionSource::KnownRate(_) => Value::ONE,
        }
    }

    /// Virions emitted per hour per person per unit aerosol volume.
    #[must_use]
    pub fn emission_rate_per_aerosol_per_person_when_present(&self) -> Value {
        match &self.source {
            EmissionSource::Expiration(_) => {
                &self.virus.viral_load_in_sputum * &self.population.activity.exhalation_rate * 1e6
            }
            EmissionSource::KnownRate(rate) => rate.clone(),
        }
    }

    /// Virions emitted per hour per person present.
    #[must_use]
    pub fn emission_rate_per_person_when_present(&self) -> Value {
        self.emission_rate_per_aerosol_per_person_when_present() * self.aerosols()
    }

    /// Virions emitted per hour by everyone present at `time`.
    #[must_use]
    pub fn emission_rate(&self, time: f64) -> Value {
        self.emission_rate_per_person_when_present()
            * f64::from(self.population.people_present(time))
    }

    /// Fraction of emitted virions that are infectious.
    #[must_use]
    pub fn fraction_of_infectious_virus(&self) -> Value {
        &self.virus.viable_to_rna_ratio * (1.0 - &self.population.host_immunity)
    }
}

/// Community prevalence in the surrounding area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cases {
    /// Population of the area.
    pub geographic_population: u64,
    /// New reported cases per day in the area.
    pub geographic_cases: u64,
    /// Ratio of actual to reported cases.
    pub ascertainment_bias: f64,
}

impl Cases {
    /// Community prevalence data.
    #[must_use]
    pub const fn new(
        geographic_population: u64,
        geographic_cases: u64,
        ascertainment_bias: f64,
    ) -> Self {
        Self {
            geographic_population,
            geographic_cases,
            ascertainment_bias,
        }
    }

    /// True when there is no prevalence data to work with.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.geographic_population == 0 || self.geographic_cases == 0
    }

    /// Probability that a random member of the area is infectious, capped
    /// at 1.
    #[must_use]
    pub fn probability_random_individual(&self, virus: &Virus) -> f64 {
        if self.geographic_population == 0 {
            return 0.0;
        }
        let infectious = self.geographic_cases as f64
            * virus.infectiousness_days
            * self.ascertainment_bias;
        (infectious / self.geographic_population as f64).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office_hours() -> Interval {
        Interval::specific(vec![(8.0, 12.0), (13.0, 17.0)])
    }

    fn infected() -> InfectedPopulation {
        InfectedPopulation::new(
            Population::new(
                Occupancy::fixed(1, office_hours()),
                Activity::seated(),
                Mask::no_mask(),
            ),
            Virus::sars_cov_2(),
            Expiration::speaking(),
        )
    }

    #[test]
    fn test_fixed_occupancy() {
        let occupancy = Occupancy::fixed(3, office_hours());
        assert_eq!(occupancy.people_present(10.0), 3);
        assert_eq!(occupancy.people_present(12.5), 0);
        assert_eq!(occupancy.number(), Some(3));
        assert!(!occupancy.is_dynamic());
    }

    #[test]
    fn test_dynamic_occupancy() {
        let profile =
            IntPiecewiseConstant::new(vec![8.0, 12.0, 13.0, 17.0], vec![2, 0, 4]).unwrap();
        let occupancy = Occupancy::Dynamic(profile);
        assert_eq!(occupancy.people_present(9.0), 2);
        assert_eq!(occupancy.people_present(12.5), 0);
        assert_eq!(occupancy.people_present(18.0), 0);
        assert_eq!(
            occupancy.presence_interval().boundaries(),
            vec![(8.0, 12.0), (13.0, 17.0)]
        );
        assert_eq!(occupancy.transition_times(), vec![8.0, 12.0, 13.0, 17.0]);
        assert!(occupancy.number().is_none());
    }

    #[test]
    fn test_with_number_dynamic_not_computable() {
        let profile = IntPiecewiseConstant::new(vec![8.0, 17.0], vec![2]).unwrap();
        let population =
            Population::new(Occupancy::Dynamic(profile), Activity::seated(), Mask::no_mask());
        assert!(population.with_number(1).unwrap_err().is_not_computable());
    }

    #[test]
    fn test_emission_rate() {
        let infected = infected();
        let per_aerosol = infected.emission_rate_per_aerosol_per_person_when_present().get(0);
        assert!((per_aerosol - 1e9 * 0.51 * 1e6).abs() / per_aerosol < 1e-12);
        let per_person = infected.emission_rate_per_person_when_present();
        assert_eq!(infected.emission_rate(10.0), per_person);
        assert_eq!(infected.emission_rate(12.5), Value::ZERO);
        let three = infected.with_number(3).unwrap();
        assert!((three.emission_rate(10.0).get(0) - 3.0 * per_person.get(0)).abs() < 1.0);
    }

    #[test]
    fn test_known_rate_source() {
        let emitting = InfectedPopulation::emitting(
            infected().population,
            Virus::sars_cov_2(),
            970.0,
        );
        assert_eq!(emitting.aerosols(), Value::ONE);
        assert_eq!(emitting.emission_rate_per_person_when_present(), Value::from(970.0));
        assert!(emitting.particle().diameter.is_none());
    }

    #[test]
    fn test_fraction_of_infectious_virus() {
        let mut infected = infected();
        infected.population = infected.population.with_host_immunity(0.4);
        let f = infected.fraction_of_infectious_virus().get(0);
        assert!((f - 0.5 * 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_cases_probability() {
        let cases = Cases::new(100_000, 68, 5.0);
        let p = cases.probability_random_individual(&Virus::sars_cov_2());
        assert!((p - 68.0 * 14.0 * 5.0 / 100_000.0).abs() < 1e-12);
        let saturated = Cases::new(10, 10, 5.0);
        assert!((saturated.probability_random_individual(&Virus::sars_cov_2()) - 1.0).abs() < 1e-12);
        assert!(Cases::default().is_empty());
    }
}
