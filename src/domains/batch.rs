//! Batch (Monte Carlo) mirrors of the deterministic models.
//!
//! Each `Batch*` type has the shape of its deterministic counterpart with
//! [`Param`] leaves. [`BuildModel::build_model`] draws `size` samples for
//! every sampled leaf and returns the deterministic model with array-valued
//! fields; fixed leaves stay scalar and broadcast. All downstream
//! computations then run once for the whole batch.
//!
//! Composite models hand each component its own [`SimRng`] stream, so
//! changing how one component is sampled leaves the draws of the others
//! untouched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domains::aerosol::{Expiration, Mask};
use crate::domains::concentration::{ConcentrationModel, DEFAULT_EVAPORATION_FACTOR};
use crate::domains::exposure::ExposureModel;
use crate::domains::monte_carlo::Param;
use crate::domains::population::{Activity, Cases, InfectedPopulation, Occupancy, Population};
use crate::domains::room::Room;
use crate::domains::short_range::ShortRangeModel;
use crate::domains::ventilation::{
    AirChange, CustomVentilation, HepaFilter, HvacMechanical, Ventilation, WindowOpening,
};
use crate::domains::virus::Virus;
use crate::engine::interval::{Interval, SpecificInterval};
use crate::engine::piecewise::PiecewiseConstant;
use crate::engine::rng::SimRng;
use crate::engine::value::Value;
use crate::error::SimResult;

/// A model description that can be realized as a batch of `size`
/// scenarios.
pub trait BuildModel {
    /// The deterministic model produced.
    type Output;

    /// Sample every uncertain input `size` times.
    ///
    /// # Errors
    ///
    /// Returns `Distribution` for invalid distribution parameters and
    /// propagates construction errors of the output model.
    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Self::Output>;
}

impl<T: BuildModel> BuildModel for Vec<T> {
    type Output = Vec<T::Output>;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Self::Output> {
        self.iter().map(|item| item.build_model(size, rng)).collect()
    }
}

/// Batch [`PiecewiseConstant`]: one [`Param`] per segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPiecewise {
    /// Segment boundaries (h), strictly increasing.
    pub transition_times: Vec<f64>,
    /// Value on each segment.
    pub values: Vec<Param>,
}

impl BatchPiecewise {
    /// The same value over the whole day.
    #[must_use]
    pub fn constant(value: impl Into<Param>) -> Self {
        Self {
            transition_times: vec![0.0, 24.0],
            values: vec![value.into()],
        }
    }
}

impl BuildModel for BatchPiecewise {
    type Output = PiecewiseConstant;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<PiecewiseConstant> {
        let values = self
            .values
            .iter()
            .map(|value| value.sample(size, rng))
            .collect::<SimResult<Vec<_>>>()?;
        // Segments must agree on length: widen fixed ones next to sampled ones.
        let values = if values.iter().any(|value| !value.is_scalar()) {
            values
                .into_iter()
                .map(|value| {
                    if value.is_scalar() {
                        Value::array(vec![value.get(0); size])
                    } else {
                        value
                    }
                })
                .collect()
        } else {
            values
        };
        PiecewiseConstant::new(self.transition_times.clone(), values)
    }
}

/// Batch [`Room`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRoom {
    /// Volume (m³).
    pub volume: Param,
    /// Inside temperature (K) over the day.
    pub inside_temp: BatchPiecewise,
    /// Relative humidity (fraction).
    pub humidity: Param,
    /// Design occupancy.
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl BatchRoom {
    /// Room at 293 K and 50% humidity.
    #[must_use]
    pub fn new(volume: impl Into<Param>) -> Self {
        Self {
            volume: volume.into(),
            inside_temp: BatchPiecewise::constant(293.0),
            humidity: Param::Fixed(0.5),
            capacity: None,
        }
    }
}

impl BuildModel for BatchRoom {
    type Output = Room;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Room> {
        let mut room = Room::new(self.volume.sample(size, rng)?)
            .with_inside_temp(self.inside_temp.build_model(size, rng)?)
            .with_humidity(self.humidity.sample(size, rng)?);
        room.capacity = self.capacity;
        Ok(room)
    }
}

/// Batch [`Ventilation`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchVentilation {
    /// Air exchange (h⁻¹) while active.
    AirChange {
        /// When active.
        active: Interval,
        /// Air changes per hour.
        air_exch: Param,
    },
    /// Mechanical supply (m³/h) while active.
    HvacMechanical {
        /// When active.
        active: Interval,
        /// Flow rate.
        q_air_mech: Param,
    },
    /// Portable HEPA filter (m³/h) while active.
    HepaFilter {
        /// When active.
        active: Interval,
        /// Clean air delivery rate.
        q_air_mech: Param,
    },
    /// Natural ventilation through open windows.
    Window {
        /// When the windows are open.
        active: Interval,
        /// Outside temperature (K) over the day.
        outside_temp: BatchPiecewise,
        /// Window height (m).
        window_height: Param,
        /// Length of the opening (m).
        opening_length: Param,
        /// Number of identical windows.
        number_of_windows: u32,
        /// Sliding or hinged.
        kind: BatchWindowKind,
    },
    /// Air exchange (h⁻¹) given per segment of the day.
    Custom(BatchPiecewise),
    /// A source with no uncertain inputs.
    Fixed(Ventilation),
    /// Several sources acting together.
    Multiple(Vec<BatchVentilation>),
}

/// How a batch window opens.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchWindowKind {
    /// Sliding or side-hung window.
    Sliding,
    /// Top- or bottom-hung window of the given width (m).
    Hinged {
        /// Window width (m).
        window_width: Param,
    },
}

impl From<Ventilation> for BatchVentilation {
    fn from(ventilation: Ventilation) -> Self {
        Self::Fixed(ventilation)
    }
}

impl BuildModel for BatchVentilation {
    type Output = Ventilation;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Ventilation> {
        Ok(match self {
            Self::AirChange { active, air_exch } => {
                AirChange::new(active.clone(), air_exch.sample(size, rng)?).into()
            }
            Self::HvacMechanical { active, q_air_mech } => {
                HvacMechanical::new(active.clone(), q_air_mech.sample(size, rng)?).into()
            }
            Self::HepaFilter { active, q_air_mech } => {
                HepaFilter::new(active.clone(), q_air_mech.sample(size, rng)?).into()
            }
            Self::Window {
                active,
                outside_temp,
                window_height,
                opening_length,
                number_of_windows,
                kind,
            } => {
                let outside_temp = outside_temp.build_model(size, rng)?;
                let window_height = window_height.sample(size, rng)?;
                let opening_length = opening_length.sample(size, rng)?;
                match kind {
                    BatchWindowKind::Sliding => WindowOpening::sliding(
                        active.clone(),
                        outside_temp,
                        window_height,
                        opening_length,
                        *number_of_windows,
                    ),
                    BatchWindowKind::Hinged { window_width } => WindowOpening::hinged(
                        active.clone(),
                        outside_temp,
                        window_height,
                        opening_length,
                        *number_of_windows,
                        window_width.sample(size, rng)?,
                    )?,
                }
                .into()
            }
            Self::Custom(values) => CustomVentilation::new(values.build_model(size, rng)?).into(),
            Self::Fixed(ventilation) => ventilation.clone(),
            Self::Multiple(sources) => Ventilation::Multiple(sources.build_model(size, rng)?),
        })
    }
}

/// Batch [`Virus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchVirus {
    /// RNA copies per mL of sputum.
    pub viral_load_in_sputum: Param,
    /// Infectious dose (RNA copies).
    pub infectious_dose: Param,
    /// Ratio of viable virions to RNA copies.
    pub viable_to_rna_ratio: Param,
    /// Relative transmissibility.
    pub transmissibility_factor: Param,
    /// Days infectious.
    pub infectiousness_days: f64,
}

impl BuildModel for BatchVirus {
    type Output = Virus;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Virus> {
        Ok(Virus {
            viral_load_in_sputum: self.viral_load_in_sputum.sample(size, rng)?,
            infectious_dose: self.infectious_dose.sample(size, rng)?,
            viable_to_rna_ratio: self.viable_to_rna_ratio.sample(size, rng)?,
            transmissibility_factor: self.transmissibility_factor.sample(size, rng)?,
            infectiousness_days: self.infectiousness_days,
        })
    }
}

/// Batch [`Mask`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMask {
    /// Inhale filtration efficiency.
    pub eta_inhale: Param,
    /// Exhale filtration efficiency; diameter-derived when absent.
    #[serde(default)]
    pub eta_exhale: Option<Param>,
    /// Multiplier on the diameter-derived exhale efficiency.
    pub factor_exhale: f64,
}

impl BuildModel for BatchMask {
    type Output = Mask;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Mask> {
        let eta_exhale = match &self.eta_exhale {
            Some(param) => Some(param.sample(size, rng)?),
            None => None,
        };
        let mut mask = Mask::new(self.eta_inhale.sample(size, rng)?, eta_exhale);
        mask.factor_exhale = self.factor_exhale;
        Ok(mask)
    }
}

/// Batch [`Activity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchActivity {
    /// Inhalation rate (m³/h).
    pub inhalation_rate: Param,
    /// Exhalation rate (m³/h).
    pub exhalation_rate: Param,
}

impl BuildModel for BatchActivity {
    type Output = Activity;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Activity> {
        Ok(Activity::new(
            self.inhalation_rate.sample(size, rng)?,
            self.exhalation_rate.sample(size, rng)?,
        ))
    }
}

/// Batch [`Expiration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchExpiration {
    /// Particle diameter (µm).
    pub diameter: Param,
    /// Aerosol number concentration (cm⁻³).
    pub cn: Param,
}

impl BuildModel for BatchExpiration {
    type Output = Expiration;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Expiration> {
        Ok(Expiration::new(self.diameter.sample(size, rng)?).with_cn(self.cn.sample(size, rng)?))
    }
}

/// Batch [`Population`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPopulation {
    /// Headcount and presence.
    pub occupancy: Occupancy,
    /// Breathing rates.
    pub activity: BatchActivity,
    /// Face covering.
    pub mask: BatchMask,
    /// Fraction protected by prior immunity.
    pub host_immunity: Param,
}

impl BuildModel for BatchPopulation {
    type Output = Population;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<Population> {
        let [mut activity_rng, mut mask_rng, mut immunity_rng] = rng.streams();
        Ok(Population::new(
            self.occupancy.clone(),
            self.activity.build_model(size, &mut activity_rng)?,
            self.mask.build_model(size, &mut mask_rng)?,
        )
        .with_host_immunity(self.host_immunity.sample(size, &mut immunity_rng)?))
    }
}

/// Batch emission source of the infected population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEmissionSource {
    /// Emission through an expiratory activity.
    Expiration(BatchExpiration),
    /// Directly known emission rate (virions per hour per person).
    KnownRate(Param),
}

impl From<BatchExpiration> for BatchEmissionSource {
    fn from(expiration: BatchExpiration) -> Self {
        Self::Expiration(expiration)
    }
}

/// Batch [`InfectedPopulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInfectedPopulation {
    /// The infected people.
    pub population: BatchPopulation,
    /// Their virus.
    pub virus: BatchVirus,
    /// What they emit.
    pub source: BatchEmissionSource,
}

impl BuildModel for BatchInfectedPopulation {
    type Output = InfectedPopulation;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<InfectedPopulation> {
        let [mut population_rng, mut virus_rng, mut source_rng] = rng.streams();
        let population = self.population.build_model(size, &mut population_rng)?;
        let virus = self.virus.build_model(size, &mut virus_rng)?;
        Ok(match &self.source {
            BatchEmissionSource::Expiration(expiration) => InfectedPopulation::new(
                population,
                virus,
                expiration.build_model(size, &mut source_rng)?,
            ),
            BatchEmissionSource::KnownRate(rate) => {
                InfectedPopulation::emitting(population, virus, rate.sample(size, &mut source_rng)?)
            }
        })
    }
}

/// Batch [`ConcentrationModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConcentrationModel {
    /// The room.
    pub room: BatchRoom,
    /// The ventilation.
    pub ventilation: BatchVentilation,
    /// The emitters.
    pub infected: BatchInfectedPopulation,
    /// Evaporation factor of emitted particles.
    pub evaporation_factor: f64,
}

impl BatchConcentrationModel {
    /// Batch concentration model with the default evaporation factor.
    #[must_use]
    pub const fn new(
        room: BatchRoom,
        ventilation: BatchVentilation,
        infected: BatchInfectedPopulation,
    ) -> Self {
        Self {
            room,
            ventilation,
            infected,
            evaporation_factor: DEFAULT_EVAPORATION_FACTOR,
        }
    }
}

impl BuildModel for BatchConcentrationModel {
    type Output = ConcentrationModel;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<ConcentrationModel> {
        let [mut room_rng, mut ventilation_rng, mut infected_rng] = rng.streams();
        let model = ConcentrationModel::new(
            self.room.build_model(size, &mut room_rng)?,
            self.ventilation.build_model(size, &mut ventilation_rng)?,
            self.infected.build_model(size, &mut infected_rng)?,
        )
        .with_evaporation_factor(self.evaporation_factor);
        debug!(size, "built batch concentration model");
        Ok(model)
    }
}

/// Batch [`ShortRangeModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchShortRangeModel {
    /// Expiratory activity of the infected person.
    pub expiration: BatchExpiration,
    /// Breathing of the infected person.
    pub activity: BatchActivity,
    /// The single interaction interval.
    pub presence: SpecificInterval,
    /// Interpersonal distance (m).
    pub distance: Param,
}

impl BuildModel for BatchShortRangeModel {
    type Output = ShortRangeModel;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<ShortRangeModel> {
        let [mut expiration_rng, mut activity_rng, mut distance_rng] = rng.streams();
        ShortRangeModel::new(
            self.expiration.build_model(size, &mut expiration_rng)?,
            self.activity.build_model(size, &mut activity_rng)?,
            &self.presence,
            self.distance.sample(size, &mut distance_rng)?,
        )
    }
}

/// Batch [`ExposureModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchExposureModel {
    /// Long-range concentration.
    pub concentration_model: BatchConcentrationModel,
    /// Close-range interactions.
    pub short_range: Vec<BatchShortRangeModel>,
    /// The exposed population.
    pub exposed: BatchPopulation,
    /// Community prevalence.
    pub geographical_data: Cases,
    /// Number of exposed people taking part in the interactions.
    pub exposed_to_short_range: u32,
}

impl BuildModel for BatchExposureModel {
    type Output = ExposureModel;

    fn build_model(&self, size: usize, rng: &mut SimRng) -> SimResult<ExposureModel> {
        let [mut concentration_rng, mut short_range_rng, mut exposed_rng] = rng.streams();
        let model = ExposureModel::new(
            self.concentration_model.build_model(size, &mut concentration_rng)?,
            self.short_range.build_model(size, &mut short_range_rng)?,
            self.exposed.build_model(size, &mut exposed_rng)?,
            self.geographical_data,
            self.exposed_to_short_range,
        )?;
        debug!(
            size,
            short_range = self.short_range.len(),
            "built batch exposure model"
        );
        Ok(model)
    }
}
