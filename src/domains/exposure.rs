//! Exposure of a population to an infected one, and the resulting risk.
//!
//! The deposited dose combines the well-mixed (long-range) concentration
//! with any close-range interactions. When the particle diameter is sampled
//! (an array), diameter-dependent factors are averaged over the diameter
//! samples before being multiplied by the diameter-independent ones: this
//! is the Monte Carlo integration over the size distribution.

use tracing::{instrument, warn};

use crate::domains::concentration::ConcentrationModel;
use crate::domains::population::{Cases, InfectedPopulation, Population};
use crate::domains::short_range::ShortRangeModel;
use crate::engine::integrator::ConcentrationModelBase;
use crate::engine::interval::union_times;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Evaporation factor of particles reaching a close-range contact.
const SHORT_RANGE_EVAPORATION_FACTOR: f64 = 1.0;

/// Exposure of `exposed` to the infected population of a concentration
/// model, optionally with close-range interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureModel {
    concentration_model: ConcentrationModel,
    short_range: Vec<ShortRangeModel>,
    exposed: Population,
    geographical_data: Cases,
    exposed_to_short_range: u32,
}

fn has_array_diameter(infected: &InfectedPopulation) -> bool {
    infected
        .expiration()
        .is_some_and(|expiration| !expiration.diameter.is_scalar())
}

/// Overlap of `(start, stop)` with `[time1, time2]`, if any.
fn clip(start: f64, stop: f64, time1: f64, time2: f64) -> Option<(f64, f64)> {
    if stop < time1 || start > time2 {
        None
    } else {
        Some((start.max(time1), stop.min(time2)))
    }
}

/// Binomial probability of exactly `k` successes in `n` trials.
fn binomial_pmf(k: u32, n: u32, p: f64) -> f64 {
    if k > n {
        return 0.0;
    }
    if p <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    if p >= 1.0 {
        return if k == n { 1.0 } else { 0.0 };
    }
    let ln_choose: f64 = (0..k)
        .map(|i| (f64::from(n - i) / f64::from(i + 1)).ln())
        .sum();
    (ln_choose + f64::from(k) * p.ln() + f64::from(n - k) * (1.0 - p).ln()).exp()
}

impl ExposureModel {
    /// Default cap on the number of simultaneously infected people
    /// considered by [`Self::total_probability_rule`].
    pub const MAX_INFECTED_CONSIDERED: u32 = 10;

    /// Exposure model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the emitted particle diameter is
    /// sampled while the ventilation or the viral decay is also sampled: the
    /// averaging order over diameters would be ambiguous.
    pub fn new(
        concentration_model: ConcentrationModel,
        short_range: Vec<ShortRangeModel>,
        exposed: Population,
        geographical_data: Cases,
        exposed_to_short_range: u32,
    ) -> SimResult<Self> {
        if has_array_diameter(concentration_model.infected()) {
            let vectorised = concentration_model.state_change_times().iter().any(|&time| {
                !(concentration_model.decay_rate(time) + concentration_model.air_exchange(time))
                    .is_scalar()
            });
            if vectorised {
                warn!("rejecting exposure model with sampled diameter and sampled removal");
                return Err(SimError::invalid_configuration(
                    "if the diameter is an array, none of the ventilation parameters \
                     or virus decay constant can be arrays at the same time",
                ));
            }
        }
        Ok(Self {
            concentration_model,
            short_range,
            exposed,
            geographical_data,
            exposed_to_short_range,
        })
    }

    /// Long-range exposure only.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn long_range(concentration_model: ConcentrationModel, exposed: Population) -> SimResult<Self> {
        Self::new(concentration_model, Vec::new(), exposed, Cases::default(), 0)
    }

    /// The long-range concentration model.
    #[must_use]
    pub const fn concentration_model(&self) -> &ConcentrationModel {
        &self.concentration_model
    }

    /// Close-range interactions.
    #[must_use]
    pub fn short_range(&self) -> &[ShortRangeModel] {
        &self.short_range
    }

    /// The exposed population.
    #[must_use]
    pub const fn exposed(&self) -> &Population {
        &self.exposed
    }

    /// Community prevalence data.
    #[must_use]
    pub const fn geographical_data(&self) -> &Cases {
        &self.geographical_data
    }

    /// Number of exposed people taking part in the close-range interactions.
    #[must_use]
    pub const fn exposed_to_short_range(&self) -> u32 {
        self.exposed_to_short_range
    }

    /// Copy with a different number of infected people.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` if the infected occupancy is dynamic.
    pub fn with_infected_number(&self, number: u32) -> SimResult<Self> {
        let infected = self.concentration_model.infected().with_number(number)?;
        Ok(Self {
            concentration_model: self.concentration_model.with_infected(infected),
            ..self.clone()
        })
    }

    /// Copy without close-range interactions.
    #[must_use]
    pub fn without_short_range(&self) -> Self {
        Self {
            short_range: Vec::new(),
            exposed_to_short_range: 0,
            ..self.clone()
        }
    }

    fn ensure_fixed_occupancy(&self, quantity: &'static str) -> SimResult<()> {
        if self.exposed.occupancy.is_dynamic()
            || self.concentration_model.infected().population.occupancy.is_dynamic()
        {
            return Err(SimError::not_computable(quantity, "occupancy is dynamic"));
        }
        Ok(())
    }

    /// Concentration (virions/m³) at `time`: long-range plus every
    /// close-range contribution.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors.
    pub fn concentration(&self, time: f64) -> SimResult<Value> {
        let mut total = self.concentration_model.concentration(time)?;
        for interaction in &self.short_range {
            total += interaction.short_range_concentration(&self.concentration_model, time)?;
        }
        Ok(total)
    }

    /// Sorted union of `0` and the presence transitions of both
    /// populations. Consecutive pairs are the windows over which dose and
    /// risk are accumulated.
    #[must_use]
    pub fn population_state_change_times(&self) -> Vec<f64> {
        union_times([
            vec![0.0],
            self.concentration_model
                .infected()
                .population
                .presence_interval()
                .transition_times(),
            self.exposed.presence_interval().transition_times(),
        ])
    }

    /// Deposition fraction of long-range particles.
    #[must_use]
    pub fn long_range_fraction_deposited(&self) -> Value {
        self.concentration_model
            .infected()
            .particle()
            .fraction_deposited(self.concentration_model.evaporation_factor())
    }

    /// Normalized long-range concentration integrated over the exposed
    /// presence within `[time1, time2]`.
    fn long_range_normed_exposure_between_bounds(&self, time1: f64, time2: f64) -> SimResult<Value> {
        let mut exposure = Value::ZERO;
        for (start, stop) in self.exposed.presence_interval().boundaries() {
            if let Some((a, b)) = clip(start, stop, time1, time2) {
                exposure += self.concentration_model.normed_integrated_concentration(a, b)?;
            }
        }
        Ok(exposure)
    }

    /// Deposited long-range dose (infectious virions) within `[time1, time2]`.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors.
    pub fn long_range_deposited_exposure_between_bounds(
        &self,
        time1: f64,
        time2: f64,
    ) -> SimResult<Value> {
        let infected = self.concentration_model.infected();
        let diameter_dependent = self.long_range_normed_exposure_between_bounds(time1, time2)?
            * infected.aerosols()
            * self.long_range_fraction_deposited();
        let integrated = if has_array_diameter(infected) {
            diameter_dependent.mean_value()
        } else {
            diameter_dependent
        };
        Ok(integrated
            * infected.emission_rate_per_aerosol_per_person_when_present()
            * &self.exposed.activity.inhalation_rate
            * (1.0 - &self.exposed.mask.eta_inhale)
            * infected.fraction_of_infectious_virus())
    }

    /// Deposited close-range dose (infectious virions) within
    /// `[time1, time2]`.
    fn short_range_deposited_exposure_between_bounds(
        &self,
        time1: f64,
        time2: f64,
    ) -> SimResult<Value> {
        let mut deposited = Value::ZERO;
        for interaction in &self.short_range {
            let (start, stop) = interaction.extract_between_bounds(time1, time2)?;
            let jet = interaction.normed_jet_exposure_between_bounds(start, stop)?;
            let long_range = interaction.normed_interpolated_long_range_exposure_between_bounds(
                &self.concentration_model,
                start,
                stop,
            )?;
            let expiration = interaction.expiration();
            let fdep = expiration
                .particle()
                .fraction_deposited(SHORT_RANGE_EVAPORATION_FACTOR);
            let net = (jet - long_range) * fdep;
            let net = if expiration.diameter.is_scalar() {
                net
            } else {
                net.mean_value()
            };
            deposited += net * &interaction.activity().inhalation_rate / interaction.dilution_factor();
        }
        let infected = self.concentration_model.infected();
        Ok(deposited
            * &infected.virus.viral_load_in_sputum
            * (1.0 - &self.exposed.mask.eta_inhale)
            * infected.fraction_of_infectious_virus())
    }

    /// Deposited dose (infectious virions) within `[time1, time2]`.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors.
    pub fn deposited_exposure_between_bounds(&self, time1: f64, time2: f64) -> SimResult<Value> {
        Ok(self.short_range_deposited_exposure_between_bounds(time1, time2)?
            + self.long_range_deposited_exposure_between_bounds(time1, time2)?)
    }

    /// Deposited dose over each window between consecutive population
    /// state changes.
    fn deposited_exposure_list(&self) -> SimResult<Vec<Value>> {
        self.population_state_change_times()
            .windows(2)
            .map(|w| self.deposited_exposure_between_bounds(w[0], w[1]))
            .collect()
    }

    /// Deposited dose over the whole day.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors.
    pub fn deposited_exposure(&self) -> SimResult<Value> {
        Ok(self.deposited_exposure_list()?.into_iter().sum())
    }

    fn infection_probability_list(&self) -> SimResult<Vec<Value>> {
        let virus = &self.concentration_model.infected().virus;
        let scale = virus.id63() * &virus.transmissibility_factor;
        let susceptible = 1.0 - &self.exposed.host_immunity;
        Ok(self
            .deposited_exposure_list()?
            .into_iter()
            .map(|dose| 1.0 - (-(dose * &susceptible / &scale)).exp())
            .collect())
    }

    /// Probability (fraction in [0, 1]) that an exposed person gets infected.
    ///
    /// # Errors
    ///
    /// Propagates integrator errors.
    pub fn infection_probability(&self) -> SimResult<Value> {
        let escape: Value = self
            .infection_probability_list()?
            .into_iter()
            .map(|p| 1.0 - p)
            .product();
        Ok(1.0 - escape)
    }

    /// Expected number of new infections among the exposed.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` under dynamic occupancy.
    pub fn expected_new_cases(&self) -> SimResult<Value> {
        self.ensure_fixed_occupancy("expected_new_cases")?;
        let exposed = f64::from(self.exposed.occupancy.number().unwrap_or_default());
        if self.short_range.is_empty() {
            return Ok(self.infection_probability()? * exposed);
        }
        let short_range_exposed = f64::from(self.exposed_to_short_range);
        let long_range_only = self.without_short_range().infection_probability()?
            * (exposed - short_range_exposed);
        Ok(long_range_only + self.infection_probability()? * short_range_exposed)
    }

    /// Expected number of infections caused by a single infected person.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` under dynamic occupancy.
    pub fn reproduction_number(&self) -> SimResult<Value> {
        self.ensure_fixed_occupancy("reproduction_number")?;
        if self.concentration_model.infected().population.occupancy.number() == Some(1) {
            return self.expected_new_cases();
        }
        self.with_infected_number(1)?.expected_new_cases()
    }

    /// Probability that at least one exposed person gets infected, accounting
    /// for the chance that any attendee is infectious given the community
    /// prevalence. Capped at [`Self::MAX_INFECTED_CONSIDERED`] infected.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` under dynamic occupancy.
    pub fn total_probability_rule(&self) -> SimResult<f64> {
        self.total_probability_rule_with_cap(Self::MAX_INFECTED_CONSIDERED)
    }

    /// [`Self::total_probability_rule`] with an explicit cap on the number of
    /// simultaneously infected people considered.
    ///
    /// # Errors
    ///
    /// Returns `NotComputable` under dynamic occupancy.
    #[instrument(skip(self))]
    pub fn total_probability_rule_with_cap(&self, max_infected: u32) -> SimResult<f64> {
        self.ensure_fixed_occupancy("total_probability_rule")?;
        if self.geographical_data.is_empty() {
            return Ok(0.0);
        }
        let infected = self.concentration_model.infected();
        let total_people = infected.population.occupancy.number().unwrap_or_default()
            + self.exposed.occupancy.number().unwrap_or_default();
        let p_random = self
            .geographical_data
            .probability_random_individual(&infected.virus);

        let mut sum_probability = 0.0;
        for num_infected in 1..=total_people.min(max_infected) {
            let prob_ind = self
                .with_infected_number(num_infected)?
                .infection_probability()?
                .mean();
            let others = f64::from(total_people - num_infected);
            let at_least_one = 1.0 - (1.0 - prob_ind).powf(others);
            sum_probability += at_least_one * binomial_pmf(num_infected, total_people, p_random);
        }
        Ok(sum_probability)
    }
}
