//! Shared office scenario.
//!
//! A small office with natural ventilation, one infected colleague and a
//! handful of exposed ones, present over a working day with a lunch break.
//! The scenario is evaluated with and without a portable HEPA filter so the
//! two alternatives can be compared.

use serde::{Deserialize, Serialize};

use crate::config::ModelDefaults;
use crate::domains::batch::{
    BatchConcentrationModel, BatchExposureModel, BatchInfectedPopulation, BatchPopulation,
    BatchRoom, BatchVentilation, BuildModel,
};
use crate::domains::exposure::ExposureModel;
use crate::domains::monte_carlo::Param;
use crate::domains::population::{Cases, Occupancy};
use crate::engine::interval::Interval;
use crate::engine::rng::SimRng;
use crate::engine::value::SampleSummary;
use crate::error::SimResult;

/// Configuration of the office scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeConfig {
    /// Room volume (m³).
    pub room_volume: f64,
    /// Natural air changes per hour, all day.
    pub air_changes_per_hour: f64,
    /// Clean air delivery rate of the HEPA alternative (m³/h).
    pub hepa_flow_rate: f64,
    /// Infected colleagues.
    pub infected: u32,
    /// Exposed colleagues.
    pub exposed: u32,
    /// Presence `(start, end)` pairs, in hours.
    pub presence: Vec<(f64, f64)>,
    /// Registry name of the activity.
    pub activity: String,
    /// Registry name of the mask worn by everyone.
    pub mask: String,
    /// Registry name of the virus variant.
    pub virus: String,
    /// Registry name of the infected person's expiratory activity.
    pub expiration: String,
    /// Community prevalence, for the total probability rule.
    #[serde(default)]
    pub geographical_data: Cases,
}

impl Default for OfficeConfig {
    fn default() -> Self {
        Self {
            room_volume: 75.0,
            air_changes_per_hour: 0.25,
            hepa_flow_rate: 250.0,
            infected: 1,
            exposed: 3,
            presence: vec![(8.5, 12.5), (13.5, 17.5)],
            activity: "seated".to_string(),
            mask: "no_mask".to_string(),
            virus: "sars_cov_2".to_string(),
            expiration: "speaking".to_string(),
            geographical_data: Cases::default(),
        }
    }
}

impl OfficeConfig {
    /// Everyone wears an FFP2 respirator.
    #[must_use]
    pub fn masked() -> Self {
        Self {
            mask: "ffp2".to_string(),
            ..Default::default()
        }
    }

    /// Mechanically ventilated office (3 air changes per hour).
    #[must_use]
    pub fn ventilated() -> Self {
        Self {
            air_changes_per_hour: 3.0,
            ..Default::default()
        }
    }
}

/// Outcome of one alternative, summarized over the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeOutcome {
    /// Probability that an exposed colleague is infected.
    pub infection_probability: SampleSummary,
    /// Expected new cases among the exposed.
    pub expected_new_cases: SampleSummary,
    /// Infections caused by one infected colleague.
    pub reproduction_number: SampleSummary,
    /// Probability of at least one infection given community prevalence;
    /// `None` without prevalence data.
    pub total_probability: Option<f64>,
}

/// Both alternatives of the office scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeReport {
    /// Natural ventilation only.
    pub without_hepa: OfficeOutcome,
    /// Natural ventilation plus the HEPA filter.
    pub with_hepa: OfficeOutcome,
}

/// Shared office exposure scenario.
#[derive(Debug, Clone)]
pub struct OfficeScenario {
    config: OfficeConfig,
    defaults: ModelDefaults,
}

impl OfficeScenario {
    /// Scenario drawing coefficients from `defaults`.
    #[must_use]
    pub const fn new(config: OfficeConfig, defaults: ModelDefaults) -> Self {
        Self { config, defaults }
    }

    /// Scenario with the built-in registry.
    #[must_use]
    pub fn with_config(config: OfficeConfig) -> Self {
        Self::new(config, ModelDefaults::default())
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &OfficeConfig {
        &self.config
    }

    fn population(&self, number: u32) -> SimResult<BatchPopulation> {
        Ok(BatchPopulation {
            occupancy: Occupancy::fixed(number, Interval::specific(self.config.presence.clone())),
            activity: self.defaults.activity(&self.config.activity)?.clone(),
            mask: self.defaults.mask(&self.config.mask)?.clone(),
            host_immunity: Param::Fixed(0.0),
        })
    }

    /// Batch description of one alternative.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a registry name is unknown.
    pub fn batch_model(&self, with_hepa: bool) -> SimResult<BatchExposureModel> {
        let all_day = Interval::specific(vec![(0.0, 24.0)]);
        let natural = BatchVentilation::AirChange {
            active: all_day,
            air_exch: Param::Fixed(self.config.air_changes_per_hour),
        };
        let ventilation = if with_hepa {
            BatchVentilation::Multiple(vec![
                natural,
                BatchVentilation::HepaFilter {
                    active: Interval::specific(self.config.presence.clone()),
                    q_air_mech: Param::Fixed(self.config.hepa_flow_rate),
                },
            ])
        } else {
            natural
        };

        let mut room = BatchRoom::new(self.config.room_volume);
        room.capacity = Some(self.config.infected + self.config.exposed);

        let mut concentration_model = BatchConcentrationModel::new(
            room,
            ventilation,
            BatchInfectedPopulation {
                population: self.population(self.config.infected)?,
                virus: self.defaults.virus(&self.config.virus)?.clone(),
                source: self.defaults.expiration(&self.config.expiration)?.clone().into(),
            },
        );
        concentration_model.evaporation_factor = self.defaults.engine.evaporation_factor;

        Ok(BatchExposureModel {
            concentration_model,
            short_range: Vec::new(),
            exposed: self.population(self.config.exposed)?,
            geographical_data: self.config.geographical_data,
            exposed_to_short_range: 0,
        })
    }

    /// One alternative realized as a batch of `size` scenarios.
    ///
    /// # Errors
    ///
    /// See [`Self::batch_model`] and [`BuildModel::build_model`].
    pub fn exposure_model(&self, with_hepa: bool, size: usize, rng: &mut SimRng) -> SimResult<ExposureModel> {
        self.batch_model(with_hepa)?.build_model(size, rng)
    }

    fn outcome(&self, model: &ExposureModel) -> SimResult<OfficeOutcome> {
        let total_probability = if self.config.geographical_data.is_empty() {
            None
        } else {
            Some(model.total_probability_rule_with_cap(self.defaults.engine.max_infected_considered)?)
        };
        Ok(OfficeOutcome {
            infection_probability: model.infection_probability()?.summary(),
            expected_new_cases: model.expected_new_cases()?.summary(),
            reproduction_number: model.reproduction_number()?.summary(),
            total_probability,
        })
    }

    /// Evaluate both alternatives on `size` sampled scenarios each.
    ///
    /// Both alternatives are drawn from the registry's seed, so sample `i`
    /// of each shares every uncertain input and differs only by the filter.
    ///
    /// # Errors
    ///
    /// Propagates registry, sampling and integration errors.
    pub fn run(&self, size: usize) -> SimResult<OfficeReport> {
        let without_hepa = self.exposure_model(false, size, &mut self.defaults.rng())?;
        let with_hepa = self.exposure_model(true, size, &mut self.defaults.rng())?;
        Ok(OfficeReport {
            without_hepa: self.outcome(&without_hepa)?,
            with_hepa: self.outcome(&with_hepa)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_scenario(config: OfficeConfig) -> OfficeScenario {
        OfficeScenario::new(config, ModelDefaults::point_estimates())
    }

    #[test]
    fn test_hepa_lowers_risk() {
        let report = point_scenario(OfficeConfig::default()).run(1).unwrap();
        let without = report.without_hepa.infection_probability.estimate;
        let with = report.with_hepa.infection_probability.estimate;
        assert!(without > 0.0);
        assert!(with < without);
        assert!(report.without_hepa.total_probability.is_none());
    }

    #[test]
    fn test_mask_and_ventilation_lower_risk() {
        let baseline = point_scenario(OfficeConfig::default()).run(1).unwrap();
        let masked = point_scenario(OfficeConfig::masked()).run(1).unwrap();
        let ventilated = point_scenario(OfficeConfig::ventilated()).run(1).unwrap();
        let p = |r: &OfficeReport| r.without_hepa.infection_probability.estimate;
        assert!(p(&masked) < p(&baseline));
        assert!(p(&ventilated) < p(&baseline));
    }

    #[test]
    fn test_expected_cases_scale_with_exposed() {
        let report = point_scenario(OfficeConfig::default()).run(1).unwrap();
        let outcome = &report.without_hepa;
        let expected = outcome.infection_probability.estimate * 3.0;
        assert!((outcome.expected_new_cases.estimate - expected).abs() < 1e-12);
        assert!((outcome.reproduction_number.estimate - expected).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_registry_name() {
        let config = OfficeConfig {
            mask: "snorkel".to_string(),
            ..Default::default()
        };
        let err = OfficeScenario::with_config(config).run(1).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_hepa_ventilation_structure() {
        let scenario = OfficeScenario::with_config(OfficeConfig::default());
        let model = scenario.exposure_model(true, 1, &mut SimRng::new(0)).unwrap();
        let ach = model.concentration_model().air_exchange(10.0).get(0);
        assert!((ach - (0.25 + 250.0 / 75.0)).abs() < 1e-12);
        let ach_night = model.concentration_model().air_exchange(20.0).get(0);
        assert!((ach_night - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_total_probability_with_prevalence() {
        let config = OfficeConfig {
            geographical_data: Cases::new(100_000, 500, 5.0),
            ..Default::default()
        };
        let report = point_scenario(config).run(1).unwrap();
        let total = report.without_hepa.total_probability.unwrap();
        assert!(total > 0.0 && total < 1.0);
    }

    #[test]
    fn test_default_registry_yields_distribution() {
        let scenario = OfficeScenario::with_config(OfficeConfig::default());
        let model = scenario.exposure_model(false, 200, &mut SimRng::new(3)).unwrap();
        assert_eq!(model.infection_probability().unwrap().len(), Some(200));

        let report = scenario.run(200).unwrap();
        for outcome in [&report.without_hepa, &report.with_hepa] {
            assert_eq!(outcome.infection_probability.samples, 200);
            assert!(outcome.infection_probability.std_error > 0.0);
        }
    }

    #[test]
    fn test_alternatives_share_samples() {
        let scenario = OfficeScenario::with_config(OfficeConfig::default());
        let without = scenario
            .exposure_model(false, 50, &mut scenario.defaults.rng())
            .unwrap()
            .infection_probability()
            .unwrap();
        let with = scenario
            .exposure_model(true, 50, &mut scenario.defaults.rng())
            .unwrap()
            .infection_probability()
            .unwrap();
        // same draws, more removal: never a higher risk
        assert!(without.zip_with(&with, |w, h| w - h).all(|d| d >= 0.0));
        assert!(with.mean() < without.mean());
    }
}
