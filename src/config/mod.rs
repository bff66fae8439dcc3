//! Registry of default model coefficients, loadable from YAML.
//!
//! Implements Poka-Yoke (mistake-proofing) through:
//! - Type-safe tables of activities, masks, viruses and expirations
//! - Schema validation via serde and `validator`
//! - Runtime semantic validation of every coefficient
//!
//! Each entry uses [`Param`] leaves, so a registry can describe fixed
//! coefficients and the distributions sampled by Monte Carlo batches alike.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use validator::Validate;

use crate::domains::aerosol::{Expiration, Mask};
use crate::domains::batch::{BatchActivity, BatchExpiration, BatchMask, BatchVirus};
use crate::domains::concentration::DEFAULT_EVAPORATION_FACTOR;
use crate::domains::exposure::ExposureModel;
use crate::domains::monte_carlo::{Distribution, Param};
use crate::domains::optimization::OptimizerConfig;
use crate::domains::population::Activity;
use crate::domains::virus::Virus;
use crate::engine::rng::SimRng;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Default coefficients consumed by the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ModelDefaults {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Breathing rates per activity name.
    #[serde(default = "default_activities")]
    pub activities: BTreeMap<String, BatchActivity>,

    /// Filtration efficiencies per mask name.
    #[serde(default = "default_masks")]
    pub masks: BTreeMap<String, BatchMask>,

    /// Pathogen properties per variant name.
    #[serde(default = "default_viruses")]
    pub viruses: BTreeMap<String, BatchVirus>,

    /// Particle size and concentration per expiratory activity.
    #[serde(default = "default_expirations")]
    pub expirations: BTreeMap<String, BatchExpiration>,

    /// Engine settings.
    #[validate(nested)]
    #[serde(default)]
    pub engine: EngineSettings,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

fn fixed(value: &Value) -> Param {
    Param::Fixed(value.mean())
}

fn activity_entry(activity: &Activity) -> BatchActivity {
    BatchActivity {
        inhalation_rate: fixed(&activity.inhalation_rate),
        exhalation_rate: fixed(&activity.exhalation_rate),
    }
}

fn mask_entry(mask: &Mask) -> BatchMask {
    BatchMask {
        eta_inhale: fixed(&mask.eta_inhale),
        eta_exhale: mask.eta_exhale.as_ref().map(fixed),
        factor_exhale: mask.factor_exhale,
    }
}

fn virus_entry(virus: &Virus) -> BatchVirus {
    BatchVirus {
        viral_load_in_sputum: fixed(&virus.viral_load_in_sputum),
        infectious_dose: fixed(&virus.infectious_dose),
        viable_to_rna_ratio: fixed(&virus.viable_to_rna_ratio),
        transmissibility_factor: fixed(&virus.transmissibility_factor),
        infectiousness_days: virus.infectiousness_days,
    }
}

fn expiration_entry(expiration: &Expiration) -> BatchExpiration {
    BatchExpiration {
        diameter: fixed(&expiration.diameter),
        cn: fixed(&expiration.cn),
    }
}

fn activity_presets() -> [(&'static str, Activity); 5] {
    [
        ("seated", Activity::seated()),
        ("standing", Activity::standing()),
        ("light_activity", Activity::light_activity()),
        ("moderate_activity", Activity::moderate_activity()),
        ("heavy_exercise", Activity::heavy_exercise()),
    ]
}

fn mask_presets() -> [(&'static str, Mask); 4] {
    [
        ("no_mask", Mask::no_mask()),
        ("type_i", Mask::type_i()),
        ("ffp2", Mask::ffp2()),
        ("cloth", Mask::cloth()),
    ]
}

fn virus_presets() -> [(&'static str, Virus); 6] {
    [
        ("sars_cov_2", Virus::sars_cov_2()),
        ("alpha", Virus::alpha()),
        ("beta", Virus::beta()),
        ("gamma", Virus::gamma()),
        ("delta", Virus::delta()),
        ("omicron", Virus::omicron()),
    ]
}

fn expiration_presets() -> [(&'static str, Expiration); 4] {
    [
        ("breathing", Expiration::breathing()),
        ("speaking", Expiration::speaking()),
        ("shouting", Expiration::shouting()),
        ("singing", Expiration::singing()),
    ]
}

fn table<P, E>(
    presets: impl IntoIterator<Item = (&'static str, P)>,
    entry: impl Fn(&P) -> E,
) -> BTreeMap<String, E> {
    presets
        .into_iter()
        .map(|(name, preset)| (name.to_string(), entry(&preset)))
        .collect()
}

/// `(name, mu, sigma)` of the log-normal breathing rate (m³/h) per activity.
const BREATHING_RATES: [(&str, f64, f64); 5] = [
    ("seated", -0.687_212_172_336_230_3, 0.104_983_382_292_971_08),
    ("standing", -0.574_237_757_849_478_5, 0.093_731_624_113_982_23),
    ("light_activity", 0.213_802_427_856_254_22, 0.094_353_780_910_596_01),
    ("moderate_activity", 0.551_771_330_362_601, 0.189_461_635_713_813_7),
    ("heavy_exercise", 1.164_466_569_672_304_9, 0.217_445_547_686_575_65),
];

/// `log10` of the median sputum viral load (copies/mL).
const VIRAL_LOAD_LOG10_MEDIAN: f64 = 9.0;
/// Spread of the sputum viral load, in decades.
const VIRAL_LOAD_LOG10_SIGMA: f64 = 1.0;

/// Spread of `ln d` around each expiration's preset diameter.
const DIAMETER_LN_SIGMA: f64 = 0.3;

fn uniform(low: f64, high: f64) -> Param {
    Param::Sampled(Distribution::Uniform { low, high })
}

fn default_activities() -> BTreeMap<String, BatchActivity> {
    BREATHING_RATES
        .iter()
        .map(|&(name, mu, sigma)| {
            let rate = Param::Sampled(Distribution::LogNormal { mu, sigma });
            let entry = BatchActivity {
                inhalation_rate: rate.clone(),
                exhalation_rate: rate,
            };
            (name.to_string(), entry)
        })
        .collect()
}

fn default_masks() -> BTreeMap<String, BatchMask> {
    [
        ("no_mask", mask_entry(&Mask::no_mask())),
        (
            "type_i",
            BatchMask {
                eta_inhale: uniform(0.25, 0.80),
                ..mask_entry(&Mask::type_i())
            },
        ),
        (
            "ffp2",
            BatchMask {
                eta_inhale: uniform(0.83, 0.91),
                ..mask_entry(&Mask::ffp2())
            },
        ),
        (
            "cloth",
            BatchMask {
                eta_inhale: uniform(0.05, 0.40),
                eta_exhale: Some(uniform(0.20, 0.50)),
                ..mask_entry(&Mask::cloth())
            },
        ),
    ]
    .into_iter()
    .map(|(name, mask)| (name.to_string(), mask))
    .collect()
}

fn default_viruses() -> BTreeMap<String, BatchVirus> {
    table(virus_presets(), |virus| BatchVirus {
        viral_load_in_sputum: Param::Sampled(Distribution::LogNormal {
            mu: VIRAL_LOAD_LOG10_MEDIAN * std::f64::consts::LN_10,
            sigma: VIRAL_LOAD_LOG10_SIGMA * std::f64::consts::LN_10,
        }),
        infectious_dose: uniform(10.0, 100.0),
        viable_to_rna_ratio: uniform(0.01, 0.6),
        transmissibility_factor: fixed(&virus.transmissibility_factor),
        infectiousness_days: virus.infectiousness_days,
    })
}

fn default_expirations() -> BTreeMap<String, BatchExpiration> {
    table(expiration_presets(), |expiration| BatchExpiration {
        diameter: Param::Sampled(Distribution::LogNormal {
            mu: expiration.diameter.mean().ln(),
            sigma: DIAMETER_LN_SIGMA,
        }),
        cn: fixed(&expiration.cn),
    })
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            activities: default_activities(),
            masks: default_masks(),
            viruses: default_viruses(),
            expirations: default_expirations(),
            engine: EngineSettings::default(),
        }
    }
}

impl ModelDefaults {
    /// Registry of the preset point values: every coefficient is fixed, so
    /// batches of any size reduce to the deterministic model.
    #[must_use]
    pub fn point_estimates() -> Self {
        Self {
            activities: table(activity_presets(), activity_entry),
            masks: table(mask_presets(), mask_entry),
            viruses: table(virus_presets(), virus_entry),
            expirations: table(expiration_presets(), expiration_entry),
            ..Self::default()
        }
    }
}

fn lookup<'a, T>(table: &'a BTreeMap<String, T>, kind: &str, name: &str) -> SimResult<&'a T> {
    table.get(name).ok_or_else(|| {
        SimError::invalid_argument(format!(
            "unknown {kind} '{name}' (known: {})",
            table.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
        ))
    })
}

/// Check a coefficient: a fixed value must lie in `[min, max]`, a
/// distribution must be samplable.
fn check_param(location: &str, param: &Param, min: f64, max: f64) -> SimResult<()> {
    match param {
        Param::Fixed(value) => {
            if value.is_finite() && *value >= min && *value <= max {
                Ok(())
            } else {
                Err(SimError::config(format!(
                    "{location} = {value} is outside [{min}, {max}]"
                )))
            }
        }
        Param::Sampled(distribution) => distribution
            .sample(1, &mut SimRng::new(0))
            .map(|_| ())
            .map_err(|e| SimError::config(format!("{location}: {e}"))),
    }
}

impl ModelDefaults {
    /// Load a registry from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a registry from a YAML string. Omitted tables keep their
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> SimResult<Self> {
        let defaults: Self = serde_yaml::from_str(yaml)?;

        // Poka-Yoke: validate all constraints
        defaults.validate()?;

        // Additional semantic validation
        defaults.validate_semantic()?;

        Ok(defaults)
    }

    /// Validate every table entry.
    fn validate_semantic(&self) -> SimResult<()> {
        for (kind, empty) in [
            ("activities", self.activities.is_empty()),
            ("masks", self.masks.is_empty()),
            ("viruses", self.viruses.is_empty()),
            ("expirations", self.expirations.is_empty()),
        ] {
            if empty {
                return Err(SimError::config(format!("{kind} table must not be empty")));
            }
        }

        for (name, activity) in &self.activities {
            check_param(&format!("activities.{name}.inhalation_rate"), &activity.inhalation_rate, 0.0, f64::MAX)?;
            check_param(&format!("activities.{name}.exhalation_rate"), &activity.exhalation_rate, 0.0, f64::MAX)?;
        }
        for (name, mask) in &self.masks {
            check_param(&format!("masks.{name}.eta_inhale"), &mask.eta_inhale, 0.0, 1.0)?;
            if let Some(eta_exhale) = &mask.eta_exhale {
                check_param(&format!("masks.{name}.eta_exhale"), eta_exhale, 0.0, 1.0)?;
            }
            if !(mask.factor_exhale.is_finite() && mask.factor_exhale >= 0.0) {
                return Err(SimError::config(format!(
                    "masks.{name}.factor_exhale must be non-negative"
                )));
            }
        }
        for (name, virus) in &self.viruses {
            check_param(&format!("viruses.{name}.viral_load_in_sputum"), &virus.viral_load_in_sputum, 0.0, f64::MAX)?;
            check_param(&format!("viruses.{name}.infectious_dose"), &virus.infectious_dose, f64::MIN_POSITIVE, f64::MAX)?;
            check_param(&format!("viruses.{name}.viable_to_rna_ratio"), &virus.viable_to_rna_ratio, 0.0, 1.0)?;
            check_param(&format!("viruses.{name}.transmissibility_factor"), &virus.transmissibility_factor, f64::MIN_POSITIVE, f64::MAX)?;
            if !(virus.infectiousness_days.is_finite() && virus.infectiousness_days > 0.0) {
                return Err(SimError::config(format!(
                    "viruses.{name}.infectiousness_days must be positive"
                )));
            }
        }
        for (name, expiration) in &self.expirations {
            check_param(&format!("expirations.{name}.diameter"), &expiration.diameter, f64::MIN_POSITIVE, f64::MAX)?;
            check_param(&format!("expirations.{name}.cn"), &expiration.cn, 0.0, f64::MAX)?;
        }
        Ok(())
    }

    /// Breathing rates of `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown activity.
    pub fn activity(&self, name: &str) -> SimResult<&BatchActivity> {
        lookup(&self.activities, "activity", name)
    }

    /// Filtration efficiencies of `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown mask.
    pub fn mask(&self, name: &str) -> SimResult<&BatchMask> {
        lookup(&self.masks, "mask", name)
    }

    /// Properties of the virus variant `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown virus.
    pub fn virus(&self, name: &str) -> SimResult<&BatchVirus> {
        lookup(&self.viruses, "virus", name)
    }

    /// Particle size and concentration of the expiratory activity `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown expiration.
    pub fn expiration(&self, name: &str) -> SimResult<&BatchExpiration> {
        lookup(&self.expirations, "expiration", name)
    }

    /// A random generator seeded from the engine settings.
    #[must_use]
    pub fn rng(&self) -> SimRng {
        SimRng::new(self.engine.seed)
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EngineSettings {
    /// Fraction of the emitted diameter left after evaporation.
    #[validate(range(min = 0.000_001, max = 1.0))]
    #[serde(default = "default_evaporation_factor")]
    pub evaporation_factor: f64,

    /// Cap on co-infected people in the total probability rule.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_infected_considered")]
    pub max_infected_considered: u32,

    /// CO2 fit settings.
    #[validate(nested)]
    #[serde(default)]
    pub co2_fit: Co2FitSettings,

    /// Master seed for Monte Carlo batches.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

const fn default_evaporation_factor() -> f64 {
    DEFAULT_EVAPORATION_FACTOR
}

const fn default_max_infected_considered() -> u32 {
    ExposureModel::MAX_INFECTED_CONSIDERED
}

const fn default_seed() -> u64 {
    42
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            evaporation_factor: default_evaporation_factor(),
            max_infected_considered: default_max_infected_considered(),
            co2_fit: Co2FitSettings::default(),
            seed: default_seed(),
        }
    }
}

/// Tolerances of the CO2 ventilation fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Co2FitSettings {
    /// Line-search step tolerance.
    #[validate(range(min = 1e-15, max = 1.0))]
    pub xtol: f64,
    /// Relative objective tolerance.
    #[validate(range(min = 1e-15, max = 1.0))]
    pub ftol: f64,
    /// Iteration cap.
    #[validate(range(min = 1))]
    pub max_iterations: usize,
}

impl Default for Co2FitSettings {
    fn default() -> Self {
        let config = OptimizerConfig::default();
        Self {
            xtol: config.xtol,
            ftol: config.ftol,
            max_iterations: config.max_iterations,
        }
    }
}

impl Co2FitSettings {
    /// Optimizer configuration with these tolerances.
    #[must_use]
    pub fn optimizer_config(&self) -> OptimizerConfig {
        OptimizerConfig {
            xtol: self.xtol,
            ftol: self.ftol,
            max_iterations: self.max_iterations,
            ..OptimizerConfig::default()
        }
    }
}
