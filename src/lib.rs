//! # airsim
//!
//! Airborne transmission simulation engine.
//!
//! Estimates the probability of airborne infection in an enclosed space by
//! integrating the pathogen concentration of a well-mixed room in closed
//! form, adding close-range jet exposure, and converting the deposited dose
//! into an infection risk. Every model works unchanged on scalar inputs and
//! on Monte Carlo batches of sampled inputs.
//!
//! - Jidoka: integration stops on the first non-finite value
//! - Poka-Yoke: invalid schedules and configurations are rejected at
//!   construction
//! - Reproducibility: batches are drawn from seeded, partitioned PCG streams
//!
//! ## Example
//!
//! ```rust
//! use airsim::prelude::*;
//!
//! let office_hours = Interval::specific(vec![(8.0, 12.0), (13.0, 17.0)]);
//! let infected = InfectedPopulation::new(
//!     Population::new(Occupancy::fixed(1, office_hours.clone()), Activity::seated(), Mask::no_mask()),
//!     Virus::sars_cov_2(),
//!     Expiration::speaking(),
//! );
//! let model = ConcentrationModel::new(
//!     Room::new(75.0),
//!     AirChange::new(Interval::specific(vec![(0.0, 24.0)]), 1.0).into(),
//!     infected,
//! );
//! let exposure = ExposureModel::long_range(
//!     model,
//!     Population::new(Occupancy::fixed(3, office_hours), Activity::seated(), Mask::no_mask()),
//! )?;
//! let p = exposure.infection_probability()?;
//! assert!(p.get(0) > 0.0 && p.get(0) < 1.0);
//! # Ok::<(), airsim::SimError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suspicious_operation_groupings,  // False positive for variance = E[X²] - E[X]²
    clippy::suboptimal_flops,  // Closed-form expressions are kept as written
    clippy::imprecise_flops,   // Numerical code choices are intentional
    clippy::no_effect_underscore_binding,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,  // Many functions can't be const in stable Rust
    clippy::needless_range_loop,   // Sometimes range loops are clearer
    clippy::manual_midpoint,       // Manual midpoint is intentional in numerical code
)]

pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod scenarios;

/// Crate version captured at build time.
pub const VERSION: &str = match option_env!("AIRSIM_VERSION") {
    Some(version) => version,
    None => "unknown",
};

/// Git commit the crate was built from, empty outside a checkout.
pub const GIT_HASH: &str = match option_env!("AIRSIM_GIT_HASH") {
    Some(hash) => hash,
    None => "",
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ModelDefaults;
    pub use crate::domains::aerosol::{Expiration, Mask};
    pub use crate::domains::batch::BuildModel;
    pub use crate::domains::co2_fit::{Co2DataModel, Co2FitResult};
    pub use crate::domains::concentration::{Co2ConcentrationModel, ConcentrationModel};
    pub use crate::domains::exposure::ExposureModel;
    pub use crate::domains::monte_carlo::{Distribution, Param};
    pub use crate::domains::population::{Activity, Cases, InfectedPopulation, Occupancy, Population};
    pub use crate::domains::room::Room;
    pub use crate::domains::short_range::ShortRangeModel;
    pub use crate::domains::ventilation::{
        AirChange, AirExchange, CustomVentilation, HepaFilter, HvacMechanical, Ventilation,
        WindowOpening,
    };
    pub use crate::domains::virus::Virus;
    pub use crate::engine::integrator::ConcentrationModelBase;
    pub use crate::engine::interval::{Interval, SpecificInterval};
    pub use crate::engine::piecewise::{IntPiecewiseConstant, PiecewiseConstant};
    pub use crate::engine::rng::SimRng;
    pub use crate::engine::value::Value;
    pub use crate::error::{SimError, SimResult};
}

/// Re-export for public API
pub use error::{SimError, SimResult};
