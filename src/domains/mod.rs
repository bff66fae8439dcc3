//! Domain models of airborne transmission.
//!
//! - Room, ventilation and pathogen properties
//! - Aerosol physics, masks and expiratory activities
//! - Long-range (well-mixed) and short-range (jet) concentrations
//! - Dose and infection risk
//! - Ventilation inference from CO2 traces
//! - Monte Carlo batches of all of the above

pub mod aerosol;
pub mod batch;
pub mod co2_fit;
pub mod concentration;
pub mod exposure;
pub mod monte_carlo;
pub mod optimization;
pub mod population;
pub mod room;
pub mod short_range;
pub mod ventilation;
pub mod virus;

pub use aerosol::{Expiration, Mask, Particle};
pub use batch::{
    BatchActivity, BatchConcentrationModel, BatchEmissionSource, BatchExpiration,
    BatchExposureModel, BatchInfectedPopulation, BatchMask, BatchPiecewise, BatchPopulation,
    BatchRoom, BatchShortRangeModel, BatchVentilation, BatchVirus, BatchWindowKind, BuildModel,
};
pub use co2_fit::{Co2DataModel, Co2FitResult};
pub use concentration::{Co2ConcentrationModel, ConcentrationModel};
pub use exposure::ExposureModel;
pub use monte_carlo::{Distribution, Param};
pub use optimization::{OptimizationResult, OptimizerConfig, PowellOptimizer};
pub use population::{Activity, Cases, EmissionSource, InfectedPopulation, Occupancy, Population};
pub use room::Room;
pub use short_range::ShortRangeModel;
pub use ventilation::{
    AirChange, AirExchange, CustomVentilation, HepaFilter, HvacMechanical, Ventilation,
    WindowKind, WindowOpening,
};
pub use virus::Virus;
