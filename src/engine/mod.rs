//! Core numerical engine.
//!
//! Provides the pieces every model is built from:
//! - A scalar-or-batch numeric type with broadcasting arithmetic
//! - Presence intervals and piecewise-constant schedules
//! - The closed-form concentration integrator with its per-instance cache
//! - Deterministic RNG (PCG with partitioned seeds)
//! - Jidoka guards that stop on non-finite values

pub mod integrator;
pub mod interval;
pub mod jidoka;
pub mod memo;
pub mod piecewise;
pub mod rng;
pub mod value;

pub use integrator::{ConcentrationModelBase, IntegratorCache};
pub use interval::{Interval, PeriodicInterval, SpecificInterval};
pub use jidoka::JidokaViolation;
pub use piecewise::{IntPiecewiseConstant, PiecewiseConstant};
pub use rng::SimRng;
pub use value::{SampleSummary, Value};
