//! Pre-built exposure scenarios.
//!
//! Provides ready-to-use scenario templates:
//! - Shared office with and without a portable HEPA filter

pub mod office;

pub use office::{OfficeConfig, OfficeOutcome, OfficeReport, OfficeScenario};
