//! Pathogen properties.

use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

use crate::engine::value::Value;

/// Upper bound on the airborne half-life (hours).
pub const MAX_HALF_LIFE: f64 = 6.43;

/// An airborne virus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Virus {
    /// RNA copies per mL of sputum.
    pub viral_load_in_sputum: Value,
    /// Infectious dose (RNA copies) for a 50% infection probability.
    pub infectious_dose: Value,
    /// Ratio of viable virions to RNA copies.
    pub viable_to_rna_ratio: Value,
    /// Relative transmissibility of the strain (1 for the wild type; lower
    /// is more transmissible).
    pub transmissibility_factor: Value,
    /// Days an infected person stays infectious.
    pub infectiousness_days: f64,
}

impl Virus {
    /// SARS-CoV-2 wild type.
    #[must_use]
    pub fn sars_cov_2() -> Self {
        Self {
            viral_load_in_sputum: Value::from(1e9),
            infectious_dose: Value::from(50.0),
            viable_to_rna_ratio: Value::from(0.5),
            transmissibility_factor: Value::from(1.0),
            infectiousness_days: 14.0,
        }
    }

    fn variant(transmissibility_factor: f64) -> Self {
        Self {
            transmissibility_factor: Value::from(transmissibility_factor),
            ..Self::sars_cov_2()
        }
    }

    /// SARS-CoV-2 Alpha (B.1.1.7).
    #[must_use]
    pub fn alpha() -> Self {
        Self::variant(0.78)
    }

    /// SARS-CoV-2 Beta (B.1.351).
    #[must_use]
    pub fn beta() -> Self {
        Self::variant(0.8)
    }

    /// SARS-CoV-2 Gamma (P.1).
    #[must_use]
    pub fn gamma() -> Self {
        Self::variant(0.72)
    }

    /// SARS-CoV-2 Delta (B.1.617.2).
    #[must_use]
    pub fn delta() -> Self {
        Self::variant(0.51)
    }

    /// SARS-CoV-2 Omicron (B.1.1.529).
    #[must_use]
    pub fn omicron() -> Self {
        Self::variant(0.2)
    }

    /// Infectious dose for a 63% infection probability.
    #[must_use]
    pub fn id63(&self) -> Value {
        &self.infectious_dose / LN_2
    }

    /// Airborne half-life (hours) at the given relative humidity and
    /// temperature (K).
    #[must_use]
    pub fn half_life(&self, humidity: &Value, inside_temp: &Value) -> Value {
        Value::zip_with(humidity, inside_temp, |rh, temp| {
            let celsius = temp - 273.15;
            let rate = 0.160_30 + 0.040_18 * ((celsius - 20.615) / 10.585)
                + 0.021_76 * ((rh * 100.0 - 45.235) / 28.665)
                - 0.143_69
                - 0.026_36 * (celsius - 20.615) / 10.585;
            let half_life = LN_2 / rate / 60.0;
            if half_life <= 0.0 {
                MAX_HALF_LIFE
            } else {
                half_life.min(MAX_HALF_LIFE)
            }
        })
    }

    /// Biological decay constant (h⁻¹).
    #[must_use]
    pub fn decay_constant(&self, humidity: &Value, inside_temp: &Value) -> Value {
        LN_2 / self.half_life(humidity, inside_temp)
    }
}
