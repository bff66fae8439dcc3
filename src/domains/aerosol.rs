//! Respiratory particles, expiratory activities and masks.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::engine::value::Value;

/// Settling velocity of a 2.5 µm particle (m/s).
const REFERENCE_SETTLING_VELOCITY: f64 = 1.88e-4;

/// Deposition fraction used when the particle size is unknown.
const DEFAULT_FRACTION_DEPOSITED: f64 = 0.6;

/// A respiratory particle, optionally of a known diameter (µm).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Diameter (µm) at emission.
    pub diameter: Option<Value>,
}

impl Particle {
    /// Particle of the given diameter.
    #[must_use]
    pub fn new(diameter: impl Into<Value>) -> Self {
        Self {
            diameter: Some(diameter.into()),
        }
    }

    /// Gravitational settling velocity (m/s) after evaporation shrinks the
    /// particle by `evaporation_factor`.
    #[must_use]
    pub fn settling_velocity(&self, evaporation_factor: f64) -> Value {
        self.diameter.as_ref().map_or(
            Value::from(REFERENCE_SETTLING_VELOCITY),
            |diameter| {
                diameter.map(|d| REFERENCE_SETTLING_VELOCITY * ((d * evaporation_factor) / 2.5).powi(2))
            },
        )
    }

    /// Fraction of inhaled particles deposited in the respiratory tract.
    #[must_use]
    pub fn fraction_deposited(&self, evaporation_factor: f64) -> Value {
        self.diameter.as_ref().map_or(
            Value::from(DEFAULT_FRACTION_DEPOSITED),
            |diameter| diameter.map(|d| deposition_curve(d * evaporation_factor)),
        )
    }
}

/// Inhalable fraction times total deposition for a particle of diameter `d` (µm).
fn deposition_curve(d: f64) -> f64 {
    let inhalable = 1.0 - 0.5 * (1.0 - 1.0 / (1.0 + 0.000_76 * d.powf(2.8)));
    inhalable
        * (0.0587
            + 0.911 / (1.0 + (4.77 + 1.485 * d.ln()).exp())
            + 0.943 / (1.0 + (0.508 - 2.58 * d.ln()).exp()))
}

/// Face covering worn by a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mask {
    /// Filtration efficiency on inhalation.
    pub eta_inhale: Value,
    /// Filtration efficiency on exhalation; derived from the particle
    /// diameter when unset.
    #[serde(default)]
    pub eta_exhale: Option<Value>,
    /// Multiplier on the diameter-derived exhale efficiency.
    #[serde(default = "default_factor_exhale")]
    pub factor_exhale: f64,
}

const fn default_factor_exhale() -> f64 {
    1.0
}

impl Mask {
    /// Mask with fixed efficiencies.
    #[must_use]
    pub fn new(eta_inhale: impl Into<Value>, eta_exhale: Option<Value>) -> Self {
        Self {
            eta_inhale: eta_inhale.into(),
            eta_exhale,
            factor_exhale: default_factor_exhale(),
        }
    }

    /// No face covering.
    #[must_use]
    pub fn no_mask() -> Self {
        Self::new(0.0, Some(Value::ZERO))
    }

    /// Surgical (Type I) mask.
    #[must_use]
    pub fn type_i() -> Self {
        Self::new(0.5, None)
    }

    /// FFP2 respirator.
    #[must_use]
    pub fn ffp2() -> Self {
        Self::new(0.865, None)
    }

    /// Cloth mask.
    #[must_use]
    pub fn cloth() -> Self {
        Self::new(0.225, Some(Value::from(0.35)))
    }

    /// Exhale filtration efficiency for particles of the given diameter (µm).
    #[must_use]
    pub fn exhale_efficiency(&self, diameter: &Value) -> Value {
        match &self.eta_exhale {
            Some(eta) => eta.clone(),
            None => diameter.map(|d| exhale_curve(d) * self.factor_exhale),
        }
    }
}

fn exhale_curve(d: f64) -> f64 {
    if d <= 0.5 {
        0.0
    } else if d < 0.946_14 {
        0.5893 * d + 0.1546
    } else if d < 3.0 {
        0.0509 * d + 0.664
    } else {
        0.8167
    }
}

/// An expiratory activity: a particle size and the aerosol concentration it
/// produces in exhaled air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expiration {
    /// Particle diameter (µm); an array when sampled from a size distribution.
    pub diameter: Value,
    /// Total aerosol number concentration (cm⁻³).
    #[serde(default = "default_cn")]
    pub cn: Value,
}

fn default_cn() -> Value {
    Value::ONE
}

impl Expiration {
    /// Expiration with the given diameter and unit aerosol concentration.
    #[must_use]
    pub fn new(diameter: impl Into<Value>) -> Self {
        Self {
            diameter: diameter.into(),
            cn: default_cn(),
        }
    }

    /// Set the aerosol number concentration.
    #[must_use]
    pub fn with_cn(mut self, cn: impl Into<Value>) -> Self {
        self.cn = cn.into();
        self
    }

    /// Breathing.
    #[must_use]
    pub fn breathing() -> Self {
        Self::new(1.3844)
    }

    /// Speaking.
    #[must_use]
    pub fn speaking() -> Self {
        Self::new(5.8925)
    }

    /// Shouting.
    #[must_use]
    pub fn shouting() -> Self {
        Self::new(10.0411)
    }

    /// Singing.
    #[must_use]
    pub fn singing() -> Self {
        Self::new(10.0411)
    }

    /// The emitted particle.
    #[must_use]
    pub fn particle(&self) -> Particle {
        Particle::new(self.diameter.clone())
    }

    fn volume_per_particle(&self) -> Value {
        self.diameter.map(|d| PI * d.powi(3) / 6.0)
    }

    /// Emitted aerosol volume per exhaled volume (mL/cm³) after exhale
    /// filtration by `mask`.
    #[must_use]
    pub fn aerosols(&self, mask: &Mask) -> Value {
        let transmitted = 1.0 - mask.exhale_efficiency(&self.diameter);
        &self.cn * self.volume_per_particle() * transmitted * 1e-12
    }

    /// Aerosol volume concentration at the mouth (mL/m³), before any mask.
    #[must_use]
    pub fn jet_origin_concentration(&self) -> Value {
        &self.cn * self.volume_per_particle() * 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settling_velocity() {
        assert_eq!(Particle::default().settling_velocity(0.3), Value::from(1.88e-4));
        // 2.5 µm after evaporation: reference velocity
        let vg = Particle::new(2.5 / 0.3).settling_velocity(0.3).get(0);
        assert!((vg - 1.88e-4).abs() < 1e-15);
    }

    #[test]
    fn test_fraction_deposited_range() {
        assert_eq!(Particle::default().fraction_deposited(0.3), Value::from(0.6));
        for d in [0.5, 1.0, 5.0, 10.0, 50.0] {
            let f = Particle::new(d).fraction_deposited(0.3).get(0);
            assert!(f > 0.0 && f < 1.0, "fdep({d}) = {f}");
        }
    }

    #[test]
    fn test_exhale_curve_pieces() {
        let mask = Mask::type_i();
        let eta = mask.exhale_efficiency(&Value::array(vec![0.4, 0.8, 2.0, 5.0]));
        assert!((eta.get(0) - 0.0).abs() < 1e-12);
        assert!((eta.get(1) - (0.5893 * 0.8 + 0.1546)).abs() < 1e-12);
        assert!((eta.get(2) - (0.0509 * 2.0 + 0.664)).abs() < 1e-12);
        assert!((eta.get(3) - 0.8167).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_exhale_efficiency() {
        let eta = Mask::cloth().exhale_efficiency(&Value::from(5.0));
        assert_eq!(eta, Value::from(0.35));
        assert_eq!(Mask::no_mask().exhale_efficiency(&Value::from(5.0)), Value::ZERO);
    }

    #[test]
    fn test_aerosols_mask_reduces_emission() {
        let speaking = Expiration::speaking();
        let bare = speaking.aerosols(&Mask::no_mask()).get(0);
        let masked = speaking.aerosols(&Mask::type_i()).get(0);
        assert!(masked < bare);
        assert!((masked / bare - (1.0 - 0.8167)).abs() < 1e-12);
    }

    #[test]
    fn test_jet_origin_vs_aerosols_units() {
        let breathing = Expiration::breathing();
        let ratio = breathing.jet_origin_concentration().get(0)
            / breathing.aerosols(&Mask::no_mask()).get(0);
        assert!((ratio - 1e6).abs() / 1e6 < 1e-12);
    }

    #[test]
    fn test_expiration_yaml() {
        let e: Expiration = serde_yaml::from_str("diameter: 5.8925\n").unwrap();
        assert_eq!(e, Expiration::speaking());
    }
}
