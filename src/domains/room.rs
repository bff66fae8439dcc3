//! Room geometry and indoor climate.

use serde::{Deserialize, Serialize};

use crate::engine::piecewise::PiecewiseConstant;
use crate::engine::value::Value;

/// A well-mixed enclosed space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Volume (m³).
    pub volume: Value,
    /// Inside temperature (K) over the day.
    #[serde(default = "default_inside_temp")]
    pub inside_temp: PiecewiseConstant,
    /// Relative humidity as a fraction in [0, 1].
    #[serde(default = "default_humidity")]
    pub humidity: Value,
    /// Maximum occupancy, used to report ventilation per person.
    #[serde(default)]
    pub capacity: Option<u32>,
}

fn default_inside_temp() -> PiecewiseConstant {
    PiecewiseConstant::constant(293.0)
}

fn default_humidity() -> Value {
    Value::from(0.5)
}

impl Room {
    /// Room of `volume` m³ at 293 K and 50% relative humidity.
    #[must_use]
    pub fn new(volume: impl Into<Value>) -> Self {
        Self {
            volume: volume.into(),
            inside_temp: default_inside_temp(),
            humidity: default_humidity(),
            capacity: None,
        }
    }

    /// Replace the inside temperature profile.
    #[must_use]
    pub fn with_inside_temp(mut self, inside_temp: PiecewiseConstant) -> Self {
        self.inside_temp = inside_temp;
        self
    }

    /// Replace the relative humidity.
    #[must_use]
    pub fn with_humidity(mut self, humidity: impl Into<Value>) -> Self {
        self.humidity = humidity.into();
        self
    }

    /// Set the maximum occupancy.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let room = Room::new(75.0);
        assert_eq!(room.volume, Value::from(75.0));
        assert_eq!(room.inside_temp.value(12.0), &Value::from(293.0));
        assert_eq!(room.humidity, Value::from(0.5));
        assert!(room.capacity.is_none());
    }

    #[test]
    fn test_yaml_defaults() {
        let room: Room = serde_yaml::from_str("volume: 60.0\ncapacity: 4\n").unwrap();
        assert_eq!(room, Room::new(60.0).with_capacity(4));
    }
}
