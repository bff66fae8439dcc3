//! Ventilation sources and their composition.
//!
//! Every source reports an air exchange rate (h⁻¹) for a given room and
//! time, plus the times at which that rate may change. Sources combine by
//! summation through [`Ventilation::Multiple`].

use crate::domains::room::Room;
use crate::engine::interval::{union_times, Interval};
use crate::engine::piecewise::PiecewiseConstant;
use crate::engine::value::Value;
use crate::error::{SimError, SimResult};

/// Standard gravity (m/s²).
const GRAVITY: f64 = 9.81;

/// Smallest inside/outside temperature difference used by window openings (K).
pub const DEFAULT_MIN_DELTA_T: f64 = 0.1;

/// Discharge coefficient of a sliding window.
const SLIDING_DISCHARGE_COEFFICIENT: f64 = 0.6;

/// Capability shared by every ventilation source.
pub trait AirExchange {
    /// Times (hours) at which the air exchange may change.
    fn transition_times(&self, room: &Room) -> Vec<f64>;

    /// Air exchange rate (h⁻¹) at `time`.
    fn air_exchange(&self, room: &Room, time: f64) -> Value;
}

/// Fixed air changes per hour while active.
#[derive(Debug, Clone, PartialEq)]
pub struct AirChange {
    /// When the source operates.
    pub active: Interval,
    /// Air changes per hour.
    pub air_exch: Value,
}

impl AirChange {
    /// Create an air change source.
    #[must_use]
    pub fn new(active: Interval, air_exch: impl Into<Value>) -> Self {
        Self {
            active,
            air_exch: air_exch.into(),
        }
    }
}

impl AirExchange for AirChange {
    fn transition_times(&self, _room: &Room) -> Vec<f64> {
        self.active.transition_times()
    }

    fn air_exchange(&self, _room: &Room, time: f64) -> Value {
        if self.active.triggered(time) {
            self.air_exch.clone()
        } else {
            Value::ZERO
        }
    }
}

/// Mechanical ventilation with a fixed flow rate (m³/h).
#[derive(Debug, Clone, PartialEq)]
pub struct HvacMechanical {
    /// When the system operates.
    pub active: Interval,
    /// Flow rate (m³/h).
    pub q_air_mech: Value,
}

impl HvacMechanical {
    /// Create a mechanical ventilation source.
    #[must_use]
    pub fn new(active: Interval, q_air_mech: impl Into<Value>) -> Self {
        Self {
            active,
            q_air_mech: q_air_mech.into(),
        }
    }
}

impl AirExchange for HvacMechanical {
    fn transition_times(&self, _room: &Room) -> Vec<f64> {
        self.active.transition_times()
    }

    fn air_exchange(&self, room: &Room, time: f64) -> Value {
        if self.active.triggered(time) {
            &self.q_air_mech / &room.volume
        } else {
            Value::ZERO
        }
    }
}

/// Portable HEPA filter with a fixed clean-air flow rate (m³/h).
#[derive(Debug, Clone, PartialEq)]
pub struct HepaFilter {
    /// When the filter runs.
    pub active: Interval,
    /// Clean-air delivery rate (m³/h).
    pub q_air_mech: Value,
}

impl HepaFilter {
    /// Create a HEPA filter source.
    #[must_use]
    pub fn new(active: Interval, q_air_mech: impl Into<Value>) -> Self {
        Self {
            active,
            q_air_mech: q_air_mech.into(),
        }
    }
}

impl AirExchange for HepaFilter {
    fn transition_times(&self, _room: &Room) -> Vec<f64> {
        self.active.transition_times()
    }

    fn air_exchange(&self, room: &Room, time: f64) -> Value {
        if self.active.triggered(time) {
            &self.q_air_mech / &room.volume
        } else {
            Value::ZERO
        }
    }
}

/// How a window opens.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowKind {
    /// Sliding or side-hung window.
    Sliding,
    /// Top- or bottom-hung window of a given width (m).
    Hinged {
        /// Window width (m).
        window_width: Value,
    },
}

/// Natural ventilation through open windows, driven by the temperature
/// difference between inside and outside.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOpening {
    active: Interval,
    outside_temp: PiecewiseConstant,
    window_height: Value,
    opening_length: Value,
    number_of_windows: u32,
    min_delta_t: f64,
    kind: WindowKind,
}

impl WindowOpening {
    /// Sliding window.
    #[must_use]
    pub fn sliding(
        active: Interval,
        outside_temp: PiecewiseConstant,
        window_height: impl Into<Value>,
        opening_length: impl Into<Value>,
        number_of_windows: u32,
    ) -> Self {
        Self {
            active,
            outside_temp,
            window_height: window_height.into(),
            opening_length: opening_length.into(),
            number_of_windows,
            min_delta_t: DEFAULT_MIN_DELTA_T,
            kind: WindowKind::Sliding,
        }
    }

    /// Hinged window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any sample of `window_width` is not
    /// strictly positive.
    pub fn hinged(
        active: Interval,
        outside_temp: PiecewiseConstant,
        window_height: impl Into<Value>,
        opening_length: impl Into<Value>,
        number_of_windows: u32,
        window_width: impl Into<Value>,
    ) -> SimResult<Self> {
        let window_width = window_width.into();
        if !window_width.all(|w| w > 0.0) {
            return Err(SimError::invalid_argument(
                "window_width must be set and positive for a hinged window",
            ));
        }
        Ok(Self {
            kind: WindowKind::Hinged { window_width },
            ..Self::sliding(
                active,
                outside_temp,
                window_height,
                opening_length,
                number_of_windows,
            )
        })
    }

    /// Override the minimum inside/outside temperature difference (K).
    #[must_use]
    pub const fn with_min_delta_t(mut self, min_delta_t: f64) -> Self {
        self.min_delta_t = min_delta_t;
        self
    }

    /// When the window is open.
    #[must_use]
    pub const fn active(&self) -> &Interval {
        &self.active
    }

    /// Outside temperature profile (K).
    #[must_use]
    pub const fn outside_temp(&self) -> &PiecewiseConstant {
        &self.outside_temp
    }

    /// Window kind.
    #[must_use]
    pub const fn kind(&self) -> &WindowKind {
        &self.kind
    }

    /// Discharge coefficient of the opening.
    #[must_use]
    pub fn discharge_coefficient(&self) -> Value {
        match &self.kind {
            WindowKind::Sliding => Value::from(SLIDING_DISCHARGE_COEFFICIENT),
            WindowKind::Hinged { window_width } => Value::zip_all(
                &[window_width, &self.window_height, &self.opening_length],
                |row| hinged_discharge_coefficient(row[0], row[1], row[2]),
            ),
        }
    }
}

/// Empirical discharge coefficient of a hinged window of the given width,
/// height and opening length.
fn hinged_discharge_coefficient(width: f64, height: f64, opening_length: f64) -> f64 {
    let ratio = width / height;
    let (m, cd_max) = if ratio < 0.5 {
        (0.06, 0.612)
    } else if ratio < 1.0 {
        (0.048, 0.589)
    } else if ratio < 2.0 {
        (0.04, 0.563)
    } else {
        (0.039, 0.548)
    };
    let window_angle = 2.0 * (opening_length / (2.0 * height)).asin().to_degrees();
    cd_max * (1.0 - (-m * window_angle).exp())
}

impl AirExchange for WindowOpening {
    fn transition_times(&self, room: &Room) -> Vec<f64> {
        union_times([
            self.active.transition_times(),
            room.inside_temp.transition_times().to_vec(),
            self.outside_temp.transition_times().to_vec(),
        ])
    }

    fn air_exchange(&self, room: &Room, time: f64) -> Value {
        if !self.active.triggered(time) {
            return Value::ZERO;
        }
        let outside = self.outside_temp.value(time);
        let inside = room.inside_temp.value(time).max(&(outside + self.min_delta_t));
        let temp_gradient = (&inside - outside) / outside;
        let root = (&self.window_height * GRAVITY * temp_gradient).sqrt();
        let area = &self.window_height * &self.opening_length * f64::from(self.number_of_windows);
        let prefactor = 3600.0 / (3.0 * &room.volume);
        prefactor * self.discharge_coefficient() * area * root
    }
}

/// Air exchange given directly as a function of time.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomVentilation {
    /// Air exchange rate (h⁻¹) over the day.
    pub ventilation_value: PiecewiseConstant,
}

impl CustomVentilation {
    /// Create a custom ventilation source.
    #[must_use]
    pub const fn new(ventilation_value: PiecewiseConstant) -> Self {
        Self { ventilation_value }
    }
}

impl AirExchange for CustomVentilation {
    fn transition_times(&self, _room: &Room) -> Vec<f64> {
        self.ventilation_value.transition_times().to_vec()
    }

    fn air_exchange(&self, _room: &Room, time: f64) -> Value {
        self.ventilation_value.value(time).clone()
    }
}

/// Any ventilation source.
#[derive(Debug, Clone, PartialEq)]
pub enum Ventilation {
    /// Fixed air changes per hour.
    AirChange(AirChange),
    /// Mechanical ventilation.
    HvacMechanical(HvacMechanical),
    /// HEPA filtration.
    HepaFilter(HepaFilter),
    /// Natural ventilation through windows.
    Window(WindowOpening),
    /// Explicit air exchange profile.
    Custom(CustomVentilation),
    /// Several sources acting together.
    Multiple(Vec<Ventilation>),
}

impl Ventilation {
    /// Combine several sources; their air exchange rates add up.
    #[must_use]
    pub fn multiple(ventilations: impl IntoIterator<Item = Self>) -> Self {
        Self::Multiple(ventilations.into_iter().collect())
    }
}

impl AirExchange for Ventilation {
    fn transition_times(&self, room: &Room) -> Vec<f64> {
        match self {
            Self::AirChange(v) => v.transition_times(room),
            Self::HvacMechanical(v) => v.transition_times(room),
            Self::HepaFilter(v) => v.transition_times(room),
            Self::Window(v) => v.transition_times(room),
            Self::Custom(v) => v.transition_times(room),
            Self::Multiple(children) => {
                union_times(children.iter().map(|child| child.transition_times(room)))
            }
        }
    }

    fn air_exchange(&self, room: &Room, time: f64) -> Value {
        match self {
            Self::AirChange(v) => v.air_exchange(room, time),
            Self::HvacMechanical(v) => v.air_exchange(room, time),
            Self::HepaFilter(v) => v.air_exchange(room, time),
            Self::Window(v) => v.air_exchange(room, time),
            Self::Custom(v) => v.air_exchange(room, time),
            Self::Multiple(children) => children
                .iter()
                .map(|child| child.air_exchange(room, time))
                .sum(),
        }
    }
}

macro_rules! impl_from_source {
    ($($source:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Ventilation {
                fn from(source: $source) -> Self {
                    Self::$variant(source)
                }
            }
        )*
    };
}

impl_from_source!(
    AirChange => AirChange,
    HvacMechanical => HvacMechanical,
    HepaFilter => HepaFilter,
    WindowOpening => Window,
    CustomVentilation => Custom,
);
