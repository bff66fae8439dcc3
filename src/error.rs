//! Error types for airsim.
//!
//! All fallible operations return `Result<T, SimError>` instead of panicking.
//! Every failure is a deterministic function of the inputs; nothing inside the
//! engine retries.

use thiserror::Error;

/// Result type alias for airsim operations.
pub type SimResult<T> = Result<T, SimError>;

/// Unified error type for all airsim operations.
#[derive(Debug, Error)]
pub enum SimError {
    // ===== Construction Errors =====
    /// A value object was built from inconsistent arguments.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the offending argument.
        message: String,
    },

    /// A model combines inputs whose evaluation order is ambiguous.
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the conflicting inputs.
        message: String,
    },

    // ===== Evaluation Errors =====
    /// The requested quantity is not defined for this model.
    #[error("{quantity} is not computable: {reason}")]
    NotComputable {
        /// Name of the requested quantity.
        quantity: &'static str,
        /// Why it cannot be computed.
        reason: String,
    },

    /// A time query beyond the last known state change.
    #[error("Requested time {time} is beyond the last state change time {last}")]
    OutOfRange {
        /// Requested time (hours).
        time: f64,
        /// Last available state change time (hours).
        last: f64,
    },

    /// Numerical instability detected (NaN or Inf).
    #[error("Jidoka: non-finite value detected at {location}")]
    NonFiniteValue {
        /// Location where the non-finite value was detected.
        location: String,
    },

    /// Optimization error.
    #[error("Optimization error: {0}")]
    Optimization(String),

    /// Invalid distribution parameters.
    #[error("Distribution error: {0}")]
    Distribution(String),

    // ===== Configuration Errors =====
    /// Invalid configuration parameter.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Create an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    #[must_use]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a not-computable error for `quantity`.
    #[must_use]
    pub fn not_computable(quantity: &'static str, reason: impl Into<String>) -> Self {
        Self::NotComputable {
            quantity,
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an optimization error.
    #[must_use]
    pub fn optimization(message: impl Into<String>) -> Self {
        Self::Optimization(message.into())
    }

    /// Create a distribution error.
    #[must_use]
    pub fn distribution(message: impl Into<String>) -> Self {
        Self::Distribution(message.into())
    }

    /// Create a non-finite value error.
    #[must_use]
    pub fn non_finite(location: impl Into<String>) -> Self {
        Self::NonFiniteValue {
            location: location.into(),
        }
    }

    /// Check if this error was caused by the caller's inputs.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::InvalidConfiguration { .. }
        )
    }

    /// Check if this error reports an unsupported quantity.
    #[must_use]
    pub const fn is_not_computable(&self) -> bool {
        matches!(self, Self::NotComputable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_detection() {
        assert!(SimError::invalid_argument("bad").is_invalid_input());
        assert!(SimError::invalid_configuration("bad").is_invalid_input());
        assert!(!SimError::config("bad").is_invalid_input());
        assert!(!SimError::OutOfRange { time: 1.0, last: 0.5 }.is_invalid_input());
    }

    #[test]
    fn test_not_computable() {
        let err = SimError::not_computable("expected new cases", "dynamic occupancy");
        assert!(err.is_not_computable());
        assert!(!err.is_invalid_input());
        let msg = err.to_string();
        assert!(msg.contains("expected new cases"));
        assert!(msg.contains("dynamic occupancy"));
    }

    #[test]
    fn test_out_of_range_display() {
        let err = SimError::OutOfRange {
            time: 25.0,
            last: 24.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("25"));
        assert!(msg.contains("24"));
    }

    #[test]
    fn test_error_non_finite_display() {
        let err = SimError::non_finite("concentration at t=3");
        let msg = err.to_string();
        assert!(msg.contains("non-finite value"));
        assert!(msg.contains("t=3"));
    }

    #[test]
    fn test_error_optimization() {
        let err = SimError::optimization("convergence failed");
        let msg = err.to_string();
        assert!(msg.contains("Optimization error"));
        assert!(msg.contains("convergence failed"));
    }

    #[test]
    fn test_error_config() {
        let err = SimError::config("invalid parameter");
        let msg = err.to_string();
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("invalid parameter"));
    }

    #[test]
    fn test_error_debug() {
        let err = SimError::invalid_argument("test");
        let debug = format!("{err:?}");
        assert!(debug.contains("InvalidArgument"));
    }
}
