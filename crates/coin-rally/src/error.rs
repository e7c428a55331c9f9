//! Error types for the coin-rally crate.

use std::fmt;

use crate::physics::BodyHandle;

/// Result type for coin-rally operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a simulation.
///
/// Ticking never fails: degenerate raycasts count as "not grounded" and repeated
/// coin collection is a silent no-op. Only construction is fallible.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A configuration value is out of range.
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// A vehicle was described with the wrong number of wheels.
    WheelCount {
        /// Number of wheels a vehicle must have.
        expected: usize,
        /// Number of wheels supplied.
        actual: usize,
    },
    /// Two coins in a layout share the same id.
    DuplicateCoinId {
        /// The repeated id.
        id: u32,
    },
    /// A body handle does not refer to a body in the world.
    UnknownBody {
        /// The stale handle.
        handle: BodyHandle,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfig`].
    pub(crate) fn config(field: &'static str, detail: impl Into<String>) -> Self {
        Error::InvalidConfig {
            field,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig { field, detail } => {
                write!(f, "invalid configuration for {field}: {detail}")
            }
            Error::WheelCount { expected, actual } => {
                write!(f, "vehicle needs exactly {expected} wheels, got {actual}")
            }
            Error::DuplicateCoinId { id } => write!(f, "coin id {id} is used more than once"),
            Error::UnknownBody { handle } => write!(f, "no body for handle {handle}"),
        }
    }
}

impl std::error::Error for Error {}

/// Require a strictly positive, finite value.
pub(crate) fn require_positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::config(field, format!("must be positive, got {value}")))
    }
}

/// Require a finite value that is zero or greater.
pub(crate) fn require_non_negative(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(
            field,
            format!("must be zero or positive, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert!(require_positive("mass", 250.0).is_ok());
        assert!(matches!(
            require_positive("mass", 0.0),
            Err(Error::InvalidConfig { field: "mass", .. })
        ));
        assert!(require_positive("mass", f32::NAN).is_err());
        assert!(require_positive("mass", -1.0).is_err());
    }

    #[test]
    fn test_require_non_negative() {
        assert!(require_non_negative("threshold", 0.0).is_ok());
        assert!(require_non_negative("threshold", f32::INFINITY).is_err());
    }

    #[test]
    fn test_display() {
        let err = Error::WheelCount {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "vehicle needs exactly 4 wheels, got 3");
    }
}
