//! Hardware abstraction layer traits.
//!
//! This module defines the interfaces drivers and board adaptors meet at:
//! an addressed I2C bus, a per-device connection bound to one address, and
//! the pin value/direction types shared by the sysfs pin handles. All calls
//! block until the kernel has completed the transfer.

pub mod gpio;
pub mod i2c;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

pub use gpio::{PinDirection, PinValue, Polarity};
pub use i2c::{BusConnection, Connection, Connector, I2c, SharedBus};

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// I/O error from the underlying device or sysfs file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Pin name not present in the board's pin table
    #[error("Not a valid pin: {0}")]
    UnknownPin(String),

    /// Pin exists but has no PWM channel
    #[error("Not a PWM pin: {0}")]
    NotPwmPin(String),

    /// Bus index outside the adaptor's bus table
    #[error("Bus number {bus} out of range (valid: 0..{count})")]
    BusOutOfRange { bus: usize, count: usize },

    /// One or more handles failed to release during teardown
    #[error("{0}")]
    Release(ReleaseErrors),
}

pub type Result<T> = std::result::Result<T, HwError>;

/// Failures collected while releasing handles.
///
/// Teardown keeps going after a failed release, so a single call can produce
/// several independent errors. Each is kept with the handle it came from,
/// in the order they happened.
#[derive(Debug, Default)]
pub struct ReleaseErrors(Vec<(String, HwError)>);

impl ReleaseErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: impl Into<String>, error: HwError) {
        self.0.push((handle.into(), error));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(handle, error)` pairs, e.g. `("gpio64", ..)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HwError)> {
        self.0.iter().map(|(handle, error)| (handle.as_str(), error))
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(HwError::Release(self))
        }
    }
}

impl fmt::Display for ReleaseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.0.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred during release:", self.0.len(), noun)?;
        for (handle, error) in &self.0 {
            write!(f, "\n\t* {}: {}", handle, error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn empty_release_errors_are_ok() {
        assert!(ReleaseErrors::new().into_result().is_ok());
    }

    #[test]
    fn release_errors_list_every_failure() {
        let mut errors = ReleaseErrors::new();
        errors.push(
            "gpio64",
            HwError::Io(io::Error::new(io::ErrorKind::Other, "permission denied")),
        );
        errors.push("i2c-1", HwError::InvalidParameter("second".into()));

        let err = errors.into_result().unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("2 errors occurred during release:"));
        assert!(text.contains("\n\t* gpio64: I/O error: permission denied"));
        assert!(text.contains("\n\t* i2c-1: Invalid parameter: second"));
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: HwError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        match err {
            HwError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
