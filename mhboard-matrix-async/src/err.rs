//! Error and link-health types.
//!
//! Nothing in this crate panics on a bus failure. Every failed transaction
//! ends up as an [`ExpanderFault`] stored in the scanner's [`LinkHealth`].

use embassy_time::TimeoutError;
use embedded_hal_async::i2c::ErrorKind;

use crate::expander::ExpanderId;

/// Failure of a single addressed bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The transaction did not complete within the configured bus timeout.
    Timeout,
    /// The I2C peripheral reported an error (NACK, arbitration loss, ...).
    I2c(ErrorKind),
}

impl BusError {
    /// Converts a peripheral error into a `BusError`.
    pub fn from_i2c<E: embedded_hal_async::i2c::Error>(err: E) -> Self {
        Self::I2c(err.kind())
    }
}

impl From<TimeoutError> for BusError {
    fn from(_: TimeoutError) -> Self {
        Self::Timeout
    }
}

/// The step of an expander exchange that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    /// Writing the I/O direction registers.
    Direction,
    /// Writing the pull-up registers.
    PullUp,
    /// Selecting the GPIO register ahead of a read.
    SelectRegister,
    /// Reading back the GPIO register.
    ReadPort,
}

/// A failed exchange with one of the expanders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpanderFault {
    /// The chip that failed.
    pub expander: ExpanderId,
    /// What was being done when it failed.
    pub stage: FaultStage,
    /// The bus-level cause.
    pub error: BusError,
}

/// Status of the link to the expander half of the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkHealth {
    /// The last initialization and every read since succeeded.
    #[default]
    Healthy,
    /// The last initialization or read failed.
    Faulted(ExpanderFault),
}

impl LinkHealth {
    /// Returns `true` if remote reads may be attempted.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Returns the recorded fault, if any.
    pub fn fault(&self) -> Option<ExpanderFault> {
        match self {
            Self::Healthy => None,
            Self::Faulted(fault) => Some(*fault),
        }
    }
}
