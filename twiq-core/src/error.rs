//! Error type shared by every layer of the scheduler

use core::fmt;

use twiq_hal::{BusId, TransferError};

/// Broad category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorClass {
    /// Bus set up wrongly; fatal at startup
    Configuration,
    /// Transaction built with inconsistent parameters
    Construction,
    /// API used in the wrong state
    Usage,
    /// Peripheral refused or aborted a transfer
    Hardware,
}

/// Scheduler errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Own slave address(es) outside the range allowed by the addressing mode
    InvalidOwnAddress,
    /// Another bus already claimed this peripheral
    BusInUse(BusId),
    /// No such peripheral instance
    UnsupportedBus(u8),
    /// Interrupt route requested for a peripheral nobody claimed
    BusNotRegistered(BusId),
    /// Non-zero register address without a register width
    RegisterWithoutWidth,
    /// Register address does not fit the register width
    RegisterOutOfRange,
    /// Buffer longer than the peripheral's transfer counter
    BufferTooLong,
    /// Transaction sent without a device
    NoDevice,
    /// Device has no bus attached
    NotAttached,
    /// Device already attached to a bus
    AlreadyAttached,
    /// Bus queue at capacity
    QueueFull,
    /// Peripheral error
    Hardware(TransferError),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InvalidOwnAddress
            | Error::BusInUse(_)
            | Error::UnsupportedBus(_)
            | Error::BusNotRegistered(_) => ErrorClass::Configuration,
            Error::RegisterWithoutWidth | Error::RegisterOutOfRange | Error::BufferTooLong => {
                ErrorClass::Construction
            }
            Error::NoDevice | Error::NotAttached | Error::AlreadyAttached | Error::QueueFull => {
                ErrorClass::Usage
            }
            Error::Hardware(_) => ErrorClass::Hardware,
        }
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Error::Hardware(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidOwnAddress => f.write_str("the provided I2C addresses are not valid"),
            Error::BusInUse(id) => write!(f, "{} already in use", id),
            Error::UnsupportedBus(n) => write!(f, "no I2C peripheral {}", n),
            Error::BusNotRegistered(id) => write!(f, "{} not registered", id),
            Error::RegisterWithoutWidth => f.write_str("register configured without register width"),
            Error::RegisterOutOfRange => f.write_str("register does not fit register width"),
            Error::BufferTooLong => f.write_str("buffer exceeds 65535 bytes"),
            Error::NoDevice => f.write_str("transaction has no device"),
            Error::NotAttached => f.write_str("device not attached to a bus"),
            Error::AlreadyAttached => f.write_str("device already attached to a bus"),
            Error::QueueFull => f.write_str("transaction queue full"),
            Error::Hardware(e) => write!(f, "error setting up the transfer: {}", e),
        }
    }
}
