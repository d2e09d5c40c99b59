//! I2C transfer abstractions
//!
//! Provides the interrupt-driven transfer primitives a chip-specific HAL
//! implements for each physical I2C peripheral, plus the configuration
//! and addressing types they share with the scheduler.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of physical I2C peripherals a scheduler can manage
pub const BUS_COUNT: usize = 3;

/// Standard/fast mode boundary in Hz (inclusive upper bound of standard mode)
pub const STANDARD_MODE_MAX_HZ: u32 = 100_000;

/// Physical I2C peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BusId {
    I2c1,
    I2c2,
    I2c3,
}

impl BusId {
    /// Every supported instance, in table order
    pub const ALL: [BusId; BUS_COUNT] = [BusId::I2c1, BusId::I2c2, BusId::I2c3];

    /// Zero-based slot index
    pub const fn index(self) -> usize {
        match self {
            BusId::I2c1 => 0,
            BusId::I2c2 => 1,
            BusId::I2c3 => 2,
        }
    }

    /// Peripheral number as printed in the reference manual (1-based)
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

impl TryFrom<u8> for BusId {
    /// The rejected instance number
    type Error = u8;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(BusId::I2c1),
            2 => Ok(BusId::I2c2),
            3 => Ok(BusId::I2c3),
            other => Err(other),
        }
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I2C{}", self.number())
    }
}

/// Transfer direction, from the master's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master receives from the target
    Read,
    /// Master transmits to the target
    Write,
}

/// Width of the device-internal register address sent before the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterWidth {
    /// Plain transfer, no register address phase
    #[default]
    None,
    /// One register address byte
    Bits8,
    /// Two register address bytes, MSB first
    Bits16,
}

impl RegisterWidth {
    /// Number of address bytes on the wire
    pub const fn bytes(self) -> u8 {
        match self {
            RegisterWidth::None => 0,
            RegisterWidth::Bits8 => 1,
            RegisterWidth::Bits16 => 2,
        }
    }

    /// Largest register address this width can carry
    pub const fn max_register(self) -> u16 {
        match self {
            RegisterWidth::None => 0,
            RegisterWidth::Bits8 => 0xFF,
            RegisterWidth::Bits16 => 0xFFFF,
        }
    }
}

/// Register address phase of a memory read/write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MemoryAddress {
    /// Register inside the target device
    pub register: u16,
    /// Width of `register` on the wire (never [`RegisterWidth::None`])
    pub width: RegisterWidth,
}

/// Bus addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Addressing {
    #[default]
    SevenBit,
    TenBit,
}

impl Addressing {
    /// Address as loaded into the peripheral's address register
    ///
    /// 7-bit addresses are shifted left to leave room for the R/W bit;
    /// 10-bit addresses are passed through for the header sequence.
    pub const fn wire_address(self, address: u16) -> u16 {
        match self {
            Addressing::SevenBit => address << 1,
            Addressing::TenBit => address,
        }
    }
}

/// Fast mode SCL duty cycle (ignored in standard mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DutyCycle {
    /// t_low / t_high = 2
    #[default]
    Ratio2,
    /// t_low / t_high = 16/9
    Ratio16To9,
}

/// Peripheral configuration applied once when a bus is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// SCL frequency in Hz
    pub frequency: u32,
    /// Addressing mode
    pub addressing: Addressing,
    /// Fast mode duty cycle
    pub duty_cycle: DutyCycle,
    /// Answer the general call address (slave only)
    pub general_call: bool,
    /// Allow clock stretching (slave only)
    pub clock_stretching: bool,
    /// Respond to `own_address2` as well (slave only)
    pub dual_address: bool,
    /// Primary own address (slave only)
    pub own_address1: u16,
    /// Secondary own address (slave dual-address mode only)
    pub own_address2: u16,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Master-only configuration at the given frequency
    pub const fn master(frequency: u32) -> Self {
        Self {
            frequency,
            addressing: Addressing::SevenBit,
            duty_cycle: DutyCycle::Ratio2,
            general_call: false,
            clock_stretching: false,
            dual_address: false,
            own_address1: 0,
            own_address2: 0,
        }
    }

    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self::master(100_000);

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self::master(400_000);

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self::master(1_000_000);

    /// Whether the frequency requires fast mode timing
    pub const fn fast_mode(&self) -> bool {
        self.frequency > STANDARD_MODE_MAX_HZ
    }
}

/// Caller-owned data buffer of a transfer
#[derive(Debug, PartialEq, Eq)]
pub enum TransferBuffer<'t> {
    /// Filled by the engine
    Read(&'t mut [u8]),
    /// Sent by the engine
    Write(&'t [u8]),
}

impl TransferBuffer<'_> {
    /// Direction implied by the buffer kind
    pub fn direction(&self) -> Direction {
        match self {
            TransferBuffer::Read(_) => Direction::Read,
            TransferBuffer::Write(_) => Direction::Write,
        }
    }

    /// Bytes in the data phase
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current buffer contents
    pub fn as_slice(&self) -> &[u8] {
        match self {
            TransferBuffer::Read(buf) => &buf[..],
            TransferBuffer::Write(buf) => &buf[..],
        }
    }

    /// Shorter-lived view of the same buffer
    pub fn reborrow(&mut self) -> TransferBuffer<'_> {
        match self {
            TransferBuffer::Read(buf) => TransferBuffer::Read(&mut buf[..]),
            TransferBuffer::Write(buf) => TransferBuffer::Write(&buf[..]),
        }
    }
}

/// One transfer as seen by the engine
#[derive(Debug, PartialEq, Eq)]
pub struct Transfer<'t> {
    /// Address already shifted for the addressing mode
    pub wire_address: u16,
    /// Register address phase, if any
    pub memory: Option<MemoryAddress>,
    /// Data phase
    pub buffer: TransferBuffer<'t>,
}

impl Transfer<'_> {
    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Interrupt line of a peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptKind {
    /// Event interrupt (address sent, byte transferred, stop detected)
    Event,
    /// Error interrupt (NACK, arbitration lost, bus error, overrun)
    Error,
}

/// Error from I2C transfer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError {
    /// Misplaced start/stop condition
    Bus,
    /// Arbitration lost
    ArbitrationLost,
    /// NACK received
    Nack,
    /// Timeout
    Timeout,
    /// Overrun/underrun
    Overrun,
    /// Peripheral not ready to accept a transfer
    Busy,
    /// Other error
    Other,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TransferError::Bus => "bus error",
            TransferError::ArbitrationLost => "arbitration lost",
            TransferError::Nack => "not acknowledged",
            TransferError::Timeout => "timeout",
            TransferError::Overrun => "overrun",
            TransferError::Busy => "peripheral busy",
            TransferError::Other => "transfer error",
        };
        f.write_str(msg)
    }
}

/// Outcome of servicing an interrupt for the in-flight transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Progress {
    /// Transfer still running
    Pending,
    /// Transfer finished successfully
    Complete,
    /// Hardware aborted the transfer
    Failed(TransferError),
}

/// Interrupt-driven I2C master transfer engine
///
/// One instance drives one physical peripheral. The scheduler owns the
/// engine and calls it with interrupts for that peripheral masked, so
/// implementations never need their own locking.
pub trait TransferEngine {
    /// Apply the peripheral configuration
    ///
    /// Called once when the owning bus is created.
    fn configure(&mut self, config: &I2cConfig) -> Result<(), TransferError>;

    /// Whether the peripheral can accept a new transfer
    fn is_idle(&self) -> bool;

    /// Begin a transfer
    ///
    /// Returns as soon as the first phase is armed; progress is reported
    /// through [`TransferEngine::service`].
    fn start(&mut self, transfer: &mut Transfer<'_>) -> Result<(), TransferError>;

    /// Handle a peripheral interrupt for the in-flight transfer
    ///
    /// Called from interrupt context with the same transfer that was passed
    /// to [`TransferEngine::start`]; read data is written into its buffer.
    fn service(&mut self, interrupt: InterruptKind, transfer: &mut Transfer<'_>) -> Progress;

    /// Handle a peripheral interrupt with no transfer in flight
    fn acknowledge(&mut self, _interrupt: InterruptKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_id_numbers() {
        for (i, id) in BusId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(BusId::try_from(id.number()), Ok(*id));
        }
        assert_eq!(BusId::try_from(0), Err(0));
        assert_eq!(BusId::try_from(4), Err(4));
    }

    #[test]
    fn test_wire_address() {
        assert_eq!(Addressing::SevenBit.wire_address(0x48), 0x90);
        assert_eq!(Addressing::TenBit.wire_address(0x2F0), 0x2F0);
    }

    #[test]
    fn test_fast_mode_boundary() {
        assert!(!I2cConfig::master(10_000).fast_mode());
        assert!(!I2cConfig::STANDARD.fast_mode());
        assert!(I2cConfig::master(100_001).fast_mode());
        assert!(I2cConfig::FAST.fast_mode());
    }

    #[test]
    fn test_register_width_limits() {
        assert_eq!(RegisterWidth::None.bytes(), 0);
        assert_eq!(RegisterWidth::Bits8.max_register(), 0xFF);
        assert_eq!(RegisterWidth::Bits16.bytes(), 2);
    }

    #[test]
    fn test_transfer_direction_follows_buffer() {
        let mut rx = [0u8; 3];
        let tx = [1u8, 2];

        let read = Transfer {
            wire_address: 0x90,
            memory: None,
            buffer: TransferBuffer::Read(&mut rx),
        };
        assert_eq!(read.direction(), Direction::Read);
        assert_eq!(read.len(), 3);

        let write = Transfer {
            wire_address: 0x90,
            memory: None,
            buffer: TransferBuffer::Write(&tx),
        };
        assert_eq!(write.direction(), Direction::Write);
        assert_eq!(write.buffer.as_slice(), &[1, 2]);
    }
}
