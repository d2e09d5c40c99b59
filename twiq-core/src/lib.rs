//! Interrupt-driven I2C transaction scheduler
//!
//! This crate contains the board-agnostic part of the scheduler:
//!
//! - Transaction value objects with pre/post hooks
//! - Devices (an address on a bus)
//! - Per-peripheral buses with a FIFO queue and a dispatch state machine
//! - The static bus registry interrupt vectors route through
//! - Bus configuration and own-address validation
//!
//! Register-level peripheral code lives behind [`twiq_hal::TransferEngine`].
//!
//! # Usage
//!
//! ```ignore
//! static BUS: StaticCell<Bus<'static, Engine, StaticQueue<Transaction<'static>, 8>>> =
//!     StaticCell::new();
//! static ADC: StaticCell<Device<'static>> = StaticCell::new();
//! static DONE: AtomicBool = AtomicBool::new(false);
//!
//! let bus = BUS.init(Bus::new("sensors", BusId::I2c1, StaticQueue::new(), engine,
//!                             BusConfig::master(100_000), &BUSES)?);
//! bus.bind()?;
//! let adc = ADC.init(Device::new(0x48, Some(bus), "ADC_1"));
//!
//! fn converted(_: &[u8]) {
//!     DONE.store(true, Ordering::Release);
//! }
//!
//! Transaction::for_write(adc, &CONFIG_WORD, 0x01, RegisterWidth::Bits8)?
//!     .with_post_callback(&converted)
//!     .send()?;
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod bus;
pub mod config;
pub mod device;
pub mod error;
pub mod queue;
pub mod registry;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use bus::{Bus, BusFault, BusState, FaultKind, FAULT_LOG_DEPTH};
pub use config::BusConfig;
pub use device::{Device, TransactionSink};
pub use error::{Error, ErrorClass};
pub use queue::{Queue, StaticQueue};
pub use registry::{bus_for, BusRegistry, InterruptTarget, BUSES};
pub use transaction::{PostCallback, PreCallback, Transaction, MAX_TRANSFER_LEN};

pub use twiq_hal::{
    Addressing, BusId, Direction, DutyCycle, I2cConfig, InterruptKind, RegisterWidth,
    TransferEngine, TransferError,
};
