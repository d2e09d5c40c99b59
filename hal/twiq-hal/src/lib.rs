//! twiq Hardware Abstraction Layer
//!
//! This crate defines the seam between the board-agnostic transaction
//! scheduler and the chip-specific I2C peripheral driver. A chip HAL
//! implements [`i2c::TransferEngine`] for each physical peripheral; the
//! scheduler in `twiq-core` drives it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (devices, transactions)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twiq-core (queue, bus dispatcher)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  twiq-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!         ┌───────────────────────┐
//!         │  chip transfer engine │
//!         └───────────────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::TransferEngine`] - Interrupt-driven I2C transfer primitives

#![no_std]
#![deny(unsafe_code)]

pub mod i2c;

// Re-export key types at crate root for convenience
pub use i2c::{
    Addressing, BusId, Direction, DutyCycle, I2cConfig, InterruptKind, MemoryAddress, Progress,
    RegisterWidth, Transfer, TransferBuffer, TransferEngine, TransferError, BUS_COUNT,
};
