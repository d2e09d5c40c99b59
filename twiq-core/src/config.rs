//! Bus configuration
//!
//! [`BusConfig`] is what the application writes down at startup. It is
//! validated and resolved into the peripheral-level [`I2cConfig`] when the
//! bus is created and never changes afterwards.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use twiq_hal::{Addressing, DutyCycle, I2cConfig};

use crate::error::Error;

/// Lowest non-reserved 7-bit address
pub const FIRST_7BIT_ADDRESS: u16 = 0x10;

/// Highest non-reserved 7-bit address
pub const LAST_7BIT_ADDRESS: u16 = 0x77;

/// Highest 10-bit address
pub const LAST_10BIT_ADDRESS: u16 = 0x3FF;

/// Application-level bus configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BusConfig {
    /// SCL frequency in Hz
    pub clock_speed: u32,
    /// Addressing mode
    pub addressing: Addressing,
    /// Fast mode duty cycle
    pub duty_cycle: DutyCycle,
    /// Bus never acts as a slave; slave-only fields are ignored
    pub master_only: bool,
    /// Respond to both own addresses
    pub dual_address: bool,
    /// Primary own address
    pub own_address1: u16,
    /// Secondary own address
    pub own_address2: u16,
    /// Allow clock stretching
    pub clock_stretching: bool,
    /// Answer the general call address
    pub general_call: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::master(100_000)
    }
}

impl BusConfig {
    /// Master-only bus at the given clock speed
    pub const fn master(clock_speed: u32) -> Self {
        Self {
            clock_speed,
            addressing: Addressing::SevenBit,
            duty_cycle: DutyCycle::Ratio2,
            master_only: true,
            dual_address: false,
            own_address1: 0,
            own_address2: 0,
            clock_stretching: false,
            general_call: false,
        }
    }

    /// Bus that also answers as a slave on `own_address`
    pub const fn slave(clock_speed: u32, own_address: u16) -> Self {
        Self {
            master_only: false,
            own_address1: own_address,
            ..Self::master(clock_speed)
        }
    }

    pub const fn with_addressing(mut self, addressing: Addressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub const fn with_duty_cycle(mut self, duty_cycle: DutyCycle) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    /// Enable dual-address slave mode with `second` as own address 2
    pub const fn with_dual_address(mut self, second: u16) -> Self {
        self.dual_address = true;
        self.own_address2 = second;
        self
    }

    pub const fn with_clock_stretching(mut self, enabled: bool) -> Self {
        self.clock_stretching = enabled;
        self
    }

    pub const fn with_general_call(mut self, enabled: bool) -> Self {
        self.general_call = enabled;
        self
    }

    /// Whether the clock speed needs fast mode timing
    pub const fn is_fast_mode(&self) -> bool {
        I2cConfig::master(self.clock_speed).fast_mode()
    }

    /// Validate and produce the peripheral configuration
    ///
    /// A master-only bus has its slave-only fields forced to their disabled
    /// defaults first, so nothing about them can fail.
    pub fn resolve(&self) -> Result<I2cConfig, Error> {
        let mut config = I2cConfig {
            frequency: self.clock_speed,
            addressing: self.addressing,
            duty_cycle: self.duty_cycle,
            general_call: self.general_call,
            clock_stretching: self.clock_stretching,
            dual_address: self.dual_address,
            own_address1: self.own_address1,
            own_address2: self.own_address2,
        };

        if self.master_only {
            config.general_call = false;
            config.clock_stretching = false;
            config.dual_address = false;
            config.own_address1 = 0;
            config.own_address2 = 0;
        } else {
            validate_own_addresses(
                config.own_address1,
                config.own_address2,
                config.dual_address,
                config.addressing,
            )?;
        }

        Ok(config)
    }
}

/// Check a single address against the addressing mode
///
/// 7-bit: 0x00-0x0F and 0x78-0x7F are reserved by the I2C standard.
/// 10-bit: anything that fits in 10 bits.
pub fn check_address_validity(address: u16, addressing: Addressing) -> bool {
    match addressing {
        Addressing::SevenBit => (FIRST_7BIT_ADDRESS..=LAST_7BIT_ADDRESS).contains(&address),
        Addressing::TenBit => address <= LAST_10BIT_ADDRESS,
    }
}

/// Check the slave own addresses for the given mode
pub fn validate_own_addresses(
    own_address1: u16,
    own_address2: u16,
    dual_address: bool,
    addressing: Addressing,
) -> Result<(), Error> {
    let valid = check_address_validity(own_address1, addressing)
        && (!dual_address || check_address_validity(own_address2, addressing));

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidOwnAddress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_7bit_ranges() {
        for addr in 0x00..=0x0F {
            assert!(!check_address_validity(addr, Addressing::SevenBit));
        }
        for addr in 0x10..=0x77 {
            assert!(check_address_validity(addr, Addressing::SevenBit));
        }
        for addr in 0x78..=0x7F {
            assert!(!check_address_validity(addr, Addressing::SevenBit));
        }
    }

    #[test]
    fn test_10bit_boundary() {
        assert!(check_address_validity(0, Addressing::TenBit));
        assert!(check_address_validity(0x3FF, Addressing::TenBit));
        assert!(!check_address_validity(0x400, Addressing::TenBit));
    }

    #[test]
    fn test_master_ignores_slave_fields() {
        let config = BusConfig {
            own_address1: 0x01,
            own_address2: 0x7F,
            dual_address: true,
            general_call: true,
            clock_stretching: true,
            ..BusConfig::master(400_000)
        };

        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.own_address1, 0);
        assert_eq!(resolved.own_address2, 0);
        assert!(!resolved.dual_address);
        assert!(!resolved.general_call);
        assert!(!resolved.clock_stretching);
        assert_eq!(resolved.frequency, 400_000);
    }

    #[test]
    fn test_slave_address_validation() {
        assert!(BusConfig::slave(100_000, 0x42).resolve().is_ok());
        assert_eq!(
            BusConfig::slave(100_000, 0x08).resolve(),
            Err(Error::InvalidOwnAddress)
        );
        // Address 2 only matters in dual mode
        let single = BusConfig {
            own_address2: 0x7F,
            ..BusConfig::slave(100_000, 0x42)
        };
        assert!(single.resolve().is_ok());
    }

    #[test]
    fn test_dual_address_needs_both_valid() {
        let ok = BusConfig::slave(100_000, 0x42).with_dual_address(0x43);
        assert!(ok.resolve().unwrap().dual_address);

        let bad = BusConfig::slave(100_000, 0x42).with_dual_address(0x78);
        assert_eq!(bad.resolve(), Err(Error::InvalidOwnAddress));
    }

    #[test]
    fn test_ten_bit_slave() {
        let config = BusConfig::slave(100_000, 0x2F0).with_addressing(Addressing::TenBit);
        assert!(config.resolve().is_ok());

        let config = BusConfig::slave(100_000, 0x400).with_addressing(Addressing::TenBit);
        assert_eq!(config.resolve(), Err(Error::InvalidOwnAddress));
    }

    #[test]
    fn test_fast_mode_flag() {
        assert!(!BusConfig::master(10_000).is_fast_mode());
        assert!(!BusConfig::master(100_000).is_fast_mode());
        assert!(BusConfig::master(400_000).is_fast_mode());
    }

    proptest! {
        #[test]
        fn prop_10bit_validity(addr in any::<u16>()) {
            prop_assert_eq!(check_address_validity(addr, Addressing::TenBit), addr <= 0x3FF);
        }

        #[test]
        fn prop_7bit_never_accepts_reserved(addr in any::<u16>()) {
            if check_address_validity(addr, Addressing::SevenBit) {
                prop_assert!((0x10..=0x77).contains(&addr));
            }
        }
    }
}
