//! Logical I2C endpoints
//!
//! A [`Device`] is an address plus the bus it sits on. It does not own the
//! bus; many devices can share one.

use twiq_hal::BusId;

use crate::error::Error;
use crate::transaction::Transaction;

/// Anything that accepts transactions for a physical bus
///
/// Implemented by [`crate::bus::Bus`]. Devices hold it as a trait object so
/// they don't carry the bus's queue and engine types around.
pub trait TransactionSink<'a>: Sync {
    /// Queue a transaction, dispatching it immediately if the bus is idle
    fn set_transaction(&self, transaction: Transaction<'a>) -> Result<(), Error>;

    /// Physical peripheral behind this sink
    fn bus_id(&self) -> BusId;
}

/// A target on an I2C bus
pub struct Device<'a> {
    address: u16,
    bus: Option<&'a dyn TransactionSink<'a>>,
    name: &'static str,
}

impl<'a> Device<'a> {
    /// Create a device, optionally already attached to `bus`
    pub fn new(address: u16, bus: Option<&'a dyn TransactionSink<'a>>, name: &'static str) -> Self {
        Self { address, bus, name }
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_attached(&self) -> bool {
        self.bus.is_some()
    }

    /// Peripheral of the attached bus
    pub fn bus_id(&self) -> Option<BusId> {
        self.bus.map(|bus| bus.bus_id())
    }

    /// Attach to `bus`
    ///
    /// Fails if already attached; detach first to move a device.
    pub fn attach_bus(&mut self, bus: &'a dyn TransactionSink<'a>) -> Result<(), Error> {
        if self.bus.is_some() {
            return Err(Error::AlreadyAttached);
        }
        debug!("device {} attached to {}", self.name, bus.bus_id());
        self.bus = Some(bus);
        Ok(())
    }

    /// Forget the attached bus (no-op when detached)
    pub fn detach_bus(&mut self) {
        self.bus = None;
    }

    /// Forward `transaction` to the attached bus
    pub fn set_transaction(&self, transaction: Transaction<'a>) -> Result<(), Error> {
        let bus = self.bus.ok_or(Error::NotAttached)?;
        bus.set_transaction(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use critical_section::Mutex;
    use twiq_hal::{RegisterWidth, TransferBuffer};

    /// Sink that only counts what it receives
    struct CountingSink {
        id: BusId,
        received: Mutex<Cell<usize>>,
    }

    impl CountingSink {
        fn new(id: BusId) -> Self {
            Self {
                id,
                received: Mutex::new(Cell::new(0)),
            }
        }

        fn count(&self) -> usize {
            critical_section::with(|cs| self.received.borrow(cs).get())
        }
    }

    impl<'a> TransactionSink<'a> for CountingSink {
        fn set_transaction(&self, _transaction: Transaction<'a>) -> Result<(), Error> {
            critical_section::with(|cs| {
                let count = self.received.borrow(cs);
                count.set(count.get() + 1);
            });
            Ok(())
        }

        fn bus_id(&self) -> BusId {
            self.id
        }
    }

    #[test]
    fn test_unattached_device_rejects() {
        let device = Device::new(0x48, None, "adc");
        let buf = [0u8; 1];
        let t = Transaction::new(0x48, TransferBuffer::Write(&buf), 0, RegisterWidth::None).unwrap();
        assert_eq!(device.set_transaction(t), Err(Error::NotAttached));
        assert_eq!(device.bus_id(), None);
    }

    #[test]
    fn test_attach_twice_fails() {
        let first = CountingSink::new(BusId::I2c1);
        let second = CountingSink::new(BusId::I2c2);
        let mut device = Device::new(0x48, None, "adc");

        device.attach_bus(&first).unwrap();
        assert_eq!(device.attach_bus(&second), Err(Error::AlreadyAttached));
        assert_eq!(device.bus_id(), Some(BusId::I2c1));

        device.detach_bus();
        device.attach_bus(&second).unwrap();
        assert_eq!(device.bus_id(), Some(BusId::I2c2));
    }

    #[test]
    fn test_detach_is_idempotent() {
        let mut device = Device::new(0x48, None, "adc");
        device.detach_bus();
        device.detach_bus();
        assert!(!device.is_attached());
    }

    #[test]
    fn test_forwards_to_bus() {
        let sink = CountingSink::new(BusId::I2c3);
        let device = Device::new(0x48, Some(&sink), "adc");
        let buf = [0u8; 2];

        Transaction::for_write(&device, &buf, 0x01, RegisterWidth::Bits8)
            .unwrap()
            .send()
            .unwrap();
        let t = Transaction::for_write(&device, &buf, 0, RegisterWidth::None).unwrap();
        device.set_transaction(t).unwrap();

        assert_eq!(sink.count(), 2);
    }
}
