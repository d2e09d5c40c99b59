//! Process-wide table of buses
//!
//! Each physical peripheral has one slot. A bus claims its slot when it is
//! created, which is how duplicate buses are rejected, and binds itself once
//! it has a `'static` home so interrupt vectors can reach it:
//!
//! ```ignore
//! static BUS1: StaticCell<Bus<'static, Engine, StaticQueue<Transaction<'static>, 8>>> =
//!     StaticCell::new();
//!
//! let bus = BUS1.init(Bus::new("sensors", BusId::I2c1, StaticQueue::new(), engine,
//!                              BusConfig::master(400_000), &BUSES)?);
//! bus.bind()?;
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     BUSES.dispatch(BusId::I2c1, InterruptKind::Event);
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use twiq_hal::{BusId, InterruptKind, BUS_COUNT};

use crate::error::Error;

/// Receiver of peripheral interrupts
pub trait InterruptTarget: Sync {
    fn on_interrupt(&self, interrupt: InterruptKind);
}

#[derive(Clone, Copy)]
enum Slot {
    Free,
    /// Owned by a bus that has not bound an interrupt route yet
    Claimed,
    Bound(&'static dyn InterruptTarget),
}

/// Fixed-size bus lookup table
pub struct BusRegistry {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Slot; BUS_COUNT]>>,
}

/// Registry used by interrupt vectors
pub static BUSES: BusRegistry = BusRegistry::new();

/// Peripheral for a 1-based instance number, as written in board configs
pub fn bus_for(number: u8) -> Result<BusId, Error> {
    BusId::try_from(number).map_err(Error::UnsupportedBus)
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BusRegistry {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([Slot::Free; BUS_COUNT])),
        }
    }

    /// Reserve the slot for `id`
    pub fn claim(&self, id: BusId) -> Result<(), Error> {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let slot = &mut slots[id.index()];
            match *slot {
                Slot::Free => {
                    *slot = Slot::Claimed;
                    Ok(())
                }
                _ => Err(Error::BusInUse(id)),
            }
        })
    }

    /// Route interrupts for a claimed `id` to `target`
    pub fn bind(&self, id: BusId, target: &'static dyn InterruptTarget) -> Result<(), Error> {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let slot = &mut slots[id.index()];
            match *slot {
                Slot::Claimed => {
                    *slot = Slot::Bound(target);
                    Ok(())
                }
                Slot::Bound(_) => Err(Error::BusInUse(id)),
                Slot::Free => Err(Error::BusNotRegistered(id)),
            }
        })
    }

    /// Free the slot for `id`
    pub fn release(&self, id: BusId) {
        self.slots.lock(|slots| slots.borrow_mut()[id.index()] = Slot::Free);
    }

    /// Whether a bus owns `id`
    pub fn is_registered(&self, id: BusId) -> bool {
        self.slots
            .lock(|slots| !matches!(slots.borrow()[id.index()], Slot::Free))
    }

    /// Whether interrupts for `id` reach a bus
    pub fn is_bound(&self, id: BusId) -> bool {
        self.slots
            .lock(|slots| matches!(slots.borrow()[id.index()], Slot::Bound(_)))
    }

    /// Deliver an interrupt to the bus bound to `id`
    ///
    /// Returns `false` and drops the interrupt if nothing is bound. The
    /// target runs outside the table's critical section.
    pub fn dispatch(&self, id: BusId, interrupt: InterruptKind) -> bool {
        let target = self.slots.lock(|slots| match slots.borrow()[id.index()] {
            Slot::Bound(target) => Some(target),
            _ => None,
        });

        match target {
            Some(target) => {
                target.on_interrupt(interrupt);
                true
            }
            None => {
                trace!("{}: interrupt with no bus bound, dropped", id);
                false
            }
        }
    }
}
