//! Bus dispatcher
//!
//! A [`Bus`] owns the transaction queue and transfer engine of one physical
//! I2C peripheral and runs the dispatch/completion protocol:
//!
//! ```text
//!            set_transaction (queue was empty)
//!   ┌──────┐ ─────────────────▶ ┌──────────┐  engine started  ┌──────┐
//!   │ Idle │                    │ Starting │ ───────────────▶ │ Busy │
//!   └──────┘ ◀───────────────── └──────────┘                  └──────┘
//!       ▲     start failed             ▲     completion,         │
//!       │                              └──── next head ──────────┤
//!       └──────────────────── completion, queue empty ───────────┘
//! ```
//!
//! The transaction at the head of the queue is the one in flight. Queue and
//! state are only touched inside a critical section; pre/post callbacks run
//! outside it, so a callback may submit to the same bus. While the head's
//! pre-callback runs the bus is `Starting`: interrupts are acknowledged but
//! nothing is serviced, completed or dispatched until the engine is started.
//!
//! Errors are never raised out of interrupt context. A failed dispatch or
//! transfer is recorded as a [`BusFault`] that foreground code drains with
//! [`Bus::take_fault`] or awaits with [`Bus::wait_fault`].

use core::cell::RefCell;
use core::marker::PhantomData;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use heapless::Deque;
use twiq_hal::{BusId, I2cConfig, InterruptKind, Progress, TransferEngine, TransferError};

use crate::config::BusConfig;
use crate::device::TransactionSink;
use crate::error::Error;
use crate::queue::Queue;
use crate::registry::{BusRegistry, InterruptTarget};
use crate::transaction::{PreCallback, Transaction};

/// Faults kept until drained; older ones are dropped first
pub const FAULT_LOG_DEPTH: usize = 4;

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusState {
    /// No transfer in flight
    Idle,
    /// Head claimed and its pre-callback running; engine not started yet
    Starting,
    /// Queue head handed to the engine
    Busy,
}

/// What went wrong while dispatching or transferring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Engine refused to start the head; it stays queued and the bus stalls
    DispatchFailed(TransferError),
    /// Engine aborted an in-flight transfer; the transaction was dropped
    TransferFailed(TransferError),
}

impl FaultKind {
    pub fn error(&self) -> TransferError {
        match self {
            FaultKind::DispatchFailed(e) | FaultKind::TransferFailed(e) => *e,
        }
    }
}

/// Recorded bus error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusFault {
    pub bus: BusId,
    /// Target address of the affected transaction
    pub address: u16,
    pub kind: FaultKind,
}

/// Outcome of claiming the queue head
enum Dispatch<'a> {
    /// Bus marked starting; run the hook, then start the head
    Head(Option<PreCallback<'a>>),
    /// Engine not ready; the head stays queued
    Refused(BusFault),
    Nothing,
}

/// State shared between foreground and interrupt context
struct Dispatcher<E, Q> {
    engine: E,
    queue: Q,
    state: BusState,
    faults: Deque<BusFault, FAULT_LOG_DEPTH>,
}

impl<E, Q> Dispatcher<E, Q> {
    /// Mark the bus starting with the current head, or idle if there is none
    fn claim_head<'a>(&mut self) -> Dispatch<'a>
    where
        Q: Queue<Transaction<'a>>,
    {
        match self.queue.peek() {
            Some(head) => {
                self.state = BusState::Starting;
                Dispatch::Head(head.pre_hook())
            }
            None => {
                self.state = BusState::Idle;
                Dispatch::Nothing
            }
        }
    }

    /// Foreground claim: only hands out the head if the engine is idle
    fn claim_when_ready<'a>(&mut self, bus: BusId) -> Dispatch<'a>
    where
        E: TransferEngine,
        Q: Queue<Transaction<'a>>,
    {
        if self.engine.is_idle() {
            return self.claim_head();
        }
        match self.queue.peek() {
            Some(head) => Dispatch::Refused(BusFault {
                bus,
                address: head.address(),
                kind: FaultKind::DispatchFailed(TransferError::Busy),
            }),
            None => Dispatch::Nothing,
        }
    }
}

/// One physical I2C peripheral and its transaction queue
///
/// A bus holds its registry slot until [`Bus::release`]. Dropping a bus
/// without releasing it keeps the peripheral claimed.
pub struct Bus<'a, E, Q> {
    name: &'static str,
    id: BusId,
    config: I2cConfig,
    registry: &'a BusRegistry,
    inner: Mutex<CriticalSectionRawMutex, RefCell<Dispatcher<E, Q>>>,
    fault_signal: Signal<CriticalSectionRawMutex, BusFault>,
    _transactions: PhantomData<Transaction<'a>>,
}

impl<'a, E, Q> Bus<'a, E, Q>
where
    E: TransferEngine,
    Q: Queue<Transaction<'a>>,
{
    /// Validate `config`, claim `id` in `registry` and configure the engine
    pub fn new(
        name: &'static str,
        id: BusId,
        queue: Q,
        mut engine: E,
        config: BusConfig,
        registry: &'a BusRegistry,
    ) -> Result<Self, Error> {
        let config = config.resolve()?;
        registry.claim(id)?;

        if let Err(e) = engine.configure(&config) {
            registry.release(id);
            error!("{}: peripheral init failed: {}", id, e);
            return Err(Error::Hardware(e));
        }

        debug!("{} ({}) registered at {} Hz", name, id, config.frequency);

        Ok(Self {
            name,
            id,
            config,
            registry,
            inner: Mutex::new(RefCell::new(Dispatcher {
                engine,
                queue,
                state: BusState::Idle,
                faults: Deque::new(),
            })),
            fault_signal: Signal::new(),
            _transactions: PhantomData,
        })
    }

    /// Free the registry slot and hand back the engine
    ///
    /// Queued transactions are dropped without their callbacks.
    pub fn release(self) -> E {
        self.registry.release(self.id);
        debug!("{} released", self.id);
        self.inner.into_inner().into_inner().engine
    }

    fn with_dispatcher<R>(&self, f: impl FnOnce(&mut Dispatcher<E, Q>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Physical peripheral of this bus
    pub fn bus_id(&self) -> BusId {
        self.id
    }

    /// Resolved peripheral configuration
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    pub fn is_fast_mode(&self) -> bool {
        self.config.fast_mode()
    }

    pub fn state(&self) -> BusState {
        self.with_dispatcher(|d| d.state)
    }

    /// A transfer is in flight or about to start
    pub fn is_busy(&self) -> bool {
        self.state() != BusState::Idle
    }

    /// Queued transactions, including the one in flight
    pub fn pending(&self) -> usize {
        self.with_dispatcher(|d| d.queue.size())
    }

    /// Idle with work queued: the head failed to start
    pub fn is_stalled(&self) -> bool {
        self.with_dispatcher(|d| d.state == BusState::Idle && d.queue.has_data())
    }

    pub fn has_fault(&self) -> bool {
        self.with_dispatcher(|d| !d.faults.is_empty())
    }

    /// Oldest unread fault
    ///
    /// Draining the last one also clears the pending [`Bus::wait_fault`]
    /// notification.
    pub fn take_fault(&self) -> Option<BusFault> {
        self.with_dispatcher(|d| {
            let fault = d.faults.pop_front();
            if d.faults.is_empty() {
                self.fault_signal.reset();
            }
            fault
        })
    }

    /// Wait for the next fault
    ///
    /// Returns immediately with the latest fault if one was recorded and not
    /// yet drained with [`Bus::take_fault`].
    pub async fn wait_fault(&self) -> BusFault {
        self.fault_signal.wait().await
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        self.with_dispatcher(|d| f(&mut d.engine))
    }

    /// Queue `transaction`, dispatching it at once if the bus is idle
    ///
    /// Only a transaction arriving at an empty queue is dispatched here;
    /// anything else waits for the completion of the one ahead of it. If the
    /// engine is busy or refuses to start, the transaction stays queued, a
    /// fault is recorded and the bus stalls until [`Bus::restart`] or
    /// [`Bus::discard_head`].
    pub fn set_transaction(&self, transaction: Transaction<'a>) -> Result<(), Error> {
        let id = self.id;
        let address = transaction.address();
        let claim = self.with_dispatcher(|d| {
            let was_empty = d.queue.is_empty();
            if d.queue.enqueue(transaction).is_err() {
                return Err(Error::QueueFull);
            }
            match d.state {
                BusState::Idle if was_empty => Ok(d.claim_when_ready(id)),
                BusState::Idle => {
                    warn!("{}: stalled, {:#x} queued behind failed head", id, address);
                    Ok(Dispatch::Nothing)
                }
                BusState::Starting | BusState::Busy => Ok(Dispatch::Nothing),
            }
        });

        let claim = claim.map_err(|e| {
            warn!("{}: queue full, transaction to {:#x} dropped", id, address);
            e
        })?;

        self.dispatch_foreground(claim)
    }

    /// Retry the head of a stalled bus
    pub fn restart(&self) -> Result<(), Error> {
        let id = self.id;
        let claim = self.with_dispatcher(|d| match d.state {
            BusState::Idle => d.claim_when_ready(id),
            BusState::Starting | BusState::Busy => Dispatch::Nothing,
        });

        self.dispatch_foreground(claim)
    }

    /// Remove the head of a stalled bus without running its callbacks
    ///
    /// Returns `None` while a transfer is in flight. Call [`Bus::restart`]
    /// afterwards to move on to the next transaction.
    pub fn discard_head(&self) -> Option<Transaction<'a>> {
        self.with_dispatcher(|d| match d.state {
            BusState::Idle => d.queue.dequeue().ok(),
            BusState::Starting | BusState::Busy => None,
        })
    }

    /// Service a peripheral interrupt
    ///
    /// Called from the interrupt vector, usually through
    /// [`BusRegistry::dispatch`]. Only a started transfer is serviced.
    pub fn on_interrupt(&self, interrupt: InterruptKind) {
        let addressing = self.config.addressing;
        let progress = self.with_dispatcher(|d| {
            let Dispatcher {
                engine,
                queue,
                state,
                ..
            } = d;
            match (*state, queue.peek_mut()) {
                (BusState::Busy, Some(head)) => {
                    engine.service(interrupt, &mut head.transfer(addressing))
                }
                _ => {
                    engine.acknowledge(interrupt);
                    Progress::Pending
                }
            }
        });

        match progress {
            Progress::Pending => {}
            Progress::Complete => self.complete_transfer(),
            Progress::Failed(error) => self.fail_transfer(error),
        }
    }

    /// The in-flight transfer finished
    ///
    /// Dequeues it, runs its post-callback and dispatches the next head.
    pub fn complete_transfer(&self) {
        let Some(transaction) = self.take_in_flight() else {
            warn!("{}: completion with nothing in flight", self.id);
            return;
        };

        trace!("{}: {:#x} complete", self.id, transaction.address());
        transaction.post_callback();

        self.dispatch_next();
    }

    fn fail_transfer(&self, error: TransferError) {
        if let Some(transaction) = self.take_in_flight() {
            self.record_fault(BusFault {
                bus: self.id,
                address: transaction.address(),
                kind: FaultKind::TransferFailed(error),
            });
            self.dispatch_next();
        }
    }

    fn take_in_flight(&self) -> Option<Transaction<'a>> {
        self.with_dispatcher(|d| match d.state {
            BusState::Busy => d.queue.dequeue().ok(),
            BusState::Idle | BusState::Starting => None,
        })
    }

    /// Interrupt-context dispatch; failures become faults
    fn dispatch_next(&self) {
        let claim = self.with_dispatcher(|d| d.claim_head());
        if let Err(fault) = self.dispatch(claim) {
            self.record_fault(fault);
        }
    }

    /// Foreground dispatch; failures are recorded and returned
    fn dispatch_foreground(&self, claim: Dispatch<'a>) -> Result<(), Error> {
        self.dispatch(claim).map_err(|fault| {
            self.record_fault(fault);
            Error::Hardware(fault.kind.error())
        })
    }

    fn dispatch(&self, claim: Dispatch<'a>) -> Result<(), BusFault> {
        match claim {
            Dispatch::Nothing => Ok(()),
            Dispatch::Refused(fault) => Err(fault),
            Dispatch::Head(pre) => {
                if let Some(pre) = pre {
                    pre();
                }
                self.start_head()
            }
        }
    }

    /// Start the head claimed by `claim_head`
    ///
    /// Only a `Starting` bus starts anything. Nothing dequeues or claims
    /// while `Starting`, so the head is still the one that was claimed.
    fn start_head(&self) -> Result<(), BusFault> {
        let id = self.id;
        let addressing = self.config.addressing;
        self.with_dispatcher(|d| {
            let Dispatcher {
                engine,
                queue,
                state,
                ..
            } = d;
            if *state != BusState::Starting {
                return Ok(());
            }
            let Some(head) = queue.peek_mut() else {
                *state = BusState::Idle;
                return Ok(());
            };

            let address = head.address();
            match engine.start(&mut head.transfer(addressing)) {
                Ok(()) => {
                    *state = BusState::Busy;
                    trace!("{}: started {:?} to {:#x}", id, head.direction(), address);
                    Ok(())
                }
                Err(error) => {
                    *state = BusState::Idle;
                    Err(BusFault {
                        bus: id,
                        address,
                        kind: FaultKind::DispatchFailed(error),
                    })
                }
            }
        })
    }

    fn record_fault(&self, fault: BusFault) {
        error!(
            "{}: {:?} for {:#x}",
            fault.bus,
            fault.kind,
            fault.address
        );
        self.with_dispatcher(|d| {
            let mut pending = fault;
            while let Err(rejected) = d.faults.push_back(pending) {
                d.faults.pop_front();
                pending = rejected;
            }
            self.fault_signal.signal(fault);
        });
    }
}

impl<E, Q> Bus<'static, E, Q>
where
    E: TransferEngine + Send + 'static,
    Q: Queue<Transaction<'static>> + Send + 'static,
{
    /// Route this bus's interrupts through its registry
    pub fn bind(&'static self) -> Result<(), Error> {
        self.registry.bind(self.id, self)?;
        debug!("{} bound to interrupts", self.id);
        Ok(())
    }
}

impl<'a, E, Q> TransactionSink<'a> for Bus<'a, E, Q>
where
    E: TransferEngine + Send,
    Q: Queue<Transaction<'a>> + Send,
{
    fn set_transaction(&self, transaction: Transaction<'a>) -> Result<(), Error> {
        Bus::set_transaction(self, transaction)
    }

    fn bus_id(&self) -> BusId {
        self.id
    }
}

impl<'a, E, Q> InterruptTarget for Bus<'a, E, Q>
where
    E: TransferEngine + Send,
    Q: Queue<Transaction<'a>> + Send,
{
    fn on_interrupt(&self, interrupt: InterruptKind) {
        Bus::on_interrupt(self, interrupt)
    }
}
