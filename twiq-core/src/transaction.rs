//! Transaction value object
//!
//! A [`Transaction`] describes one transfer: direction, target address,
//! optional register address, the caller's buffer and optional hooks run
//! around the transfer. It borrows its buffer; the borrow checker keeps the
//! buffer alive for as long as the bus holding the transaction.

use core::fmt;

use twiq_hal::{Addressing, Direction, MemoryAddress, RegisterWidth, Transfer, TransferBuffer};

use crate::device::Device;
use crate::error::Error;

/// Longest data phase the peripheral's transfer counter can express
pub const MAX_TRANSFER_LEN: usize = u16::MAX as usize;

/// Hook run right before a transaction is handed to the hardware
pub type PreCallback<'a> = &'a (dyn Fn() + Sync);

/// Hook run after a transaction completed, with the buffer contents
///
/// For reads the slice holds the received bytes.
pub type PostCallback<'a> = &'a (dyn Fn(&[u8]) + Sync);

/// One requested I2C transfer
pub struct Transaction<'a> {
    address: u16,
    register: u16,
    register_width: RegisterWidth,
    buffer: TransferBuffer<'a>,
    device: Option<&'a Device<'a>>,
    pre: Option<PreCallback<'a>>,
    post: Option<PostCallback<'a>>,
}

impl<'a> Transaction<'a> {
    /// Transaction to a raw address, without a device
    ///
    /// The direction follows the buffer kind. Used for bus probing and by
    /// the device factories.
    pub fn new(
        address: u16,
        buffer: TransferBuffer<'a>,
        register: u16,
        register_width: RegisterWidth,
    ) -> Result<Self, Error> {
        if register_width == RegisterWidth::None && register != 0 {
            return Err(Error::RegisterWithoutWidth);
        }
        if register > register_width.max_register() {
            return Err(Error::RegisterOutOfRange);
        }
        if buffer.len() > MAX_TRANSFER_LEN {
            return Err(Error::BufferTooLong);
        }

        Ok(Self {
            address,
            register,
            register_width,
            buffer,
            device: None,
            pre: None,
            post: None,
        })
    }

    /// Read `data.len()` bytes from `device`
    pub fn for_read(
        device: &'a Device<'a>,
        data: &'a mut [u8],
        register: u16,
        register_width: RegisterWidth,
    ) -> Result<Self, Error> {
        let mut t = Self::new(
            device.address(),
            TransferBuffer::Read(data),
            register,
            register_width,
        )?;
        t.device = Some(device);
        Ok(t)
    }

    /// Write `data` to `device`
    pub fn for_write(
        device: &'a Device<'a>,
        data: &'a [u8],
        register: u16,
        register_width: RegisterWidth,
    ) -> Result<Self, Error> {
        let mut t = Self::new(
            device.address(),
            TransferBuffer::Write(data),
            register,
            register_width,
        )?;
        t.device = Some(device);
        Ok(t)
    }

    pub fn set_pre_callback(&mut self, callback: PreCallback<'a>) {
        self.pre = Some(callback);
    }

    pub fn set_post_callback(&mut self, callback: PostCallback<'a>) {
        self.post = Some(callback);
    }

    pub fn with_pre_callback(mut self, callback: PreCallback<'a>) -> Self {
        self.set_pre_callback(callback);
        self
    }

    pub fn with_post_callback(mut self, callback: PostCallback<'a>) -> Self {
        self.set_post_callback(callback);
        self
    }

    /// Run the pre-dispatch hook, if any
    pub fn pre_callback(&self) {
        if let Some(callback) = self.pre {
            callback();
        }
    }

    /// Run the post-completion hook, if any
    pub fn post_callback(&self) {
        if let Some(callback) = self.post {
            callback(self.buffer.as_slice());
        }
    }

    /// Queue this transaction on its device's bus
    pub fn send(self) -> Result<(), Error> {
        let device = self.device.ok_or(Error::NoDevice)?;
        device.set_transaction(self)
    }

    pub fn direction(&self) -> Direction {
        self.buffer.direction()
    }

    /// Target address (unshifted)
    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn register(&self) -> u16 {
        self.register
    }

    pub fn register_width(&self) -> RegisterWidth {
        self.register_width
    }

    /// Bytes in the data phase
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current buffer contents
    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn device(&self) -> Option<&'a Device<'a>> {
        self.device
    }

    pub(crate) fn pre_hook(&self) -> Option<PreCallback<'a>> {
        self.pre
    }

    /// Register address phase, if any
    pub fn memory(&self) -> Option<MemoryAddress> {
        match self.register_width {
            RegisterWidth::None => None,
            width => Some(MemoryAddress {
                register: self.register,
                width,
            }),
        }
    }

    /// View handed to the transfer engine
    pub fn transfer(&mut self, addressing: Addressing) -> Transfer<'_> {
        Transfer {
            wire_address: addressing.wire_address(self.address),
            memory: self.memory(),
            buffer: self.buffer.reborrow(),
        }
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("direction", &self.direction())
            .field("address", &self.address)
            .field("register", &self.register)
            .field("register_width", &self.register_width)
            .field("len", &self.len())
            .field("device", &self.device.map(Device::name))
            .finish()
    }
}
