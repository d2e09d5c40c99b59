//! Host-side transfer engine that records what the bus asks of it

use std::vec::Vec;

use twiq_hal::{
    Direction, I2cConfig, InterruptKind, MemoryAddress, Progress, Transfer, TransferBuffer,
    TransferEngine, TransferError,
};

/// One `start` call as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Started {
    pub direction: Direction,
    pub wire_address: u16,
    pub memory: Option<MemoryAddress>,
    pub len: usize,
}

#[derive(Debug)]
pub(crate) struct RecordingEngine {
    pub configured: Option<I2cConfig>,
    pub started: Vec<Started>,
    pub idle: bool,
    /// Fail the next `start` with this error
    pub fail_start: Option<TransferError>,
    pub fail_configure: Option<TransferError>,
    /// Byte written into read buffers on completion
    pub fill: u8,
    pub acknowledged: usize,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self {
            configured: None,
            started: Vec::new(),
            idle: true,
            fail_start: None,
            fail_configure: None,
            fill: 0xA5,
            acknowledged: 0,
        }
    }
}

impl TransferEngine for RecordingEngine {
    fn configure(&mut self, config: &I2cConfig) -> Result<(), TransferError> {
        if let Some(e) = self.fail_configure {
            return Err(e);
        }
        self.configured = Some(*config);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.idle
    }

    fn start(&mut self, transfer: &mut Transfer<'_>) -> Result<(), TransferError> {
        if let Some(e) = self.fail_start.take() {
            return Err(e);
        }
        self.started.push(Started {
            direction: transfer.direction(),
            wire_address: transfer.wire_address,
            memory: transfer.memory,
            len: transfer.len(),
        });
        Ok(())
    }

    /// Event interrupts complete the transfer, error interrupts NACK it
    fn service(&mut self, interrupt: InterruptKind, transfer: &mut Transfer<'_>) -> Progress {
        match interrupt {
            InterruptKind::Event => {
                if let TransferBuffer::Read(buf) = &mut transfer.buffer {
                    buf.fill(self.fill);
                }
                Progress::Complete
            }
            InterruptKind::Error => Progress::Failed(TransferError::Nack),
        }
    }

    fn acknowledge(&mut self, _interrupt: InterruptKind) {
        self.acknowledged += 1;
    }
}
