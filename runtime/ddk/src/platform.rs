//! Platform collaborator
//!
//! Clock gating, device tree / hwmod lookup and DMA channel allocation are
//! platform concerns. Drivers only see the two capabilities below.

use crate::regio::RegisterIo;
use crate::Result;

/// Direction of a DMA transfer, seen from memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    /// Memory to device (TX)
    ToDevice,
    /// Device to memory (RX)
    FromDevice,
}

/// A DMA transfer request for the channel bound to a UART
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRequest {
    pub direction: DmaDirection,
    /// Transfer length in bytes
    pub len: usize,
}

/// Platform services a UART driver depends on
pub trait Platform {
    /// Register block handed out for a UART
    type Io: RegisterIo;

    /// Obtain the I/O handle for `uart_id`
    ///
    /// # Errors
    /// `DeviceNotFound` if the platform has no such UART, `MmioMapping`
    /// if its register window cannot be mapped.
    fn open(&mut self, uart_id: u32) -> Result<Self::Io>;

    /// Start a DMA transfer on the channel bound to `uart_id`
    ///
    /// # Errors
    /// `DmaUnavailable` if the UART has no channel, `DmaTransfer` if the
    /// engine refused the request.
    fn start_dma(&mut self, uart_id: u32, request: DmaRequest) -> Result<()>;

    /// Release whatever `open` acquired. The I/O handle has already been
    /// dropped when this runs.
    fn close(&mut self, _uart_id: u32) {}
}
