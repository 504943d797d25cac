//! Driver Development Kit - runtime support for UART drivers
//!
//! # Purpose
//! Everything a register-level driver needs from below, and nothing it
//! should own itself:
//! - [`RegisterIo`]: synchronous read/modify/write primitives over a
//!   16-bit register space, including masked set/reset helpers
//! - [`MmioRegion`]: the volatile memory-mapped implementation
//! - [`Platform`]: the collaborator that hands out I/O handles and starts
//!   DMA transfers (clocking, device tree lookup and DMA channel
//!   allocation stay behind it)
//!
//! # Integration Points
//! - Depends on: nothing but `core`
//! - Provides to: `uart750-driver`
//!
//! # Testing Strategy
//! - Unit tests: masked register helpers against the `mock` register file
//! - Hardware sim tests: live in the driver crate

#![no_std]

#[cfg(test)]
extern crate std;

mod mmio;
mod platform;
mod regio;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use mmio::MmioRegion;
pub use platform::{DmaDirection, DmaRequest, Platform};
pub use regio::RegisterIo;

use thiserror::Error;

/// Platform and bus errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("no UART with id {uart_id}")]
    DeviceNotFound { uart_id: u32 },

    #[error("MMIO mapping failed for UART {uart_id}")]
    MmioMapping { uart_id: u32 },

    #[error("no DMA channel bound to UART {uart_id}")]
    DmaUnavailable { uart_id: u32 },

    #[error("DMA transfer of {len} bytes on UART {uart_id} failed")]
    DmaTransfer { uart_id: u32, len: usize },
}

pub type Result<T> = core::result::Result<T, DriverError>;
