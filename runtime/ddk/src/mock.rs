//! RAM-backed register file
//!
//! Plain storage with no device semantics: every offset reads back what
//! was last written. Good enough for exercising the access layer; the
//! driver crate carries a behavioural UART model for everything else.

use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::regio::RegisterIo;

/// Bytes of register space covered by the mock
pub const MOCK_SPAN: usize = 0x100;

/// Register file backed by an array
pub struct RamRegisters {
    cells: Mutex<[u16; MOCK_SPAN / 2]>,
    writes: AtomicUsize,
}

impl Default for RamRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RamRegisters {
    /// Create a register file with every register reading zero
    pub const fn new() -> Self {
        Self {
            cells: Mutex::new([0; MOCK_SPAN / 2]),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of writes performed so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl RegisterIo for RamRegisters {
    fn read(&self, offset: u16) -> u16 {
        self.cells.lock()[offset as usize / 2]
    }

    fn write(&self, offset: u16, value: u16) {
        self.cells.lock()[offset as usize / 2] = value;
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}
