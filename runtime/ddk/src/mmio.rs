//! Memory-mapped register block
//!
//! Volatile 16-bit accesses into a mapped device window. The window is
//! obtained from the [`Platform`](crate::Platform); this type only knows
//! its base and size.

use crate::regio::RegisterIo;

/// MMIO register accessor
pub struct MmioRegion {
    base: usize,
    size: usize,
}

impl MmioRegion {
    /// Create a new MMIO region
    ///
    /// # Safety
    /// `base..base + size` must be a mapped, uncached device window that
    /// stays mapped for the lifetime of the returned value.
    pub const unsafe fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Get base address
    pub fn base(&self) -> usize {
        self.base
    }

    /// Get size
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn addr(&self, offset: u16) -> usize {
        let offset = offset as usize;
        debug_assert!(offset + 2 <= self.size, "register offset {:#x} outside window", offset);
        debug_assert!(offset % 2 == 0);
        self.base + offset
    }
}

impl RegisterIo for MmioRegion {
    #[inline]
    fn read(&self, offset: u16) -> u16 {
        // SAFETY: `new` guarantees the window is mapped; `addr` checks the
        // offset stays inside it in debug builds.
        unsafe { core::ptr::read_volatile(self.addr(offset) as *const u16) }
    }

    #[inline]
    fn write(&self, offset: u16, value: u16) {
        // SAFETY: as for `read`.
        unsafe { core::ptr::write_volatile(self.addr(offset) as *mut u16, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_region_bounds() {
        let region = unsafe { MmioRegion::new(0x4802_2000, 0x1000) };
        assert_eq!(region.base(), 0x4802_2000);
        assert_eq!(region.size(), 0x1000);
    }

    #[test]
    fn test_mmio_region_over_ram() {
        let mut window = [0u16; 0x48];
        let region = unsafe { MmioRegion::new(window.as_mut_ptr() as usize, window.len() * 2) };

        region.write(0x0C, 0xBF);
        assert_eq!(region.read(0x0C), 0xBF);
        assert_eq!(region.set_bits(0x08, 0x10), 0);
        assert_eq!(region.read(0x08), 0x10);
        drop(region);
        assert_eq!(window[0x0C / 2], 0xBF);
    }
}
