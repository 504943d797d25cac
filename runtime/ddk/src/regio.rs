//! Register Access Layer
//!
//! Direct, synchronous, non-blocking accesses. Nothing is cached here:
//! some registers on the target silicon are write-only or have read side
//! effects, so any shadowing is the caller's business.

/// A 16-bit register space addressed by byte offset
///
/// Accessors take `&self`: the same register block is touched from the
/// management context and from interrupt context, exactly like the
/// hardware it stands for. Implementations must be `Send + Sync`.
pub trait RegisterIo: Send + Sync {
    /// Read the register at `offset`
    fn read(&self, offset: u16) -> u16;

    /// Write `value` to the register at `offset`
    fn write(&self, offset: u16, value: u16);

    /// Set the bits in `mask`, returning the previous value
    fn set_bits(&self, offset: u16, mask: u16) -> u16 {
        let old = self.read(offset);
        self.write(offset, old | mask);
        old
    }

    /// Clear the bits in `mask`, returning the previous value
    fn reset_bits(&self, offset: u16, mask: u16) -> u16 {
        let old = self.read(offset);
        self.write(offset, old & !mask);
        old
    }

    /// Replace the field selected by `mask` with `bits`
    ///
    /// Bits of `bits` outside `mask` are discarded.
    fn write_bits(&self, offset: u16, mask: u16, bits: u16) {
        let old = self.read(offset);
        self.write(offset, (old & !mask) | (bits & mask));
    }

    /// Read the field selected by `mask` (not shifted)
    fn read_bits(&self, offset: u16, mask: u16) -> u16 {
        self.read(offset) & mask
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read(&self, offset: u16) -> u16 {
        (**self).read(offset)
    }

    fn write(&self, offset: u16, value: u16) {
        (**self).write(offset, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RamRegisters;

    #[test]
    fn test_set_and_reset_bits_return_previous() {
        let regs = RamRegisters::new();
        regs.write(0x0C, 0x03);

        assert_eq!(regs.set_bits(0x0C, 0x80), 0x03);
        assert_eq!(regs.read(0x0C), 0x83);

        assert_eq!(regs.reset_bits(0x0C, 0x01), 0x83);
        assert_eq!(regs.read(0x0C), 0x82);
    }

    #[test]
    fn test_write_bits_preserves_outside_mask() {
        let regs = RamRegisters::new();
        regs.write(0x08, 0b1010_0101);

        regs.write_bits(0x08, 0x0F, 0xF3);
        assert_eq!(regs.read(0x08), 0b1010_0011);
        assert_eq!(regs.read_bits(0x08, 0xF0), 0b1010_0000);
    }

    #[test]
    fn test_reference_forwarding() {
        let regs = RamRegisters::new();
        let by_ref = &regs;
        by_ref.write(0x20, 7);
        assert_eq!(regs.read(0x20), 7);
        assert_eq!(regs.write_count(), 1);
    }
}
