//! Interrupt-enable shadow
//!
//! IER is treated as write-only: its contents are never read back. The
//! shadow holds the value last written, and every change updates the
//! cached value and the hardware register under one lock, so a management
//! sequence and the interrupt handler cannot lose each other's updates.
//!
//! IER is a normal-mode register. Callers keep the bank in normal mode
//! around these calls (the port's bank lock guarantees it).

use spin::Mutex;
use uart750_ddk::RegisterIo;

use crate::regs::{resolve, Access, ConfigMode, Ier, Reg};

pub struct IerShadow {
    cached: Mutex<Ier>,
    offset: u16,
}

impl Default for IerShadow {
    fn default() -> Self {
        Self::new()
    }
}

impl IerShadow {
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(Ier::empty()),
            offset: resolve(Reg::Ier, ConfigMode::Normal, Access::Write).unwrap_or(0x04),
        }
    }

    /// Enable the sources in `mask`, returning the new value
    pub fn enable<R: RegisterIo + ?Sized>(&self, io: &R, mask: Ier) -> Ier {
        self.update(io, |ier| ier | mask)
    }

    /// Disable the sources in `mask`, returning the new value
    pub fn disable<R: RegisterIo + ?Sized>(&self, io: &R, mask: Ier) -> Ier {
        self.update(io, |ier| ier - mask)
    }

    /// Mask every source
    pub fn clear<R: RegisterIo + ?Sized>(&self, io: &R) {
        self.update(io, |_| Ier::empty());
    }

    /// Value last written to the hardware
    pub fn value(&self) -> Ier {
        *self.cached.lock()
    }

    fn update<R: RegisterIo + ?Sized>(&self, io: &R, f: impl FnOnce(Ier) -> Ier) -> Ier {
        let mut cached = self.cached.lock();
        let next = f(*cached);
        io.write(self.offset, next.bits());
        *cached = next;
        log::trace!("uart: IER <- {:#04x}", next.bits());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uart750_ddk::mock::RamRegisters;

    #[test]
    fn test_shadow_tracks_hardware_writes() {
        let regs = RamRegisters::new();
        let ier = IerShadow::new();

        assert_eq!(ier.enable(&regs, Ier::RHR), Ier::RHR);
        assert_eq!(ier.enable(&regs, Ier::THR), Ier::RHR | Ier::THR);
        assert_eq!(regs.read(0x04), 0x03);

        assert_eq!(ier.disable(&regs, Ier::RHR), Ier::THR);
        assert_eq!(regs.read(0x04), 0x02);

        ier.clear(&regs);
        assert_eq!(ier.value(), Ier::empty());
        assert_eq!(regs.read(0x04), 0);
        assert_eq!(regs.write_count(), 4);
    }

    #[test]
    fn test_shadow_never_reads_back() {
        let regs = RamRegisters::new();
        let ier = IerShadow::new();
        ier.enable(&regs, Ier::LINE_STS);

        // Hardware value diverging from the shadow does not leak back in.
        regs.write(0x04, 0xFF);
        assert_eq!(ier.enable(&regs, Ier::RHR), Ier::LINE_STS | Ier::RHR);
        assert_eq!(regs.read(0x04), (Ier::LINE_STS | Ier::RHR).bits());
    }
}
