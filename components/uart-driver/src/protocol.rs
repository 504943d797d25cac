//! Mode-switch protocol engine
//!
//! # Purpose
//! Turns line settings, FIFO/DMA thresholds and reset requests into the
//! ordered register sequences the 16C750 needs. Several of those registers
//! are only reachable in CONFIG_A or CONFIG_B, and the same addresses mean
//! something else in normal mode.
//!
//! # Architecture
//! - [`Bank`] tracks the configuration mode the hardware is in (derived
//!   from LCR when the bank is opened, then from every LCR write) and
//!   resolves named registers through the register table, so a register
//!   used in the wrong mode is an error instead of a stray write.
//! - [`ModeGuard`] saves LCR and writes it back when dropped. Every
//!   exported operation that leaves normal mode does so under a guard, so
//!   the mode is restored on error paths as well.
//!
//! Every operation here is mode-neutral: the configuration mode seen before
//! and after the call is the same.
//!
//! # Concurrency
//! Nothing here blocks. Soft reset polls a bounded number of times; the RX
//! flush drains until the hardware stops reporting receive interrupts.

use core::cell::Cell;

use uart750_ddk::RegisterIo;

use crate::baud::{self, BaudEntry};
use crate::descriptor::{DataBits, Parity, ProtocolDescriptor, StopBits};
use crate::error::{Result, UartError};
use crate::ier::IerShadow;
use crate::regs::{
    resolve, Access, ConfigMode, Efr, Fcr, Ier, IirSource, Lcr, Mcr, Mdr1, Reg, Scr, Sysc, Syss,
    UartMode, FIFO_DEPTH, LCR_CHAR_8, LCR_OFFSET, SCR_DMA_MODE_2_SHIFT, TLR_RX_SHIFT,
    TLR_TX_SHIFT,
};

/// Polls of SYSS.RESETDONE before a soft reset is declared failed
pub const SOFT_RESET_POLLS: u32 = 1000;

/// DMA trigger levels and DMA mode programmed by [`init_fifo_and_dma`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoSettings {
    /// RX DMA trigger level (TLR[7:4])
    pub rx_trigger: u8,
    /// TX DMA trigger level (TLR[3:0])
    pub tx_trigger: u8,
    /// SCR DMA mode (0..=3); `None` leaves DMA off
    pub dma_mode: Option<u8>,
}

impl Default for FifoSettings {
    fn default() -> Self {
        Self {
            rx_trigger: 8,
            tx_trigger: 8,
            dma_mode: None,
        }
    }
}

/// Register bank view that knows its configuration mode
pub struct Bank<'a, R: RegisterIo + ?Sized> {
    io: &'a R,
    lcr: Cell<u16>,
}

impl<'a, R: RegisterIo + ?Sized> Bank<'a, R> {
    /// Open a bank, reading LCR to learn the current mode
    pub fn new(io: &'a R) -> Self {
        let lcr = io.read(LCR_OFFSET);
        Self {
            io,
            lcr: Cell::new(lcr),
        }
    }

    pub fn io(&self) -> &'a R {
        self.io
    }

    pub fn mode(&self) -> ConfigMode {
        ConfigMode::from_lcr(self.lcr.get())
    }

    /// LCR value last read or written
    pub fn lcr(&self) -> u16 {
        self.lcr.get()
    }

    fn offset(&self, reg: Reg, access: Access) -> Result<u16> {
        let mode = self.mode();
        resolve(reg, mode, access).ok_or(UartError::RegisterUnavailable { reg, mode, access })
    }

    pub fn read(&self, reg: Reg) -> Result<u16> {
        Ok(self.io.read(self.offset(reg, Access::Read)?))
    }

    pub fn write(&self, reg: Reg, value: u16) -> Result<()> {
        let offset = self.offset(reg, Access::Write)?;
        log::trace!("uart: {:?} <- {:#06x} ({:?})", reg, value, self.mode());
        self.io.write(offset, value);
        if reg == Reg::Lcr {
            self.lcr.set(value);
        }
        Ok(())
    }

    /// Set `mask` in `reg`, returning the previous value
    pub fn set_bits(&self, reg: Reg, mask: u16) -> Result<u16> {
        let old = self.read(reg)?;
        self.write(reg, old | mask)?;
        Ok(old)
    }

    /// Clear `mask` in `reg`, returning the previous value
    pub fn reset_bits(&self, reg: Reg, mask: u16) -> Result<u16> {
        let old = self.read(reg)?;
        self.write(reg, old & !mask)?;
        Ok(old)
    }

    /// Replace the `mask` field of `reg` with `bits`
    pub fn write_bits(&self, reg: Reg, mask: u16, bits: u16) -> Result<()> {
        let old = self.read(reg)?;
        self.write(reg, (old & !mask) | (bits & mask))
    }

    pub fn read_bits(&self, reg: Reg, mask: u16) -> Result<u16> {
        Ok(self.read(reg)? & mask)
    }

    /// Switch to `mode` by writing its LCR value
    pub fn enter(&self, mode: ConfigMode) -> Result<()> {
        self.write(Reg::Lcr, mode.lcr_value())
    }

    /// Save LCR; it is written back when the guard drops
    pub fn guard(&self) -> ModeGuard<'_, 'a, R> {
        ModeGuard {
            bank: self,
            saved: self.lcr.get(),
        }
    }
}

/// Restores a saved LCR value on drop
#[must_use = "the mode is restored when the guard is dropped"]
pub struct ModeGuard<'b, 'a, R: RegisterIo + ?Sized> {
    bank: &'b Bank<'a, R>,
    saved: u16,
}

impl<R: RegisterIo + ?Sized> ModeGuard<'_, '_, R> {
    /// The LCR value that will be restored
    pub fn saved(&self) -> u16 {
        self.saved
    }
}

impl<R: RegisterIo + ?Sized> Drop for ModeGuard<'_, '_, R> {
    fn drop(&mut self) {
        if self.bank.lcr.get() != self.saved {
            self.bank.io.write(LCR_OFFSET, self.saved);
            self.bank.lcr.set(self.saved);
        }
    }
}

/// Reset the module and wait for SYSS.RESETDONE
///
/// Busy-polls up to [`SOFT_RESET_POLLS`] times without delay; safe to call
/// where sleeping is not allowed. The reset puts LCR back to its power-on
/// value, i.e. normal mode.
///
/// # Errors
/// `HardwareTimeout` if the module never reports completion.
pub fn soft_reset<R: RegisterIo + ?Sized>(io: &R) -> Result<()> {
    let bank = Bank::new(io);
    bank.set_bits(Reg::Sysc, Sysc::SOFTRESET.bits())?;

    for _ in 0..SOFT_RESET_POLLS {
        if bank.read_bits(Reg::Syss, Syss::RESETDONE.bits())? != 0 {
            log::debug!("uart: soft reset done");
            return Ok(());
        }
    }

    log::error!("uart: soft reset timed out after {} polls", SOFT_RESET_POLLS);
    Err(UartError::HardwareTimeout {
        polls: SOFT_RESET_POLLS,
    })
}

/// Set or clear EFR.ENHANCED_EN
pub fn set_enhanced_mode<R: RegisterIo + ?Sized>(io: &R, enable: bool) -> Result<()> {
    let bank = Bank::new(io);
    let _mode = bank.guard();

    bank.enter(ConfigMode::B)?;
    if enable {
        bank.set_bits(Reg::Efr, Efr::ENHANCED_EN.bits())?;
    } else {
        bank.reset_bits(Reg::Efr, Efr::ENHANCED_EN.bits())?;
    }
    log::debug!("uart: enhanced mode {}", if enable { "on" } else { "off" });
    Ok(())
}

/// Program DMA trigger levels, enable and clear the FIFOs
///
/// Zeroes the divisor latches on the way, so the line rate has to be
/// programmed again afterwards.
///
/// # Returns
/// The FCR value now in effect (without the self-clearing bits). FCR is
/// write-only; flushes reuse this value.
pub fn init_fifo_and_dma<R: RegisterIo + ?Sized>(io: &R, fifo: &FifoSettings) -> Result<Fcr> {
    let bank = Bank::new(io);
    let _mode = bank.guard();

    bank.enter(ConfigMode::B)?;
    let efr = bank.set_bits(Reg::Efr, Efr::ENHANCED_EN.bits())?;

    bank.enter(ConfigMode::A)?;
    // FCR[5:4] and FCR[7:6] are only written while the divisor is zero.
    bank.write(Reg::Dll, 0)?;
    bank.write(Reg::Dlh, 0)?;
    let mcr = bank.set_bits(Reg::Mcr, Mcr::TCR_TLR.bits())?;

    bank.enter(ConfigMode::B)?;
    let tlr = (u16::from(fifo.rx_trigger & 0x0F) << TLR_RX_SHIFT)
        | (u16::from(fifo.tx_trigger & 0x0F) << TLR_TX_SHIFT);
    bank.write(Reg::Tlr, tlr)?;

    bank.enter(ConfigMode::A)?;
    bank.write(Reg::Scr, 0)?;

    // The granularity bits are not honoured in this combined write (silicon
    // erratum); trigger levels come from TLR alone.
    let mut fcr = Fcr::FIFO_EN;
    if fifo.dma_mode.is_some() {
        fcr |= Fcr::DMA_MODE;
    }
    bank.write(
        Reg::Fcr,
        (fcr | Fcr::RX_FIFO_CLEAR | Fcr::TX_FIFO_CLEAR).bits(),
    )?;

    if let Some(dma) = fifo.dma_mode {
        let scr = Scr::DMA_MODE_CTL.bits() | (u16::from(dma & 0x03) << SCR_DMA_MODE_2_SHIFT);
        bank.write(Reg::Scr, scr)?;
    }

    bank.enter(ConfigMode::B)?;
    bank.write(Reg::Efr, efr)?;

    bank.enter(ConfigMode::A)?;
    bank.write(Reg::Mcr, mcr)?;

    log::debug!(
        "uart: FIFO on, TLR {:#04x}, DMA {:?}",
        tlr,
        fifo.dma_mode
    );
    Ok(fcr)
}

/// Program the line settings in `desc`
///
/// Every field that can be applied is applied. Unsupported parity, data
/// bits or stop bits are replaced by their defaults and a baud rate missing
/// from `table` leaves the divisor untouched; those are logged and the last
/// one is returned once the whole sequence has run. A baud rate with no
/// UART mode aborts the final step, leaving the UART disabled.
///
/// Expects the bank in normal mode, and leaves it there. IER is zeroed and
/// then left with only the RX interrupt enabled.
///
/// # Errors
/// A soft error (see [`UartError::is_soft`]) if some field was coerced or
/// skipped, `UnsupportedMode` if the rate has no UART mode.
pub fn set_protocol<R: RegisterIo + ?Sized>(
    io: &R,
    ier: &IerShadow,
    table: &[BaudEntry],
    desc: &ProtocolDescriptor,
) -> Result<()> {
    let bank = Bank::new(io);
    let mut last_error = None;
    let mut soft = |err: UartError| {
        log::warn!("uart: {}", err);
        last_error = Some(err);
    };

    // Divisor latches are only safe to touch with the UART disabled.
    bank.write_bits(Reg::Mdr1, Mdr1::MODE_SELECT.bits(), UartMode::Disable.bits())?;

    let efr = {
        let _mode = bank.guard();
        bank.enter(ConfigMode::B)?;
        bank.set_bits(Reg::Efr, Efr::ENHANCED_EN.bits())?
    };

    ier.clear(io);

    let found = match baud::lookup(table, desc.baud_rate) {
        Ok(found) => Some(found),
        Err(err) => {
            soft(err);
            None
        }
    };

    if let Some((_, divisor)) = found {
        let _mode = bank.guard();
        bank.enter(ConfigMode::B)?;
        bank.write(Reg::Dll, divisor & 0xFF)?;
        bank.write(Reg::Dlh, divisor >> 8)?;
    }

    ier.enable(io, Ier::RHR);

    {
        let _mode = bank.guard();
        bank.enter(ConfigMode::B)?;
        bank.write(Reg::Efr, efr)?;
    }

    bank.reset_bits(Reg::Lcr, (Lcr::BREAK_EN | Lcr::DIV_EN).bits())?;

    let (parity, err) = desc.parity.coerce();
    if let Some(err) = err {
        soft(err);
    }
    let parity_bits = match parity {
        Parity::Even => Lcr::PARITY_EN | Lcr::PARITY_TYPE1,
        Parity::Odd => Lcr::PARITY_EN,
        _ => Lcr::empty(),
    };
    bank.write_bits(
        Reg::Lcr,
        (Lcr::PARITY_EN | Lcr::PARITY_TYPE1).bits(),
        parity_bits.bits(),
    )?;

    let (data_bits, err) = desc.data_bits.coerce();
    if let Some(err) = err {
        soft(err);
    }
    debug_assert_eq!(data_bits, DataBits::Eight);
    bank.write_bits(Reg::Lcr, Lcr::CHAR_LENGTH.bits(), LCR_CHAR_8)?;

    // 1.5 stop bits follow the requested width, not the coerced one.
    let (stop_bits, err) = desc.stop_bits.coerce(desc.data_bits);
    if let Some(err) = err {
        soft(err);
    }
    let stop = match stop_bits {
        StopBits::Two | StopBits::OnePointFive => Lcr::NB_STOP,
        _ => Lcr::empty(),
    };
    bank.write_bits(Reg::Lcr, Lcr::NB_STOP.bits(), stop.bits())?;

    let (mode, _) = found.ok_or(UartError::UnsupportedMode {
        baud: desc.baud_rate,
    })?;
    bank.write_bits(Reg::Mdr1, Mdr1::MODE_SELECT.bits(), mode.bits())?;

    log::info!(
        "uart: protocol {} baud, {:?} parity, {:?} data, {:?} stop ({:?})",
        desc.baud_rate,
        parity,
        data_bits,
        stop_bits,
        mode
    );

    match last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Bytes waiting in the RX FIFO
pub fn rx_occupied<R: RegisterIo + ?Sized>(io: &R) -> Result<u16> {
    Bank::new(io).read(Reg::RxfifoLvl)
}

/// Free slots in the TX FIFO
pub fn tx_free<R: RegisterIo + ?Sized>(io: &R) -> Result<u16> {
    let level = Bank::new(io).read(Reg::TxfifoLvl)?;
    Ok(FIFO_DEPTH.saturating_sub(level))
}

/// Clear the TX FIFO
///
/// `fcr` is the value programmed by [`init_fifo_and_dma`]; FCR cannot be
/// read back.
pub fn flush_tx<R: RegisterIo + ?Sized>(io: &R, fcr: Fcr) -> Result<()> {
    Bank::new(io).write(Reg::Fcr, (fcr | Fcr::TX_FIFO_CLEAR).bits())
}

/// Clear the RX FIFO and drain pending receive interrupts
///
/// Reads RHR until IIR no longer reports RX or RX timeout. The loop is
/// bounded by the hardware converging, not by a count: a wedged UART that
/// keeps reporting RX spins here.
///
/// # Returns
/// Number of bytes discarded by the drain.
pub fn flush_rx<R: RegisterIo + ?Sized>(io: &R, fcr: Fcr) -> Result<usize> {
    let bank = Bank::new(io);
    bank.write(Reg::Fcr, (fcr | Fcr::RX_FIFO_CLEAR).bits())?;

    let mut drained = 0;
    while let Some(IirSource::Rx | IirSource::RxTimeout) = IirSource::decode(bank.read(Reg::Iir)?) {
        bank.read(Reg::Rhr)?;
        drained += 1;
    }
    if drained > 0 {
        log::debug!("uart: RX flush drained {} bytes", drained);
    }
    Ok(drained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uart750_ddk::mock::RamRegisters;

    #[test]
    fn test_bank_tracks_mode_through_lcr_writes() {
        let regs = RamRegisters::new();
        regs.write(LCR_OFFSET, 0x03);
        let bank = Bank::new(&regs);
        assert_eq!(bank.mode(), ConfigMode::Normal);

        bank.enter(ConfigMode::B).unwrap();
        assert_eq!(bank.mode(), ConfigMode::B);
        assert_eq!(regs.read(LCR_OFFSET), 0xBF);

        bank.reset_bits(Reg::Lcr, Lcr::DIV_EN.bits()).unwrap();
        assert_eq!(bank.mode(), ConfigMode::Normal);
    }

    #[test]
    fn test_bank_rejects_register_outside_mode() {
        let regs = RamRegisters::new();
        let bank = Bank::new(&regs);

        let err = bank.write(Reg::Efr, 0x10).unwrap_err();
        assert!(matches!(
            err,
            UartError::RegisterUnavailable {
                reg: Reg::Efr,
                mode: ConfigMode::Normal,
                access: Access::Write
            }
        ));
        assert_eq!(regs.write_count(), 0);
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn fails_in_mode_b<R: RegisterIo>(io: &R) -> Result<()> {
            let bank = Bank::new(io);
            let _mode = bank.guard();
            bank.enter(ConfigMode::B)?;
            bank.write(Reg::Ier, 0)?;
            Ok(())
        }

        let regs = RamRegisters::new();
        regs.write(LCR_OFFSET, 0x1B);
        assert!(fails_in_mode_b(&regs).is_err());
        assert_eq!(regs.read(LCR_OFFSET), 0x1B);
    }

    #[test]
    fn test_guard_skips_redundant_write() {
        let regs = RamRegisters::new();
        let bank = Bank::new(&regs);
        {
            let guard = bank.guard();
            assert_eq!(guard.saved(), 0);
        }
        assert_eq!(regs.write_count(), 0);
    }

    #[test]
    fn test_tx_free_from_level() {
        let regs = RamRegisters::new();
        regs.write(0x68, 10);
        regs.write(0x64, 3);
        assert_eq!(tx_free(&regs).unwrap(), FIFO_DEPTH - 10);
        assert_eq!(rx_occupied(&regs).unwrap(), 3);
    }
}
