//! Data path
//!
//! A [`Port`] is the part of a device shared between the management task
//! and interrupt context: the register block, the IER shadow, the FCR value
//! in effect and the RX/TX rings.
//!
//! The bank lock serialises every multi-step register sequence with the
//! interrupt handler, so the handler always finds the bank in normal mode.
//! Lock order is bank, then IER shadow, then rings.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use spin::Mutex;
use uart750_ddk::RegisterIo;

use crate::error::Result;
use crate::ier::IerShadow;
use crate::protocol::{self, Bank};
use crate::regs::{Fcr, Ier, IirSource, Lsr, Reg};
use crate::ring_buffer::RingBuffer;

/// Receive ring capacity
pub const RX_RING: usize = 4096;
/// Transmit ring capacity
pub const TX_RING: usize = 4096;

/// Upper bound on IIR passes per interrupt
const MAX_ISR_PASSES: usize = 32;

/// What one interrupt did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IsrReport {
    /// Bytes moved from RHR into the RX ring
    pub received: usize,
    /// Bytes moved from the TX ring into THR
    pub sent: usize,
    /// Bytes dropped because the RX ring was full
    pub overruns: usize,
    /// Line status interrupts serviced
    pub line_errors: usize,
}

pub struct Port<R: RegisterIo> {
    io: R,
    bank: Mutex<()>,
    ier: IerShadow,
    fcr: AtomicU16,
    open: AtomicBool,
    rx: Mutex<RingBuffer<RX_RING>>,
    tx: Mutex<RingBuffer<TX_RING>>,
}

impl<R: RegisterIo> Port<R> {
    pub fn new(io: R) -> Self {
        Self {
            io,
            bank: Mutex::new(()),
            ier: IerShadow::new(),
            fcr: AtomicU16::new(Fcr::FIFO_EN.bits()),
            open: AtomicBool::new(false),
            rx: Mutex::new(RingBuffer::new()),
            tx: Mutex::new(RingBuffer::new()),
        }
    }

    pub fn io(&self) -> &R {
        &self.io
    }

    pub fn ier(&self) -> &IerShadow {
        &self.ier
    }

    /// Run a register sequence with the interrupt handler held off
    pub fn with_bank<T>(&self, f: impl FnOnce(&R, &IerShadow) -> T) -> T {
        let _bank = self.bank.lock();
        f(&self.io, &self.ier)
    }

    /// FCR value programmed at channel open
    pub fn fcr(&self) -> Fcr {
        Fcr::from_bits_truncate(self.fcr.load(Ordering::Acquire))
    }

    pub fn set_fcr(&self, fcr: Fcr) {
        self.fcr.store(fcr.bits(), Ordering::Release);
    }

    /// True between ChannelOpen and ChannelClose
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub(crate) fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// Queue `data` for transmission, returning how many bytes fit
    ///
    /// Arms the THR interrupt; the handler moves the bytes into the FIFO.
    /// Nothing is queued while the channel is closed.
    pub fn write(&self, data: &[u8]) -> usize {
        if !self.is_open() {
            log::debug!("uart: write on a closed channel");
            return 0;
        }
        let queued = self.tx.lock().push_slice(data);
        if queued > 0 {
            self.with_bank(|io, ier| ier.enable(io, Ier::THR));
        }
        queued
    }

    /// Take received bytes into `buf`
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.rx.lock().pop_slice(buf)
    }

    pub fn rx_pending(&self) -> usize {
        self.rx.lock().len()
    }

    pub fn tx_pending(&self) -> usize {
        self.tx.lock().len()
    }

    /// Drop everything queued in both rings
    pub fn clear_rings(&self) {
        self.rx.lock().clear();
        self.tx.lock().clear();
    }

    /// Interrupt service routine
    ///
    /// Services IIR until nothing is pending: RX and RX timeout drain RHR
    /// into the RX ring, THR refills the TX FIFO from the TX ring and masks
    /// itself once the ring runs dry.
    pub fn service_interrupt(&self) -> Result<IsrReport> {
        let _bank = self.bank.lock();
        let bank = Bank::new(&self.io);
        let mut report = IsrReport::default();

        for _ in 0..MAX_ISR_PASSES {
            let Some(source) = IirSource::decode(bank.read(Reg::Iir)?) else {
                break;
            };
            match source {
                IirSource::Rx | IirSource::RxTimeout => self.drain_rhr(&bank, &mut report)?,
                IirSource::Thr => self.fill_thr(&bank, &mut report)?,
                IirSource::LineStatus => {
                    let lsr = Lsr::from_bits_truncate(bank.read(Reg::Lsr)?);
                    log::warn!("uart: line status {:?}", lsr);
                    report.line_errors += 1;
                }
                IirSource::Modem => {
                    bank.read(Reg::Msr)?;
                }
                IirSource::Other(bits) => {
                    log::warn!("uart: unhandled interrupt source {:#04x}", bits);
                    break;
                }
            }
        }

        log::trace!("uart: isr {:?}", report);
        Ok(report)
    }

    fn drain_rhr(&self, bank: &Bank<'_, R>, report: &mut IsrReport) -> Result<()> {
        let mut rx = self.rx.lock();
        while bank.read_bits(Reg::Lsr, Lsr::RX_FIFO_E.bits())? != 0 {
            let byte = bank.read(Reg::Rhr)? as u8;
            match rx.push(byte) {
                Ok(()) => report.received += 1,
                Err(_) => report.overruns += 1,
            }
        }
        if report.overruns > 0 {
            log::warn!("uart: RX ring full, {} bytes dropped", report.overruns);
        }
        Ok(())
    }

    fn fill_thr(&self, bank: &Bank<'_, R>, report: &mut IsrReport) -> Result<()> {
        let room = protocol::tx_free(bank.io())?;
        let mut tx = self.tx.lock();
        for _ in 0..room {
            match tx.pop() {
                Some(byte) => {
                    bank.write(Reg::Thr, u16::from(byte))?;
                    report.sent += 1;
                }
                None => break,
            }
        }
        if tx.is_empty() {
            self.ier.disable(&self.io, Ier::THR);
        }
        Ok(())
    }
}
