//! Behavioural 16C750 model
//!
//! # Purpose
//! Lets the whole driver run on a host. The model decodes every access
//! through the register table with the configuration mode currently
//! selected by LCR, so a sequence that writes EFR in normal mode really
//! lands in FCR, exactly as on silicon.
//!
//! Modelled:
//! - mode-dependent register personalities, including the TCR/TLR gate
//! - soft reset: SYSC.SOFTRESET resets the module, SYSS.RESETDONE comes up
//!   after a few polls (or never, see [`SimUart::stall_reset`])
//! - RX and TX FIFOs with level registers, FCR clears (honoured only with
//!   FIFO_EN set) and LSR flags
//! - IIR priority for the RX and THR sources, gated by IER
//!
//! Every write is logged with the mode in effect, so tests can assert on
//! ordering.
//!
//! [`SimPlatform`] hands out simulated UARTs through the [`Platform`]
//! trait and records DMA requests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use spin::Mutex;
use uart750_ddk::{DmaRequest, DriverError, Platform, RegisterIo};

use crate::regs::{
    decode, Access, ConfigMode, Efr, Fcr, Ier, IirSource, Lsr, Mcr, Reg, Sysc, Syss, UartMode,
    FIFO_DEPTH, LCR_OFFSET,
};

/// Polls of SYSS before a soft reset reports completion
const RESET_LATENCY: u32 = 3;

/// A logged register write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub offset: u16,
    pub value: u16,
    /// Mode selected when the write happened
    pub mode: ConfigMode,
    /// Register the write reached, if any
    pub reg: Option<Reg>,
}

#[derive(Debug)]
struct SimState {
    regs: BTreeMap<Reg, u16>,
    rx: VecDeque<u8>,
    tx: VecDeque<u8>,
    wire: Vec<u8>,
    last_fcr: Option<u16>,
    reset_countdown: Option<u32>,
    stall_reset: bool,
    log: Vec<WriteRecord>,
}

impl SimState {
    fn new() -> Self {
        let mut state = Self {
            regs: BTreeMap::new(),
            rx: VecDeque::new(),
            tx: VecDeque::new(),
            wire: Vec::new(),
            last_fcr: None,
            reset_countdown: None,
            stall_reset: false,
            log: Vec::new(),
        };
        state.power_on();
        state
    }

    fn power_on(&mut self) {
        self.regs.clear();
        self.regs.insert(Reg::Mdr1, UartMode::Disable.bits());
        self.regs.insert(Reg::Syss, Syss::RESETDONE.bits());
        self.regs.insert(Reg::Mvr, 0x0050);
        self.rx.clear();
        self.tx.clear();
    }

    fn get(&self, reg: Reg) -> u16 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    fn mode(&self) -> ConfigMode {
        ConfigMode::from_lcr(self.get(Reg::Lcr))
    }

    fn tcr_tlr_gate(&self) -> bool {
        self.get(Reg::Efr) & Efr::ENHANCED_EN.bits() != 0
            && self.get(Reg::Mcr) & Mcr::TCR_TLR.bits() != 0
    }

    fn iir(&self) -> u16 {
        let ier = Ier::from_bits_truncate(self.get(Reg::Ier));
        if ier.contains(Ier::RHR) && !self.rx.is_empty() {
            IirSource::Rx.iir_value()
        } else if ier.contains(Ier::THR) && self.tx.is_empty() {
            IirSource::Thr.iir_value()
        } else {
            IirSource::NONE_PENDING
        }
    }

    fn lsr(&self) -> u16 {
        let mut lsr = Lsr::empty();
        if !self.rx.is_empty() {
            lsr |= Lsr::RX_FIFO_E;
        }
        if self.tx.is_empty() {
            lsr |= Lsr::TX_FIFO_E | Lsr::TX_SR_E;
        }
        lsr.bits()
    }

    fn read(&mut self, offset: u16) -> u16 {
        let Some(reg) = decode(offset, self.mode(), Access::Read, self.tcr_tlr_gate()) else {
            return 0;
        };
        match reg {
            Reg::Rhr => self.rx.pop_front().map_or(0, u16::from),
            Reg::Iir => self.iir(),
            Reg::Lsr => self.lsr(),
            Reg::RxfifoLvl => self.rx.len() as u16,
            Reg::TxfifoLvl => self.tx.len() as u16,
            Reg::Syss => self.poll_reset(),
            other => self.get(other),
        }
    }

    fn poll_reset(&mut self) -> u16 {
        match self.reset_countdown {
            Some(_) if self.stall_reset => 0,
            Some(0) => {
                self.reset_countdown = None;
                Syss::RESETDONE.bits()
            }
            Some(n) => {
                self.reset_countdown = Some(n - 1);
                0
            }
            None => Syss::RESETDONE.bits(),
        }
    }

    fn write(&mut self, offset: u16, value: u16) {
        let mode = self.mode();
        let reg = decode(offset, mode, Access::Write, self.tcr_tlr_gate());
        self.log.push(WriteRecord {
            offset,
            value,
            mode,
            reg,
        });

        match reg {
            Some(Reg::Thr) => {
                if self.tx.len() < usize::from(FIFO_DEPTH) {
                    self.tx.push_back(value as u8);
                }
            }
            Some(Reg::Fcr) => {
                // Clear bits only act with the FIFOs enabled.
                let fcr = Fcr::from_bits_truncate(value);
                if fcr.contains(Fcr::FIFO_EN | Fcr::RX_FIFO_CLEAR) {
                    self.rx.clear();
                }
                if fcr.contains(Fcr::FIFO_EN | Fcr::TX_FIFO_CLEAR) {
                    self.tx.clear();
                }
                self.last_fcr = Some(value);
            }
            Some(Reg::Sysc) if value & Sysc::SOFTRESET.bits() != 0 => {
                self.power_on();
                self.regs.insert(Reg::Sysc, value & !Sysc::SOFTRESET.bits());
                self.reset_countdown = Some(RESET_LATENCY);
            }
            Some(reg) => {
                self.regs.insert(reg, value);
            }
            None => {}
        }
    }
}

/// Simulated UART register block
///
/// Cheap to clone; clones share the same device.
#[derive(Clone)]
pub struct SimUart {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl SimUart {
    /// A UART in its power-on state
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new())),
        }
    }

    /// Current value of `reg` as the hardware holds it, without side effects
    pub fn peek(&self, reg: Reg) -> u16 {
        self.state.lock().get(reg)
    }

    /// Force `reg` to `value` without logging
    pub fn poke(&self, reg: Reg, value: u16) {
        self.state.lock().regs.insert(reg, value);
    }

    pub fn mode(&self) -> ConfigMode {
        self.state.lock().mode()
    }

    /// Divisor latch contents
    pub fn divisor(&self) -> u16 {
        let state = self.state.lock();
        (state.get(Reg::Dlh) << 8) | (state.get(Reg::Dll) & 0xFF)
    }

    pub fn uart_mode(&self) -> UartMode {
        UartMode::from_bits(self.peek(Reg::Mdr1))
    }

    /// Last value written to FCR
    pub fn last_fcr(&self) -> Option<u16> {
        self.state.lock().last_fcr
    }

    /// Every write since creation or the last [`clear_log`](Self::clear_log)
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().log.clone()
    }

    /// Writes that reached `reg`
    pub fn writes_to(&self, reg: Reg) -> Vec<WriteRecord> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|w| w.reg == Some(reg))
            .copied()
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }

    /// Bytes arriving on the line
    pub fn receive(&self, bytes: &[u8]) {
        let mut state = self.state.lock();
        for &byte in bytes {
            if state.rx.len() < usize::from(FIFO_DEPTH) {
                state.rx.push_back(byte);
            }
        }
    }

    /// Shift the TX FIFO out onto the line
    pub fn shift_out(&self) -> usize {
        let mut state = self.state.lock();
        let sent: Vec<u8> = state.tx.drain(..).collect();
        state.wire.extend_from_slice(&sent);
        sent.len()
    }

    /// Everything transmitted so far
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.lock().wire.clone()
    }

    /// Make SYSS.RESETDONE never come up after a soft reset
    pub fn stall_reset(&self, stall: bool) {
        self.state.lock().stall_reset = stall;
    }
}

impl RegisterIo for SimUart {
    fn read(&self, offset: u16) -> u16 {
        self.state.lock().read(offset)
    }

    fn write(&self, offset: u16, value: u16) {
        if offset == LCR_OFFSET {
            log::trace!("sim: LCR <- {:#04x}", value);
        }
        self.state.lock().write(offset, value);
    }
}

/// Simulated platform
#[derive(Default)]
pub struct SimPlatform {
    uarts: BTreeMap<u32, SimUart>,
    dma_channels: BTreeSet<u32>,
    dma_log: Vec<(u32, DmaRequest)>,
    closed: Vec<u32>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a UART, returning a handle sharing its state
    pub fn add_uart(&mut self, uart_id: u32) -> SimUart {
        self.uarts.entry(uart_id).or_default().clone()
    }

    /// Bind a DMA channel to `uart_id`
    pub fn add_dma_channel(&mut self, uart_id: u32) {
        self.dma_channels.insert(uart_id);
    }

    pub fn uart(&self, uart_id: u32) -> Option<SimUart> {
        self.uarts.get(&uart_id).cloned()
    }

    pub fn dma_requests(&self) -> &[(u32, DmaRequest)] {
        &self.dma_log
    }

    /// UART ids released through [`Platform::close`]
    pub fn closed(&self) -> &[u32] {
        &self.closed
    }
}

impl Platform for SimPlatform {
    type Io = SimUart;

    fn open(&mut self, uart_id: u32) -> uart750_ddk::Result<SimUart> {
        self.uart(uart_id)
            .ok_or(DriverError::DeviceNotFound { uart_id })
    }

    fn start_dma(&mut self, uart_id: u32, request: DmaRequest) -> uart750_ddk::Result<()> {
        if !self.dma_channels.contains(&uart_id) {
            return Err(DriverError::DmaUnavailable { uart_id });
        }
        self.dma_log.push((uart_id, request));
        Ok(())
    }

    fn close(&mut self, uart_id: u32) {
        self.closed.push(uart_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::resolve;

    fn offset(reg: Reg, mode: ConfigMode, access: Access) -> u16 {
        resolve(reg, mode, access).unwrap()
    }

    #[test]
    fn test_offset_zero_personalities() {
        let uart = SimUart::new();
        uart.write(LCR_OFFSET, ConfigMode::B.lcr_value());
        uart.write(0x00, 0x39);
        uart.write(LCR_OFFSET, 0x03);
        uart.write(0x00, b'x' as u16);

        assert_eq!(uart.peek(Reg::Dll), 0x39);
        assert_eq!(uart.shift_out(), 1);
        assert_eq!(uart.transmitted(), b"x");

        let log = uart.writes();
        assert_eq!(log[1].reg, Some(Reg::Dll));
        assert_eq!(log[1].mode, ConfigMode::B);
        assert_eq!(log[3].reg, Some(Reg::Thr));
    }

    #[test]
    fn test_tlr_needs_gate() {
        let uart = SimUart::new();
        let tlr = offset(Reg::Tlr, ConfigMode::Normal, Access::Write);

        uart.write(tlr, 0x11);
        assert_eq!(uart.peek(Reg::Spr), 0x11);
        assert_eq!(uart.peek(Reg::Tlr), 0);

        uart.poke(Reg::Efr, Efr::ENHANCED_EN.bits());
        uart.poke(Reg::Mcr, Mcr::TCR_TLR.bits());
        uart.write(tlr, 0x22);
        assert_eq!(uart.peek(Reg::Tlr), 0x22);
    }

    #[test]
    fn test_soft_reset_handshake() {
        let uart = SimUart::new();
        let sysc = offset(Reg::Sysc, ConfigMode::Normal, Access::Write);
        let syss = offset(Reg::Syss, ConfigMode::Normal, Access::Read);

        uart.write(LCR_OFFSET, 0xBF);
        uart.write(sysc, Sysc::SOFTRESET.bits());
        assert_eq!(uart.mode(), ConfigMode::Normal);

        let polls = (0..10).take_while(|_| uart.read(syss) == 0).count();
        assert_eq!(polls as u32, RESET_LATENCY);
    }

    #[test]
    fn test_iir_follows_ier_and_fifo() {
        let uart = SimUart::new();
        let iir = offset(Reg::Iir, ConfigMode::Normal, Access::Read);
        let ier = offset(Reg::Ier, ConfigMode::Normal, Access::Write);

        uart.receive(b"ab");
        assert_eq!(uart.read(iir), IirSource::NONE_PENDING);
        uart.write(ier, Ier::RHR.bits());
        assert_eq!(IirSource::decode(uart.read(iir)), Some(IirSource::Rx));

        uart.write(0x08, Fcr::RX_FIFO_CLEAR.bits());
        assert_eq!(IirSource::decode(uart.read(iir)), Some(IirSource::Rx));
        uart.write(0x08, (Fcr::FIFO_EN | Fcr::RX_FIFO_CLEAR).bits());
        assert_eq!(uart.read(iir), IirSource::NONE_PENDING);
    }

    #[test]
    fn test_platform_open_and_dma() {
        let mut platform = SimPlatform::new();
        platform.add_uart(1);
        platform.add_dma_channel(1);

        assert!(platform.open(1).is_ok());
        assert_eq!(
            platform.open(2).err(),
            Some(DriverError::DeviceNotFound { uart_id: 2 })
        );

        let request = DmaRequest {
            direction: uart750_ddk::DmaDirection::FromDevice,
            len: 64,
        };
        assert!(platform.start_dma(1, request).is_ok());
        assert_eq!(platform.dma_requests(), &[(1, request)]);
        assert!(platform.start_dma(3, request).is_err());
    }
}
