//! 16C750 / OMAP UART register map
//!
//! Register offsets are overloaded: what lives at a given address depends
//! on the access direction and on the configuration mode selected through
//! LCR. Rather than one symbol per (mode, address) pair, every logical
//! register is a [`Reg`] and a single table maps it to its offset in each
//! mode.
//!
//! TCR and TLR share addresses with MSR/SPR (and XOFF1/XOFF2 in mode B).
//! They are only reachable while `EFR[4]` and `MCR[6]` are both set; the
//! table marks those rows as gated and [`decode`] picks them only when the
//! caller says the gate is open.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Depth of each hardware FIFO
pub const FIFO_DEPTH: u16 = 64;

/// LCR lives at the same offset in every configuration mode
pub const LCR_OFFSET: u16 = 0x0C;

/// Register personality selected by the value written to LCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigMode {
    /// Operational mode
    Normal,
    /// Divisor latches plus the normal-mode control registers
    A,
    /// Divisor latches, EFR and the XON/XOFF characters
    B,
}

impl ConfigMode {
    const NORMAL_LCR: u16 = 0x00;
    const MODE_A_LCR: u16 = 0x80;
    const MODE_B_LCR: u16 = 0xBF;

    /// Mode selected by an LCR value
    pub const fn from_lcr(lcr: u16) -> Self {
        if lcr & 0xFF == Self::MODE_B_LCR {
            ConfigMode::B
        } else if lcr & Lcr::DIV_EN.bits() != 0 {
            ConfigMode::A
        } else {
            ConfigMode::Normal
        }
    }

    /// Value written to LCR to enter the mode
    pub const fn lcr_value(self) -> u16 {
        match self {
            ConfigMode::Normal => Self::NORMAL_LCR,
            ConfigMode::A => Self::MODE_A_LCR,
            ConfigMode::B => Self::MODE_B_LCR,
        }
    }

    const fn index(self) -> usize {
        match self {
            ConfigMode::Normal => 0,
            ConfigMode::A => 1,
            ConfigMode::B => 2,
        }
    }
}

/// Access direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Logical registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reg {
    Rhr,
    Thr,
    Dll,
    Dlh,
    Ier,
    Iir,
    Fcr,
    Efr,
    Lcr,
    Mcr,
    Xon1,
    Lsr,
    Xon2,
    Msr,
    Tcr,
    Xoff1,
    Spr,
    Tlr,
    Xoff2,
    Mdr1,
    Mdr2,
    Sflsr,
    Txfll,
    Resume,
    Txflh,
    Sfregl,
    Rxfll,
    Sfregh,
    Rxflh,
    Blr,
    Uasr,
    Acreg,
    Scr,
    Ssr,
    Eblr,
    Mvr,
    Sysc,
    Syss,
    Wer,
    Cfps,
    RxfifoLvl,
    TxfifoLvl,
    Ier2,
    Isr2,
    FreqSel,
    Mdr3,
    TxDmaThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    R,
    W,
    RW,
}

impl Dir {
    const fn allows(self, access: Access) -> bool {
        matches!(
            (self, access),
            (Dir::RW, _) | (Dir::R, Access::Read) | (Dir::W, Access::Write)
        )
    }
}

/// One row of the register table: offsets in NORMAL, A and B modes
#[derive(Debug, Clone, Copy)]
struct RegDef {
    reg: Reg,
    offsets: [Option<u16>; 3],
    dir: Dir,
    gated: bool,
}

const fn row(reg: Reg, normal: Option<u16>, a: Option<u16>, b: Option<u16>, dir: Dir) -> RegDef {
    RegDef {
        reg,
        offsets: [normal, a, b],
        dir,
        gated: false,
    }
}

const fn every(reg: Reg, offset: u16, dir: Dir) -> RegDef {
    row(reg, Some(offset), Some(offset), Some(offset), dir)
}

const fn gated(reg: Reg, offset: u16) -> RegDef {
    RegDef {
        reg,
        offsets: [Some(offset), Some(offset), Some(offset)],
        dir: Dir::RW,
        gated: true,
    }
}

#[rustfmt::skip]
static REGISTERS: [RegDef; 47] = [
    row(Reg::Rhr,   Some(0x00), None,       None,       Dir::R),
    row(Reg::Thr,   Some(0x00), None,       None,       Dir::W),
    row(Reg::Dll,   None,       Some(0x00), Some(0x00), Dir::RW),
    row(Reg::Dlh,   None,       Some(0x04), Some(0x04), Dir::RW),
    row(Reg::Ier,   Some(0x04), None,       None,       Dir::RW),
    row(Reg::Iir,   Some(0x08), Some(0x08), None,       Dir::R),
    row(Reg::Fcr,   Some(0x08), Some(0x08), None,       Dir::W),
    row(Reg::Efr,   None,       None,       Some(0x08), Dir::RW),
    every(Reg::Lcr, LCR_OFFSET, Dir::RW),
    row(Reg::Mcr,   Some(0x10), Some(0x10), None,       Dir::RW),
    row(Reg::Xon1,  None,       None,       Some(0x10), Dir::RW),
    row(Reg::Lsr,   Some(0x14), Some(0x14), None,       Dir::R),
    row(Reg::Xon2,  None,       None,       Some(0x14), Dir::RW),
    row(Reg::Msr,   Some(0x18), Some(0x18), None,       Dir::R),
    gated(Reg::Tcr, 0x18),
    row(Reg::Xoff1, None,       None,       Some(0x18), Dir::RW),
    row(Reg::Spr,   Some(0x1C), Some(0x1C), None,       Dir::RW),
    gated(Reg::Tlr, 0x1C),
    row(Reg::Xoff2, None,       None,       Some(0x1C), Dir::RW),
    every(Reg::Mdr1,   0x20, Dir::RW),
    every(Reg::Mdr2,   0x24, Dir::RW),
    every(Reg::Sflsr,  0x28, Dir::R),
    every(Reg::Txfll,  0x28, Dir::W),
    every(Reg::Resume, 0x2C, Dir::R),
    every(Reg::Txflh,  0x2C, Dir::W),
    every(Reg::Sfregl, 0x30, Dir::R),
    every(Reg::Rxfll,  0x30, Dir::W),
    every(Reg::Sfregh, 0x34, Dir::R),
    every(Reg::Rxflh,  0x34, Dir::W),
    row(Reg::Blr,   Some(0x38), None,       None,       Dir::RW),
    row(Reg::Uasr,  None,       Some(0x38), Some(0x38), Dir::R),
    every(Reg::Acreg,  0x3C, Dir::RW),
    every(Reg::Scr,    0x40, Dir::RW),
    every(Reg::Ssr,    0x44, Dir::RW),
    every(Reg::Eblr,   0x48, Dir::RW),
    every(Reg::Mvr,    0x50, Dir::R),
    every(Reg::Sysc,   0x54, Dir::RW),
    every(Reg::Syss,   0x58, Dir::R),
    every(Reg::Wer,    0x5C, Dir::RW),
    every(Reg::Cfps,   0x60, Dir::RW),
    every(Reg::RxfifoLvl, 0x64, Dir::R),
    every(Reg::TxfifoLvl, 0x68, Dir::R),
    every(Reg::Ier2,   0x6C, Dir::RW),
    every(Reg::Isr2,   0x70, Dir::RW),
    every(Reg::FreqSel, 0x74, Dir::RW),
    every(Reg::Mdr3,   0x80, Dir::RW),
    every(Reg::TxDmaThreshold, 0x84, Dir::RW),
];

/// Offset of `reg` in `mode` for `access`
///
/// # Returns
/// `None` if the register is not reachable in that mode or direction.
/// Gated registers (TCR, TLR) resolve in every mode; opening the gate is
/// the caller's job.
pub fn resolve(reg: Reg, mode: ConfigMode, access: Access) -> Option<u16> {
    let def = REGISTERS.iter().find(|def| def.reg == reg)?;
    if !def.dir.allows(access) {
        return None;
    }
    def.offsets[mode.index()]
}

/// Logical register behind `offset` in `mode` for `access`
///
/// `tcr_tlr` is the state of the TCR/TLR gate (`EFR[4] && MCR[6]`).
/// When open, TCR and TLR shadow whatever else lives at 0x18 / 0x1C.
pub fn decode(offset: u16, mode: ConfigMode, access: Access, tcr_tlr: bool) -> Option<Reg> {
    let candidates = || {
        REGISTERS.iter().filter(move |def| {
            def.offsets[mode.index()] == Some(offset) && def.dir.allows(access)
        })
    };

    if tcr_tlr {
        if let Some(def) = candidates().find(|def| def.gated) {
            return Some(def.reg);
        }
    }
    candidates().find(|def| !def.gated).map(|def| def.reg)
}

/// MDR1 mode select values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum UartMode {
    Uart16x = 0,
    Sir = 1,
    Uart16xAutobaud = 2,
    Uart13x = 3,
    Mir = 4,
    Fir = 5,
    Cir = 6,
    Disable = 7,
}

impl UartMode {
    pub const fn bits(self) -> u16 {
        self as u16
    }

    pub const fn from_bits(bits: u16) -> Self {
        match bits & Mdr1::MODE_SELECT.bits() {
            0 => UartMode::Uart16x,
            1 => UartMode::Sir,
            2 => UartMode::Uart16xAutobaud,
            3 => UartMode::Uart13x,
            4 => UartMode::Mir,
            5 => UartMode::Fir,
            6 => UartMode::Cir,
            _ => UartMode::Disable,
        }
    }
}

bitflags! {
    /// System configuration
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Sysc: u16 {
        const AUTOIDLE = 1 << 0;
        const SOFTRESET = 1 << 1;
        const ENAWAKEUP = 1 << 2;
        const IDLEMODE = 0b11 << 3;
    }

    /// System status
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Syss: u16 {
        const RESETDONE = 1 << 0;
    }

    /// Enhanced feature register (mode B only)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Efr: u16 {
        const SW_FLOW_CONTROL = 0x0F;
        const ENHANCED_EN = 1 << 4;
        const SPECIAL_CHAR_DETECT = 1 << 5;
        const AUTO_RTS_EN = 1 << 6;
        const AUTO_CTS_EN = 1 << 7;
    }

    /// Modem control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mcr: u16 {
        const DTR = 1 << 0;
        const RTS = 1 << 1;
        const RI_STS_CH = 1 << 2;
        const CD_STS_CH = 1 << 3;
        const LOOPBACK_EN = 1 << 4;
        const XON_EN = 1 << 5;
        const TCR_TLR = 1 << 6;
    }

    /// FIFO control (write-only)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fcr: u16 {
        const FIFO_EN = 1 << 0;
        const RX_FIFO_CLEAR = 1 << 1;
        const TX_FIFO_CLEAR = 1 << 2;
        const DMA_MODE = 1 << 3;
        const TX_FIFO_TRIG = 0b11 << 4;
        const RX_FIFO_TRIG = 0b11 << 6;
    }

    /// Line control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u16 {
        const CHAR_LENGTH = 0b11;
        const NB_STOP = 1 << 2;
        const PARITY_EN = 1 << 3;
        const PARITY_TYPE1 = 1 << 4;
        const PARITY_TYPE2 = 1 << 5;
        const BREAK_EN = 1 << 6;
        const DIV_EN = 1 << 7;
    }

    /// Interrupt enable (normal mode)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ier: u16 {
        const RHR = 1 << 0;
        const THR = 1 << 1;
        const LINE_STS = 1 << 2;
        const MODEM_STS = 1 << 3;
        const SLEEP_MODE = 1 << 4;
        const XOFF = 1 << 5;
        const RTS = 1 << 6;
        const CTS = 1 << 7;
    }

    /// Line status
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u16 {
        /// At least one byte waiting in the RX FIFO
        const RX_FIFO_E = 1 << 0;
        const RX_OE = 1 << 1;
        const RX_PE = 1 << 2;
        const RX_FE = 1 << 3;
        const RX_BI = 1 << 4;
        const TX_FIFO_E = 1 << 5;
        const TX_SR_E = 1 << 6;
        const RX_FIFO_STS = 1 << 7;
    }

    /// Supplementary control
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Scr: u16 {
        const DMA_MODE_CTL = 1 << 0;
        const DMA_MODE_2 = 0b11 << 1;
        const TX_EMPTY_CTL = 1 << 3;
        const RX_CTS_WU_EN = 1 << 4;
        const TX_TRIG_GRANU1 = 1 << 6;
        const RX_TRIG_GRANU1 = 1 << 7;
    }

    /// Mode definition 1
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mdr1: u16 {
        const MODE_SELECT = 0b111;
        const IR_SLEEP = 1 << 3;
        const SET_TXIR = 1 << 4;
        const SCT = 1 << 5;
        const SIP_MODE = 1 << 6;
        const FRAME_END_MODE = 1 << 7;
    }
}

/// LCR character length field for 8 data bits
pub const LCR_CHAR_8: u16 = 0b11;

/// TLR: DMA trigger levels, in units of four bytes
pub const TLR_TX_SHIFT: u16 = 0;
pub const TLR_RX_SHIFT: u16 = 4;

/// SCR: DMA mode 2 field
pub const SCR_DMA_MODE_2_SHIFT: u16 = 1;

/// Interrupt sources reported by IIR, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IirSource {
    LineStatus,
    RxTimeout,
    Rx,
    Thr,
    Modem,
    Other(u16),
}

impl IirSource {
    const PENDING_N: u16 = 1 << 0;
    const IT_TYPE: u16 = 0x3E;

    /// Decode an IIR value
    ///
    /// # Returns
    /// `None` when no interrupt is pending.
    pub const fn decode(iir: u16) -> Option<Self> {
        if iir & Self::PENDING_N != 0 {
            return None;
        }
        Some(match iir & Self::IT_TYPE {
            0x06 => IirSource::LineStatus,
            0x0C => IirSource::RxTimeout,
            0x04 => IirSource::Rx,
            0x02 => IirSource::Thr,
            0x00 => IirSource::Modem,
            other => IirSource::Other(other),
        })
    }

    /// IIR value reporting this source as pending
    pub const fn iir_value(self) -> u16 {
        match self {
            IirSource::LineStatus => 0x06,
            IirSource::RxTimeout => 0x0C,
            IirSource::Rx => 0x04,
            IirSource::Thr => 0x02,
            IirSource::Modem => 0x00,
            IirSource::Other(bits) => bits & Self::IT_TYPE,
        }
    }

    /// IIR value when nothing is pending
    pub const NONE_PENDING: u16 = Self::PENDING_N;
}
