//! Protocol descriptor
//!
//! The abstract line configuration a device runs with. Field enums keep an
//! `Other` arm so a descriptor decoded from the wire can carry a value the
//! hardware does not support; [`set_protocol`](crate::protocol::set_protocol)
//! coerces such fields to safe defaults instead of refusing them.

use crate::baud::{self, BaudEntry};
use crate::error::{Result, UartError};

/// Default line rate
pub const DEFAULT_BAUD: u32 = 115_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
    Other(u32),
}

impl Parity {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Parity::None,
            1 => Parity::Even,
            2 => Parity::Odd,
            other => Parity::Other(other),
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            Parity::None => 0,
            Parity::Even => 1,
            Parity::Odd => 2,
            Parity::Other(raw) => raw,
        }
    }

    /// Supported parity, or `None` with the error it is coerced under
    pub fn coerce(self) -> (Parity, Option<UartError>) {
        match self {
            Parity::Other(raw) => (Parity::None, Some(UartError::InvalidParity { raw })),
            supported => (supported, None),
        }
    }
}

/// Character width. The wire value is the number of bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Eight,
    Five,
    Other(u32),
}

impl DataBits {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            8 => DataBits::Eight,
            5 => DataBits::Five,
            other => DataBits::Other(other),
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            DataBits::Eight => 8,
            DataBits::Five => 5,
            DataBits::Other(raw) => raw,
        }
    }

    /// Only 8-bit characters are programmed; anything else becomes 8 bits
    pub fn coerce(self) -> (DataBits, Option<UartError>) {
        match self {
            DataBits::Eight => (DataBits::Eight, None),
            other => (
                DataBits::Eight,
                Some(UartError::InvalidDataBits { raw: other.raw() }),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
    Other(u32),
}

impl StopBits {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => StopBits::One,
            1 => StopBits::OnePointFive,
            2 => StopBits::Two,
            other => StopBits::Other(other),
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
            StopBits::Other(raw) => raw,
        }
    }

    /// Stop bits as programmed for characters of the requested `data` width
    ///
    /// The NB_STOP bit means 1.5 stop bits for 5-bit characters and 2 for
    /// every other width, so 1.5 is only honoured when 5-bit characters
    /// were asked for.
    pub fn coerce(self, data: DataBits) -> (StopBits, Option<UartError>) {
        match self {
            StopBits::One | StopBits::Two => (self, None),
            StopBits::OnePointFive if data == DataBits::Five => (self, None),
            StopBits::OnePointFive => (StopBits::One, None),
            StopBits::Other(raw) => (StopBits::One, Some(UartError::InvalidStopBits { raw })),
        }
    }
}

/// Line configuration of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
}

impl Default for ProtocolDescriptor {
    fn default() -> Self {
        Self::with_baud(DEFAULT_BAUD)
    }
}

impl ProtocolDescriptor {
    /// 8N1 at `baud_rate`
    pub const fn with_baud(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            parity: Parity::None,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
        }
    }

    /// Strict validation against `table`
    ///
    /// `set_protocol` tolerates unsupported fields; callers that must not
    /// end up with a coerced configuration check here first.
    ///
    /// # Errors
    /// The first unsupported field, in programming order. 1.5 stop bits
    /// are rejected because 5-bit characters are not supported.
    pub fn validate(&self, table: &[BaudEntry]) -> Result<()> {
        baud::lookup(table, self.baud_rate)?;
        if let (_, Some(err)) = self.parity.coerce() {
            return Err(err);
        }
        if let (_, Some(err)) = self.data_bits.coerce() {
            return Err(err);
        }
        match self.stop_bits {
            StopBits::One | StopBits::Two => Ok(()),
            other => Err(UartError::InvalidStopBits { raw: other.raw() }),
        }
    }

    /// The descriptor `set_protocol` actually programs for `self`
    pub fn effective(&self) -> Self {
        let (parity, _) = self.parity.coerce();
        let (data_bits, _) = self.data_bits.coerce();
        let (stop_bits, _) = self.stop_bits.coerce(self.data_bits);
        Self {
            baud_rate: self.baud_rate,
            parity,
            data_bits,
            stop_bits,
        }
    }
}
