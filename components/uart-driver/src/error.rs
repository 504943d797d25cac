//! Driver error type

use thiserror::Error;
use uart750_ddk::DriverError;
use uart750_hsm::HsmError;

use crate::regs::{Access, ConfigMode, Reg};

/// UART driver errors
#[derive(Debug, Error)]
pub enum UartError {
    #[error("soft reset not acknowledged after {polls} polls")]
    HardwareTimeout { polls: u32 },

    #[error("baud rate {baud} not in the baud table")]
    InvalidBaudRate { baud: u32 },

    #[error("unsupported parity {raw}")]
    InvalidParity { raw: u32 },

    #[error("unsupported data bits {raw}")]
    InvalidDataBits { raw: u32 },

    #[error("unsupported stop bits {raw}")]
    InvalidStopBits { raw: u32 },

    #[error("no UART mode for baud rate {baud}")]
    UnsupportedMode { baud: u32 },

    #[error("{reg:?} is not reachable for {access:?} in mode {mode:?}")]
    RegisterUnavailable {
        reg: Reg,
        mode: ConfigMode,
        access: Access,
    },

    #[error("command record of {len} bytes, expected {expected}")]
    CommandLength { len: usize, expected: usize },

    #[error("command signature {signature:#010x} rejected")]
    CommandSignature { signature: u32 },

    #[error("unknown command id {id:#x}")]
    UnknownCommand { id: u32 },

    #[error("no device attached as UART {uart_id}")]
    UnknownDevice { uart_id: u32 },

    #[error("UART {uart_id} is already attached")]
    DeviceExists { uart_id: u32 },

    #[error("command queue closed")]
    QueueClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Hsm(#[from] HsmError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("command codec: {0}")]
    Codec(#[from] bincode::Error),
}

impl UartError {
    /// Configuration validation failures
    ///
    /// `set_protocol` works around these (substituting a default or
    /// skipping the field) and keeps going; everything else aborts the
    /// operation that produced it.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            UartError::InvalidBaudRate { .. }
                | UartError::InvalidParity { .. }
                | UartError::InvalidDataBits { .. }
                | UartError::InvalidStopBits { .. }
        )
    }
}

pub type Result<T> = core::result::Result<T, UartError>;
