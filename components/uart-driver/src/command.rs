//! Control commands
//!
//! Commands travel as fixed-size little-endian records through a queue
//! shared by several producers. A record is the 12-byte
//! [`CommandHeader`], extended to the 28-byte [`ParamCommand`] for the
//! get/set-parameter commands. Records with the wrong size for their
//! command or a bad signature are discarded before dispatch.

use bincode::Options;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use uart750_hsm::{Event, Signal};

use crate::descriptor::{DataBits, Parity, ProtocolDescriptor, StopBits};
use crate::error::{Result, UartError};

/// Magic carried by every well-formed record
pub const COMMAND_SIGNATURE: u32 = 0x5541_5254; // "UART"

/// Size of a header-only record
pub const HEADER_LEN: usize = 12;
/// Size of a record carrying line parameters
pub const PARAM_LEN: usize = 28;

/// Command identifiers. They double as FSM signal ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandId {
    Terminate = Signal::USER,
    ChannelOpen = Signal::USER + 1,
    ChannelClose = Signal::USER + 2,
    GetParam = Signal::USER + 3,
    SetParam = Signal::USER + 4,
}

impl CommandId {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            x if x == CommandId::Terminate as u32 => Some(CommandId::Terminate),
            x if x == CommandId::ChannelOpen as u32 => Some(CommandId::ChannelOpen),
            x if x == CommandId::ChannelClose as u32 => Some(CommandId::ChannelClose),
            x if x == CommandId::GetParam as u32 => Some(CommandId::GetParam),
            x if x == CommandId::SetParam as u32 => Some(CommandId::SetParam),
            _ => None,
        }
    }

    pub const fn signal(self) -> Signal {
        Signal::new(self as u32)
    }

    /// Record size expected for this command
    pub const fn record_len(self) -> usize {
        match self {
            CommandId::GetParam | CommandId::SetParam => PARAM_LEN,
            _ => HEADER_LEN,
        }
    }
}

/// Header common to every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct CommandHeader {
    pub command_id: u32,
    pub uart_id: u32,
    pub signature: u32,
}

/// Header plus line parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct ParamCommand {
    pub header: CommandHeader,
    pub baud: u32,
    pub parity: u32,
    pub data_bits: u32,
    pub stop_bits: u32,
}

const_assert_eq!(core::mem::size_of::<CommandHeader>(), HEADER_LEN);
const_assert_eq!(core::mem::size_of::<ParamCommand>(), PARAM_LEN);

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// A validated command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Terminate { uart_id: u32 },
    ChannelOpen { uart_id: u32 },
    ChannelClose { uart_id: u32 },
    GetParam { uart_id: u32 },
    SetParam { uart_id: u32, protocol: ProtocolDescriptor },
}

impl Command {
    pub fn id(&self) -> CommandId {
        match self {
            Command::Terminate { .. } => CommandId::Terminate,
            Command::ChannelOpen { .. } => CommandId::ChannelOpen,
            Command::ChannelClose { .. } => CommandId::ChannelClose,
            Command::GetParam { .. } => CommandId::GetParam,
            Command::SetParam { .. } => CommandId::SetParam,
        }
    }

    pub fn uart_id(&self) -> u32 {
        match *self {
            Command::Terminate { uart_id }
            | Command::ChannelOpen { uart_id }
            | Command::ChannelClose { uart_id }
            | Command::GetParam { uart_id }
            | Command::SetParam { uart_id, .. } => uart_id,
        }
    }

    /// Wrap the command as an FSM event whose signal is the command id
    pub fn into_event(self) -> Event<Command> {
        Event::with_payload(self.id().signal(), self)
    }

    /// Encode as a wire record
    pub fn encode(&self) -> Result<Vec<u8>> {
        let header = CommandHeader {
            command_id: self.id() as u32,
            uart_id: self.uart_id(),
            signature: COMMAND_SIGNATURE,
        };

        let bytes = match self.id().record_len() {
            PARAM_LEN => {
                let protocol = match *self {
                    Command::SetParam { protocol, .. } => protocol,
                    _ => ProtocolDescriptor::default(),
                };
                codec().serialize(&ParamCommand {
                    header,
                    baud: protocol.baud_rate,
                    parity: protocol.parity.raw(),
                    data_bits: protocol.data_bits.raw(),
                    stop_bits: protocol.stop_bits.raw(),
                })?
            }
            _ => codec().serialize(&header)?,
        };
        Ok(bytes)
    }

    /// Validate and decode a wire record
    ///
    /// Checks, in order: the length is a known record size, the length
    /// matches the command it declares, the signature.
    ///
    /// # Errors
    /// `CommandLength`, `UnknownCommand` or `CommandSignature`; the record
    /// must then be discarded without dispatch.
    pub fn decode(record: &[u8]) -> Result<Command> {
        if record.len() != HEADER_LEN && record.len() != PARAM_LEN {
            return Err(UartError::CommandLength {
                len: record.len(),
                expected: HEADER_LEN,
            });
        }

        let header: CommandHeader = codec().deserialize(&record[..HEADER_LEN])?;
        let id = CommandId::from_raw(header.command_id).ok_or(UartError::UnknownCommand {
            id: header.command_id,
        })?;
        if record.len() != id.record_len() {
            return Err(UartError::CommandLength {
                len: record.len(),
                expected: id.record_len(),
            });
        }
        if header.signature != COMMAND_SIGNATURE {
            return Err(UartError::CommandSignature {
                signature: header.signature,
            });
        }

        let uart_id = header.uart_id;
        Ok(match id {
            CommandId::Terminate => Command::Terminate { uart_id },
            CommandId::ChannelOpen => Command::ChannelOpen { uart_id },
            CommandId::ChannelClose => Command::ChannelClose { uart_id },
            CommandId::GetParam => Command::GetParam { uart_id },
            CommandId::SetParam => {
                let params: ParamCommand = codec().deserialize(record)?;
                Command::SetParam {
                    uart_id,
                    protocol: ProtocolDescriptor {
                        baud_rate: params.baud,
                        parity: Parity::from_raw(params.parity),
                        data_bits: DataBits::from_raw(params.data_bits),
                        stop_bits: StopBits::from_raw(params.stop_bits),
                    },
                }
            }
        })
    }
}
